mod answer;
mod ids;
mod quiz;
mod submission;

pub use answer::{Answer, AnswerLedger};
pub use ids::{ParseIdError, QuizId};
pub use quiz::{Question, QuizDefinition, QuizDefinitionError};
pub use submission::{SubmissionRequest, SubmissionResult};
