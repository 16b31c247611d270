#![forbid(unsafe_code)]

pub mod error;
pub mod quiz_api;
pub mod reconciler;
pub mod session;

pub use quiz_core::Clock;

pub use error::{DefinitionFetchError, SessionError, SubmissionError};
pub use quiz_api::{QuizApiConfig, QuizApiService, QuizBackend};
pub use reconciler::SubmissionReconciler;

pub use session::{
    FailureKind, FailureNotice, FinalizeTrigger, IntentOutcome, PendingPrompt, QuizSession,
    SessionHandle, SessionIntent, SessionLoopService, SessionPhase, SessionSnapshot,
};
