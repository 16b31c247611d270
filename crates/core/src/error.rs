use thiserror::Error;

use crate::countdown::CountdownError;
use crate::model::QuizDefinitionError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    QuizDefinition(#[from] QuizDefinitionError),
    #[error(transparent)]
    Countdown(#[from] CountdownError),
}
