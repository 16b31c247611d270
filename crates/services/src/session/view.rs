use quiz_core::model::SubmissionResult;

use crate::error::{DefinitionFetchError, SubmissionError};
use crate::session::machine::SessionPhase;

/// Confirmation the session is waiting on before it can proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingPrompt {
    /// Submit was requested with this many questions unanswered.
    ConfirmSubmit { unanswered: usize },
    /// The user asked to leave an active session.
    ConfirmQuit,
}

/// Broad classification of a terminal failure, for the host's affordance
/// choice (reload vs retry vs plain error).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    DefinitionFetch,
    SubmissionNetwork,
    SubmissionServer,
    SubmissionRejected,
}

/// Cloneable terminal-failure report carried in snapshots.
///
/// The underlying `reqwest` errors are not `Clone`, so the machine keeps a
/// rendered message plus the retry classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureNotice {
    pub kind: FailureKind,
    pub message: String,
    pub retryable: bool,
}

impl From<&DefinitionFetchError> for FailureNotice {
    fn from(error: &DefinitionFetchError) -> Self {
        Self {
            kind: FailureKind::DefinitionFetch,
            message: error.to_string(),
            retryable: false,
        }
    }
}

impl From<&SubmissionError> for FailureNotice {
    fn from(error: &SubmissionError) -> Self {
        let kind = match error {
            SubmissionError::Network(_) => FailureKind::SubmissionNetwork,
            SubmissionError::Server(_) => FailureKind::SubmissionServer,
            SubmissionError::Rejected(_) => FailureKind::SubmissionRejected,
        };
        Self {
            kind,
            message: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

/// Aggregated view of session state, published after every event.
///
/// This is the whole observable surface: phase, cursor, per-question
/// answered flags, the clock, any outstanding prompt, and the terminal
/// payload once one exists.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub current_question: usize,
    pub total_questions: usize,
    pub answered: Vec<bool>,
    pub remaining_seconds: u32,
    pub unanswered: usize,
    pub prompt: Option<PendingPrompt>,
    pub result: Option<SubmissionResult>,
    pub failure: Option<FailureNotice>,
    pub retry_available: bool,
    pub abandoned: bool,
}

impl SessionSnapshot {
    /// True once the session can produce no further state changes other than
    /// an explicit retry.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}
