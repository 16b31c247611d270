//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::countdown::CountdownError;

/// Errors that prevent a quiz definition from loading.
///
/// All of these are terminal for the session: the attempt never starts and
/// the host offers "go back", not retry-in-place.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DefinitionFetchError {
    #[error("quiz not found")]
    NotFound,
    #[error("not authorized to load quiz")]
    Unauthorized,
    #[error("quiz fetch failed with status {0}")]
    Http(reqwest::StatusCode),
    /// Body failed to decode or violated quiz domain rules (zero duration,
    /// single-option question); validation runs inside deserialization.
    #[error("quiz definition body was malformed")]
    Malformed(#[source] reqwest::Error),
    #[error(transparent)]
    Network(reqwest::Error),
}

/// Errors from the scoring endpoint at finalize time.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubmissionError {
    /// Connectivity or decode failure; the frozen payload may be resent.
    #[error(transparent)]
    Network(#[from] reqwest::Error),
    /// Backend fault (5xx); terminal, not retried automatically.
    #[error("scoring endpoint failed with status {0}")]
    Server(reqwest::StatusCode),
    /// Backend rejected the payload (4xx), e.g. the quiz is no longer
    /// available; terminal.
    #[error("scoring endpoint rejected submission with status {0}")]
    Rejected(reqwest::StatusCode),
}

impl SubmissionError {
    /// Whether an explicit user retry may resend the frozen payload.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubmissionError::Network(_))
    }
}

/// Errors emitted by the session state machine and its handle.
///
/// These report caller bugs (out-of-range indices, misordered lifecycle
/// calls), never user-facing conditions: rejected intents are no-ops, not
/// errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("question index {index} out of range for {count} questions")]
    QuestionOutOfRange { index: usize, count: usize },

    #[error("option index {option} out of range for question {question} with {count} options")]
    OptionOutOfRange {
        question: usize,
        option: u32,
        count: usize,
    },

    #[error("session is not in the {expected} phase")]
    IllegalPhase { expected: &'static str },

    #[error("no retry is available for this session")]
    NoRetryAvailable,

    #[error("session has already ended")]
    Ended,

    #[error(transparent)]
    Countdown(#[from] CountdownError),
}
