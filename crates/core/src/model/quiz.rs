use serde::Deserialize;
use thiserror::Error;

use crate::model::ids::QuizId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizDefinitionError {
    #[error("quiz duration must be > 0 seconds")]
    ZeroDuration,

    #[error("quiz must contain at least one question")]
    NoQuestions,

    #[error("question {index} must offer at least two options")]
    TooFewOptions { index: usize },

    #[error("question {index} text cannot be empty")]
    EmptyQuestionText { index: usize },
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A single multiple-choice question.
///
/// Carries no correctness data; the backend scores submissions, the client
/// only collects option indices.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Question {
    text: String,
    options: Vec<String>,
}

impl Question {
    /// Creates a question from its text and option list.
    ///
    /// Validation happens at the `QuizDefinition` level so errors can carry
    /// the question index.
    #[must_use]
    pub fn new(text: impl Into<String>, options: Vec<String>) -> Self {
        Self {
            text: text.into(),
            options,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Number of selectable options.
    #[must_use]
    pub fn option_count(&self) -> usize {
        self.options.len()
    }
}

//
// ─── QUIZ DEFINITION ───────────────────────────────────────────────────────────
//

/// Immutable definition of a timed quiz, fetched once per session.
///
/// Question order is significant: a question's position in `questions` is its
/// index everywhere else in the engine (ledger keys, submitted vector).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "QuizDefinitionWire")]
pub struct QuizDefinition {
    id: QuizId,
    duration_seconds: u32,
    questions: Vec<Question>,
}

/// Raw wire shape, validated into `QuizDefinition` on deserialization.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuizDefinitionWire {
    id: QuizId,
    duration_seconds: u32,
    questions: Vec<Question>,
}

impl TryFrom<QuizDefinitionWire> for QuizDefinition {
    type Error = QuizDefinitionError;

    fn try_from(wire: QuizDefinitionWire) -> Result<Self, Self::Error> {
        Self::new(wire.id, wire.duration_seconds, wire.questions)
    }
}

impl QuizDefinition {
    /// Creates a validated quiz definition.
    ///
    /// # Errors
    ///
    /// Returns `QuizDefinitionError::ZeroDuration` for a zero time budget,
    /// `QuizDefinitionError::NoQuestions` for an empty question list, and
    /// `QuizDefinitionError::TooFewOptions` / `EmptyQuestionText` for a
    /// malformed question, identified by index.
    pub fn new(
        id: QuizId,
        duration_seconds: u32,
        questions: Vec<Question>,
    ) -> Result<Self, QuizDefinitionError> {
        if duration_seconds == 0 {
            return Err(QuizDefinitionError::ZeroDuration);
        }
        if questions.is_empty() {
            return Err(QuizDefinitionError::NoQuestions);
        }
        for (index, question) in questions.iter().enumerate() {
            if question.text.trim().is_empty() {
                return Err(QuizDefinitionError::EmptyQuestionText { index });
            }
            if question.options.len() < 2 {
                return Err(QuizDefinitionError::TooFewOptions { index });
            }
        }

        Ok(Self {
            id,
            duration_seconds,
            questions,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    /// Total time budget for one attempt, in seconds.
    #[must_use]
    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Number of questions; also the length of any submitted answer vector.
    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
