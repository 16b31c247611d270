use serde::{Deserialize, Serialize};

use crate::model::answer::Answer;

/// Body of `POST /quizzes/{id}/submit`.
///
/// `answers` is always exactly as long as the quiz's question list, with
/// `null` at unanswered positions. Frozen at finalize time; a retry resends
/// this value byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub answers: Vec<Answer>,
    pub time_taken_seconds: u32,
}

impl SubmissionRequest {
    #[must_use]
    pub fn new(answers: Vec<Answer>, time_taken_seconds: u32) -> Self {
        Self {
            answers,
            time_taken_seconds,
        }
    }
}

/// Scoring outcome returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub score: f64,
    pub correct_count: u32,
    pub total_questions: u32,
    pub passed: bool,
}
