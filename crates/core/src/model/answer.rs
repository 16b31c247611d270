use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

//
// ─── ANSWER ────────────────────────────────────────────────────────────────────
//

/// The recorded choice for a single question.
///
/// An explicit tagged variant rather than a bare `Option`: on the wire an
/// unanswered question is `null`, which must never collapse into option 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    /// The selected option index for this question.
    Answered(u32),
    /// No option was ever selected.
    Unanswered,
}

impl Answer {
    #[must_use]
    pub fn is_answered(&self) -> bool {
        matches!(self, Answer::Answered(_))
    }

    /// Returns the selected option index, if any.
    #[must_use]
    pub fn option_index(&self) -> Option<u32> {
        match self {
            Answer::Answered(index) => Some(*index),
            Answer::Unanswered => None,
        }
    }
}

impl Serialize for Answer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Answer::Answered(index) => serializer.serialize_u32(*index),
            Answer::Unanswered => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Answer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<u32>::deserialize(deserializer)?;
        Ok(raw.map_or(Answer::Unanswered, Answer::Answered))
    }
}

//
// ─── ANSWER LEDGER ─────────────────────────────────────────────────────────────
//

/// Order-independent record of one selected option per question.
///
/// Keys are question indices; absence of a key means unanswered. A later
/// selection for the same question overwrites the earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerLedger {
    selections: BTreeMap<usize, u32>,
}

impl AnswerLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the selected option for a question, replacing any earlier
    /// selection.
    ///
    /// Bounds are the owning session's concern: the ledger does not know the
    /// quiz and stores whatever indices it is handed.
    pub fn select(&mut self, question_index: usize, option_index: u32) {
        self.selections.insert(question_index, option_index);
    }

    /// Returns the recorded answer for a question.
    #[must_use]
    pub fn get(&self, question_index: usize) -> Answer {
        self.selections
            .get(&question_index)
            .map_or(Answer::Unanswered, |index| Answer::Answered(*index))
    }

    /// Number of distinct questions with a recorded answer.
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.selections.len()
    }

    /// Number of questions without a recorded answer, out of `total`.
    #[must_use]
    pub fn unanswered_count(&self, total: usize) -> usize {
        total.saturating_sub(self.selections.len())
    }

    /// Produces the fixed-length answer vector for submission.
    ///
    /// Position `i` holds the answer for question `i`; absent positions carry
    /// an explicit `Answer::Unanswered` marker, never a default index.
    #[must_use]
    pub fn to_vector(&self, total: usize) -> Vec<Answer> {
        (0..total).map(|index| self.get(index)).collect()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
