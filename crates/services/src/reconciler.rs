use std::sync::Arc;

use quiz_core::model::{QuizId, SubmissionRequest, SubmissionResult};

use crate::error::SubmissionError;
use crate::quiz_api::QuizBackend;

/// Turns a finalized session into scoring-endpoint calls.
///
/// Created once per session, from the payload frozen when the finalize
/// latch was won, and holds that payload for its whole lifetime: the
/// automatic attempt and any user-initiated retries all send the identical
/// answer vector and elapsed time. Elapsed time is never recomputed here —
/// the clock is already stopped and its value is baked into the payload.
pub struct SubmissionReconciler {
    backend: Arc<dyn QuizBackend>,
    quiz_id: QuizId,
    request: SubmissionRequest,
    attempts: u32,
}

impl SubmissionReconciler {
    #[must_use]
    pub fn new(backend: Arc<dyn QuizBackend>, quiz_id: QuizId, request: SubmissionRequest) -> Self {
        Self {
            backend,
            quiz_id,
            request,
            attempts: 0,
        }
    }

    /// The frozen payload every attempt sends.
    #[must_use]
    pub fn request(&self) -> &SubmissionRequest {
        &self.request
    }

    /// Number of attempts made so far, including the automatic one.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Sends the frozen payload to the scoring endpoint once.
    ///
    /// The session runtime calls this exactly once automatically; further
    /// calls only happen for an explicit retry after a network failure, and
    /// resend the same payload.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError` from the backend; `is_retryable` decides
    /// whether the host may offer a retry.
    pub async fn submit(&mut self) -> Result<SubmissionResult, SubmissionError> {
        self.attempts += 1;
        tracing::debug!(
            quiz_id = %self.quiz_id,
            attempt = self.attempts,
            time_taken = self.request.time_taken_seconds,
            "submitting quiz attempt"
        );
        self.backend.submit_quiz(self.quiz_id, &self.request).await
    }
}

impl std::fmt::Debug for SubmissionReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionReconciler")
            .field("quiz_id", &self.quiz_id)
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use quiz_core::model::{Answer, QuizDefinition};

    use crate::error::DefinitionFetchError;

    struct CountingBackend {
        calls: AtomicU32,
        fail_first: bool,
    }

    impl CountingBackend {
        fn new(fail_first: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                fail_first,
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QuizBackend for CountingBackend {
        async fn fetch_quiz(&self, _id: QuizId) -> Result<QuizDefinition, DefinitionFetchError> {
            Err(DefinitionFetchError::NotFound)
        }

        async fn submit_quiz(
            &self,
            _id: QuizId,
            request: &SubmissionRequest,
        ) -> Result<SubmissionResult, SubmissionError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && call == 0 {
                return Err(SubmissionError::Server(
                    reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                ));
            }
            let total = u32::try_from(request.answers.len()).unwrap();
            let correct = request
                .answers
                .iter()
                .filter(|answer| answer.is_answered())
                .count();
            Ok(SubmissionResult {
                score: 100.0 * correct as f64 / f64::from(total),
                correct_count: u32::try_from(correct).unwrap(),
                total_questions: total,
                passed: correct * 2 >= request.answers.len(),
            })
        }
    }

    fn frozen_request() -> SubmissionRequest {
        SubmissionRequest::new(
            vec![Answer::Answered(1), Answer::Unanswered, Answer::Answered(0)],
            30,
        )
    }

    #[tokio::test]
    async fn submit_sends_the_frozen_payload_once() {
        let backend = CountingBackend::new(false);
        let mut reconciler =
            SubmissionReconciler::new(backend.clone(), QuizId::generate(), frozen_request());

        let result = reconciler.submit().await.unwrap();

        assert_eq!(backend.calls(), 1);
        assert_eq!(reconciler.attempts(), 1);
        assert_eq!(result.total_questions, 3);
        assert_eq!(result.correct_count, 2);
    }

    #[tokio::test]
    async fn retry_resends_the_identical_payload() {
        let backend = CountingBackend::new(true);
        let mut reconciler =
            SubmissionReconciler::new(backend.clone(), QuizId::generate(), frozen_request());

        let first = reconciler.submit().await;
        assert!(first.is_err());
        let payload_after_failure = reconciler.request().clone();

        let second = reconciler.submit().await.unwrap();

        assert_eq!(backend.calls(), 2);
        assert_eq!(reconciler.attempts(), 2);
        assert_eq!(reconciler.request(), &payload_after_failure);
        assert_eq!(second.total_questions, 3);
    }
}
