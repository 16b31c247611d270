use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, interval_at};

use quiz_core::model::QuizId;
use quiz_core::time::Clock;

use crate::error::SessionError;
use crate::quiz_api::QuizBackend;
use crate::reconciler::SubmissionReconciler;
use crate::session::intent::{IntentOutcome, SessionIntent};
use crate::session::machine::{QuizSession, SessionPhase};
use crate::session::view::SessionSnapshot;

const TICK_PERIOD: Duration = Duration::from_secs(1);
const INTENT_BUFFER: usize = 16;

/// Orchestrates quiz sessions end to end.
///
/// One spawned task per session runs the event loop of the engine: the 1 s
/// clock tick and the host's intents are delivered as discrete events into
/// the same loop, so the state machine never sees parallel mutation. The
/// host talks to the loop through a [`SessionHandle`].
#[derive(Clone)]
pub struct SessionLoopService {
    backend: Arc<dyn QuizBackend>,
    clock: Clock,
}

impl SessionLoopService {
    #[must_use]
    pub fn new(backend: Arc<dyn QuizBackend>) -> Self {
        Self {
            backend,
            clock: Clock::default_clock(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Starts a session for the given quiz: fetches the definition, arms the
    /// clock, and begins accepting intents.
    #[must_use]
    pub fn start(&self, quiz_id: QuizId) -> SessionHandle {
        let session = QuizSession::new(quiz_id, self.clock);
        let (intent_tx, intent_rx) = mpsc::channel(INTENT_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
        let backend = Arc::clone(&self.backend);

        tokio::spawn(run_session(session, backend, intent_rx, snapshot_tx));

        SessionHandle {
            intents: intent_tx,
            snapshots: snapshot_rx,
        }
    }
}

async fn run_session(
    mut session: QuizSession,
    backend: Arc<dyn QuizBackend>,
    mut intents: mpsc::Receiver<SessionIntent>,
    snapshots: watch::Sender<SessionSnapshot>,
) {
    match backend.fetch_quiz(session.quiz_id()).await {
        Ok(definition) => {
            if let Err(error) = session.definition_ready(definition) {
                tracing::error!(%error, "could not activate session");
                publish(&session, &snapshots);
                return;
            }
        }
        Err(error) => {
            // Terminal: the host gets a "go back" affordance, not a retry.
            let _ = session.definition_failed(&error);
            publish(&session, &snapshots);
            return;
        }
    }
    publish(&session, &snapshots);

    let mut reconciler: Option<SubmissionReconciler> = None;
    let start = Instant::now();
    let mut ticker = interval_at(start + TICK_PERIOD, TICK_PERIOD);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if session.tick() == IntentOutcome::Finalized {
                    run_submission(&mut session, &backend, &mut reconciler, &snapshots).await;
                }
            }
            intent = intents.recv() => {
                let Some(intent) = intent else {
                    // Host dropped the handle mid-session: a force-quit.
                    // Nothing is submitted; the attempt is simply lost.
                    break;
                };
                match session.apply(intent) {
                    Ok(IntentOutcome::Finalized) => {
                        run_submission(&mut session, &backend, &mut reconciler, &snapshots).await;
                    }
                    Ok(IntentOutcome::Abandoned) => {
                        publish(&session, &snapshots);
                        break;
                    }
                    Ok(_) => {}
                    Err(error) => {
                        tracing::warn!(?intent, %error, "rejected session intent");
                    }
                }
            }
        }

        publish(&session, &snapshots);

        match session.phase() {
            SessionPhase::Completed => break,
            // Stay alive after a retryable failure to serve RetrySubmission.
            SessionPhase::Failed if !session.retry_available() => break,
            _ => {}
        }
    }
}

/// Runs the reconciler step for a freshly won finalize latch (or a retry).
///
/// The reconciler is created once, from the frozen payload, and reused for
/// retries so every attempt carries the identical answer vector and elapsed
/// time. While the call is in flight the published phase is `Finalizing`;
/// intents arriving meanwhile queue up and are rejected by phase afterwards.
async fn run_submission(
    session: &mut QuizSession,
    backend: &Arc<dyn QuizBackend>,
    reconciler: &mut Option<SubmissionReconciler>,
    snapshots: &watch::Sender<SessionSnapshot>,
) {
    if reconciler.is_none() {
        let Some(request) = session.frozen_request() else {
            return;
        };
        *reconciler = Some(SubmissionReconciler::new(
            Arc::clone(backend),
            session.quiz_id(),
            request.clone(),
        ));
    }
    let Some(reconciler) = reconciler.as_mut() else {
        return;
    };

    publish(session, snapshots);

    let outcome = match reconciler.submit().await {
        Ok(result) => session.complete_submission(result),
        Err(error) => session.fail_submission(&error),
    };
    if let Err(error) = outcome {
        tracing::error!(%error, "submission outcome arrived in unexpected phase");
    }
}

fn publish(session: &QuizSession, snapshots: &watch::Sender<SessionSnapshot>) {
    let snapshot = session.snapshot();
    if *snapshots.borrow() != snapshot {
        let _ = snapshots.send(snapshot);
    }
}

//
// ─── HANDLE ────────────────────────────────────────────────────────────────────
//

/// The host-facing surface of a running session.
///
/// Intent methods enqueue events into the session loop; `snapshot` /
/// `changed` read the observable state stream.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    intents: mpsc::Sender<SessionIntent>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// The most recently published state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Waits for the next published state change.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Ended` once the session loop has shut down.
    pub async fn changed(&mut self) -> Result<SessionSnapshot, SessionError> {
        self.snapshots
            .changed()
            .await
            .map_err(|_| SessionError::Ended)?;
        Ok(self.snapshots.borrow_and_update().clone())
    }

    /// Waits until the session reaches `Completed` or `Failed`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Ended` when the loop shuts down without a
    /// terminal phase (an abandoned session).
    pub async fn terminal(&mut self) -> Result<SessionSnapshot, SessionError> {
        loop {
            let snapshot = self.snapshot();
            if snapshot.is_terminal() {
                return Ok(snapshot);
            }
            self.changed().await?;
        }
    }

    pub async fn select_option(&self, question: usize, option: u32) -> Result<(), SessionError> {
        self.send(SessionIntent::SelectOption { question, option })
            .await
    }

    pub async fn go_to_question(&self, index: usize) -> Result<(), SessionError> {
        self.send(SessionIntent::GoToQuestion(index)).await
    }

    pub async fn request_submit(&self) -> Result<(), SessionError> {
        self.send(SessionIntent::RequestSubmit).await
    }

    pub async fn confirm_submit(&self) -> Result<(), SessionError> {
        self.send(SessionIntent::ConfirmSubmit).await
    }

    pub async fn request_exit(&self) -> Result<(), SessionError> {
        self.send(SessionIntent::RequestExit).await
    }

    pub async fn confirm_exit(&self) -> Result<(), SessionError> {
        self.send(SessionIntent::ConfirmExit).await
    }

    pub async fn cancel_exit(&self) -> Result<(), SessionError> {
        self.send(SessionIntent::CancelExit).await
    }

    pub async fn retry_submission(&self) -> Result<(), SessionError> {
        self.send(SessionIntent::RetrySubmission).await
    }

    async fn send(&self, intent: SessionIntent) -> Result<(), SessionError> {
        self.intents
            .send(intent)
            .await
            .map_err(|_| SessionError::Ended)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use quiz_core::model::{
        Answer, Question, QuizDefinition, SubmissionRequest, SubmissionResult,
    };

    use crate::error::{DefinitionFetchError, SubmissionError};
    use crate::session::view::{FailureKind, PendingPrompt};

    struct ScriptedBackend {
        quiz: QuizDefinition,
        fail_fetch: bool,
        network_failures: AtomicU32,
        requests: Mutex<Vec<SubmissionRequest>>,
    }

    impl ScriptedBackend {
        fn new(quiz: QuizDefinition) -> Arc<Self> {
            Arc::new(Self {
                quiz,
                fail_fetch: false,
                network_failures: AtomicU32::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing_fetch(quiz: QuizDefinition) -> Arc<Self> {
            Arc::new(Self {
                quiz,
                fail_fetch: true,
                network_failures: AtomicU32::new(0),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn with_network_failures(quiz: QuizDefinition, failures: u32) -> Arc<Self> {
            Arc::new(Self {
                quiz,
                fail_fetch: false,
                network_failures: AtomicU32::new(failures),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<SubmissionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    /// Produces a genuine `reqwest::Error` transport failure; the crate
    /// offers no public constructor.
    async fn transport_error() -> reqwest::Error {
        reqwest::Client::new()
            .get("http://127.0.0.1:1/unreachable")
            .send()
            .await
            .expect_err("connection to a closed port must fail")
    }

    #[async_trait]
    impl QuizBackend for ScriptedBackend {
        async fn fetch_quiz(&self, _id: QuizId) -> Result<QuizDefinition, DefinitionFetchError> {
            if self.fail_fetch {
                return Err(DefinitionFetchError::NotFound);
            }
            Ok(self.quiz.clone())
        }

        async fn submit_quiz(
            &self,
            _id: QuizId,
            request: &SubmissionRequest,
        ) -> Result<SubmissionResult, SubmissionError> {
            self.requests.lock().unwrap().push(request.clone());
            if self
                .network_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(SubmissionError::Network(transport_error().await));
            }

            let answered = request
                .answers
                .iter()
                .filter(|answer| answer.is_answered())
                .count();
            Ok(SubmissionResult {
                score: 100.0 * answered as f64 / request.answers.len() as f64,
                correct_count: u32::try_from(answered).unwrap(),
                total_questions: u32::try_from(request.answers.len()).unwrap(),
                passed: answered == request.answers.len(),
            })
        }
    }

    fn options(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("option {i}")).collect()
    }

    fn build_quiz(question_count: usize, duration: u32) -> QuizDefinition {
        let questions = (0..question_count)
            .map(|i| Question::new(format!("Q{i}"), options(3)))
            .collect();
        QuizDefinition::new(QuizId::generate(), duration, questions).unwrap()
    }

    async fn wait_for(
        handle: &mut SessionHandle,
        predicate: impl Fn(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        loop {
            let snapshot = handle.snapshot();
            if predicate(&snapshot) {
                return snapshot;
            }
            if handle.changed().await.is_err() {
                return handle.snapshot();
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn clock_expiry_submits_exactly_once() {
        let quiz = build_quiz(3, 30);
        let backend = ScriptedBackend::new(quiz.clone());
        let service = SessionLoopService::new(backend.clone());

        let mut handle = service.start(quiz.id());
        wait_for(&mut handle, |s| s.phase == SessionPhase::Active).await;

        handle.select_option(0, 1).await.unwrap();
        handle.go_to_question(2).await.unwrap();
        handle.select_option(2, 0).await.unwrap();
        wait_for(&mut handle, |s| s.answered == vec![true, false, true]).await;

        // No further intents: the paused clock fast-forwards to expiry.
        let snapshot = handle.terminal().await.unwrap();

        assert_eq!(snapshot.phase, SessionPhase::Completed);
        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].answers,
            vec![Answer::Answered(1), Answer::Unanswered, Answer::Answered(0)]
        );
        assert_eq!(requests[0].time_taken_seconds, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_submit_goes_through_confirmation() {
        let quiz = build_quiz(3, 300);
        let backend = ScriptedBackend::new(quiz.clone());
        let service = SessionLoopService::new(backend.clone());

        let mut handle = service.start(quiz.id());
        wait_for(&mut handle, |s| s.phase == SessionPhase::Active).await;

        handle.select_option(0, 2).await.unwrap();
        handle.request_submit().await.unwrap();
        let snapshot = wait_for(&mut handle, |s| s.prompt.is_some()).await;
        assert_eq!(
            snapshot.prompt,
            Some(PendingPrompt::ConfirmSubmit { unanswered: 2 })
        );

        handle.confirm_submit().await.unwrap();
        let snapshot = handle.terminal().await.unwrap();

        assert_eq!(snapshot.phase, SessionPhase::Completed);
        assert_eq!(backend.requests().len(), 1);
        assert_eq!(
            backend.requests()[0].answers,
            vec![Answer::Answered(2), Answer::Unanswered, Answer::Unanswered]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_failure_is_terminal_without_submission() {
        let quiz = build_quiz(2, 30);
        let backend = ScriptedBackend::failing_fetch(quiz.clone());
        let service = SessionLoopService::new(backend.clone());

        let mut handle = service.start(quiz.id());
        let snapshot = handle.terminal().await.unwrap();

        assert_eq!(snapshot.phase, SessionPhase::Failed);
        assert_eq!(
            snapshot.failure.as_ref().unwrap().kind,
            FailureKind::DefinitionFetch
        );
        assert!(!snapshot.retry_available);
        assert!(backend.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_network_failure_resends_identical_payload() {
        let quiz = build_quiz(1, 600);
        let backend = ScriptedBackend::with_network_failures(quiz.clone(), 1);
        let service = SessionLoopService::new(backend.clone());

        let mut handle = service.start(quiz.id());
        wait_for(&mut handle, |s| s.phase == SessionPhase::Active).await;

        handle.select_option(0, 1).await.unwrap();
        handle.request_submit().await.unwrap();

        let snapshot = handle.terminal().await.unwrap();
        assert_eq!(snapshot.phase, SessionPhase::Failed);
        assert_eq!(
            snapshot.failure.as_ref().unwrap().kind,
            FailureKind::SubmissionNetwork
        );
        assert!(snapshot.retry_available);

        handle.retry_submission().await.unwrap();
        let snapshot = wait_for(&mut handle, |s| s.phase == SessionPhase::Completed).await;

        assert_eq!(snapshot.phase, SessionPhase::Completed);
        let requests = backend.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_exit_never_submits() {
        let quiz = build_quiz(3, 300);
        let backend = ScriptedBackend::new(quiz.clone());
        let service = SessionLoopService::new(backend.clone());

        let mut handle = service.start(quiz.id());
        wait_for(&mut handle, |s| s.phase == SessionPhase::Active).await;

        handle.select_option(0, 1).await.unwrap();
        handle.select_option(1, 1).await.unwrap();
        handle.request_exit().await.unwrap();
        handle.confirm_exit().await.unwrap();

        let snapshot = wait_for(&mut handle, |s| s.abandoned).await;
        assert!(snapshot.abandoned);

        // Drain the state stream until the loop has fully shut down.
        while handle.changed().await.is_ok() {}

        assert!(backend.requests().is_empty());
        assert!(handle.request_submit().await.is_err());
    }
}
