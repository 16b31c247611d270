use std::sync::atomic::{AtomicU8, Ordering};

use chrono::{DateTime, Utc};

use quiz_core::countdown::{Countdown, Tick};
use quiz_core::model::{AnswerLedger, QuizDefinition, QuizId, SubmissionRequest, SubmissionResult};
use quiz_core::time::Clock;

use crate::error::{DefinitionFetchError, SessionError, SubmissionError};
use crate::session::guard::ExitGuard;
use crate::session::intent::{IntentOutcome, SessionIntent};
use crate::session::view::{FailureNotice, PendingPrompt, SessionSnapshot};

//
// ─── PHASE ─────────────────────────────────────────────────────────────────────
//

/// Lifecycle phase of one quiz attempt.
///
/// Moves forward only: `Loading → Active → Finalizing → {Completed, Failed}`.
/// The single backward edge is `Failed → Finalizing` on an explicit retry of
/// a network-failed submission; `Active` is never re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionPhase {
    Loading = 0,
    Active = 1,
    Finalizing = 2,
    Completed = 3,
    Failed = 4,
}

impl SessionPhase {
    /// Whether this phase admits no further transitions except retry.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionPhase::Completed | SessionPhase::Failed)
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SessionPhase::Loading,
            1 => SessionPhase::Active,
            2 => SessionPhase::Finalizing,
            3 => SessionPhase::Completed,
            _ => SessionPhase::Failed,
        }
    }
}

/// Atomic cell holding the phase.
///
/// The `Active → Finalizing` edge is a compare-and-set so the two finalize
/// producers (manual submit, clock expiry) stay serialized even under a
/// future concurrent scheduler; the first trigger wins and the loser
/// observes the failed swap.
#[derive(Debug)]
struct PhaseCell(AtomicU8);

impl PhaseCell {
    fn new(phase: SessionPhase) -> Self {
        Self(AtomicU8::new(phase as u8))
    }

    fn load(&self) -> SessionPhase {
        SessionPhase::from_u8(self.0.load(Ordering::Acquire))
    }

    fn store(&self, phase: SessionPhase) {
        self.0.store(phase as u8, Ordering::Release);
    }

    /// The finalize latch: succeeds at most once per session.
    fn try_finalize(&self) -> bool {
        self.0
            .compare_exchange(
                SessionPhase::Active as u8,
                SessionPhase::Finalizing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// Which producer won the finalize latch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeTrigger {
    ManualSubmit,
    ClockExpiry,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// State machine for one timed quiz attempt.
///
/// Owns the answer ledger and the countdown; the hosting runtime feeds it
/// intents and clock ticks as discrete events on a single logical thread.
/// Everything after the finalize latch is frozen: late intents are reported
/// as `IntentOutcome::Ignored` and leave no observable trace.
pub struct QuizSession {
    quiz_id: QuizId,
    clock: Clock,
    phase: PhaseCell,
    definition: Option<QuizDefinition>,
    duration_seconds: u32,
    question_count: usize,
    current_question: usize,
    ledger: AnswerLedger,
    countdown: Countdown,
    exit_guard: ExitGuard,
    pending_submit: bool,
    abandoned: bool,
    started_at: Option<DateTime<Utc>>,
    frozen: Option<SubmissionRequest>,
    finalize_trigger: Option<FinalizeTrigger>,
    result: Option<SubmissionResult>,
    failure: Option<FailureNotice>,
}

impl QuizSession {
    /// Creates a session in `Loading` for the given quiz.
    #[must_use]
    pub fn new(quiz_id: QuizId, clock: Clock) -> Self {
        Self {
            quiz_id,
            clock,
            phase: PhaseCell::new(SessionPhase::Loading),
            definition: None,
            duration_seconds: 0,
            question_count: 0,
            current_question: 0,
            ledger: AnswerLedger::new(),
            countdown: Countdown::new(),
            exit_guard: ExitGuard::new(),
            pending_submit: false,
            abandoned: false,
            started_at: None,
            frozen: None,
            finalize_trigger: None,
            result: None,
            failure: None,
        }
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase.load()
    }

    #[must_use]
    pub fn definition(&self) -> Option<&QuizDefinition> {
        self.definition.as_ref()
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// The payload frozen at finalize time, if the latch has been won.
    #[must_use]
    pub fn frozen_request(&self) -> Option<&SubmissionRequest> {
        self.frozen.as_ref()
    }

    #[must_use]
    pub fn finalize_trigger(&self) -> Option<FinalizeTrigger> {
        self.finalize_trigger
    }

    #[must_use]
    pub fn result(&self) -> Option<&SubmissionResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn failure(&self) -> Option<&FailureNotice> {
        self.failure.as_ref()
    }

    /// Whether an explicit retry of the submission is currently possible.
    #[must_use]
    pub fn retry_available(&self) -> bool {
        self.phase.load() == SessionPhase::Failed
            && self.frozen.is_some()
            && self.failure.as_ref().is_some_and(|notice| notice.retryable)
    }

    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    //
    // ─── LOADING ───────────────────────────────────────────────────────────────
    //

    /// `Loading → Active`: installs the fetched definition and arms the
    /// countdown with its full time budget.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::IllegalPhase` outside `Loading` and propagates
    /// countdown arming errors (both caller bugs).
    pub fn definition_ready(&mut self, definition: QuizDefinition) -> Result<(), SessionError> {
        if self.phase.load() != SessionPhase::Loading {
            return Err(SessionError::IllegalPhase { expected: "loading" });
        }

        self.countdown.start(definition.duration_seconds())?;
        self.duration_seconds = definition.duration_seconds();
        self.question_count = definition.question_count();
        self.started_at = Some(self.clock.now());
        tracing::debug!(
            quiz_id = %self.quiz_id,
            questions = self.question_count,
            duration = self.duration_seconds,
            "session active"
        );
        self.definition = Some(definition);
        self.phase.store(SessionPhase::Active);
        Ok(())
    }

    /// `Loading → Failed`: the definition never arrived; no countdown was
    /// armed and nothing will be submitted.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::IllegalPhase` outside `Loading`.
    pub fn definition_failed(&mut self, error: &DefinitionFetchError) -> Result<(), SessionError> {
        if self.phase.load() != SessionPhase::Loading {
            return Err(SessionError::IllegalPhase { expected: "loading" });
        }
        tracing::warn!(quiz_id = %self.quiz_id, %error, "quiz definition fetch failed");
        self.failure = Some(FailureNotice::from(error));
        self.phase.store(SessionPhase::Failed);
        Ok(())
    }

    //
    // ─── INTENTS ───────────────────────────────────────────────────────────────
    //

    /// Applies one user intent as a discrete event.
    ///
    /// # Errors
    ///
    /// Propagates the per-intent caller errors (out-of-range indices,
    /// retry without a retryable failure). Rejected-but-legal intents are
    /// `Ok(IntentOutcome::Ignored)`, never errors.
    pub fn apply(&mut self, intent: SessionIntent) -> Result<IntentOutcome, SessionError> {
        match intent {
            SessionIntent::SelectOption { question, option } => {
                self.select_option(question, option)
            }
            SessionIntent::GoToQuestion(index) => self.go_to_question(index),
            SessionIntent::RequestSubmit => Ok(self.request_submit()),
            SessionIntent::ConfirmSubmit => Ok(self.confirm_submit()),
            SessionIntent::RequestExit => Ok(self.request_exit()),
            SessionIntent::ConfirmExit => Ok(self.confirm_exit()),
            SessionIntent::CancelExit => Ok(self.cancel_exit()),
            SessionIntent::RetrySubmission => self.retry_submission(),
        }
    }

    /// Records the selected option for a question; later selections
    /// overwrite earlier ones.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::QuestionOutOfRange` / `OptionOutOfRange` for
    /// indices outside the quiz — caller bugs, not rejected intents.
    pub fn select_option(
        &mut self,
        question: usize,
        option: u32,
    ) -> Result<IntentOutcome, SessionError> {
        let Some(definition) = self.active_definition() else {
            return Ok(IntentOutcome::Ignored);
        };

        let Some(target) = definition.question(question) else {
            return Err(SessionError::QuestionOutOfRange {
                index: question,
                count: definition.question_count(),
            });
        };
        let count = target.option_count();
        if option as usize >= count {
            return Err(SessionError::OptionOutOfRange {
                question,
                option,
                count,
            });
        }

        self.ledger.select(question, option);
        Ok(IntentOutcome::Applied)
    }

    /// Moves the cursor to another question, bounds-checked.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::QuestionOutOfRange` for an index outside the
    /// quiz.
    pub fn go_to_question(&mut self, index: usize) -> Result<IntentOutcome, SessionError> {
        let Some(definition) = self.active_definition() else {
            return Ok(IntentOutcome::Ignored);
        };

        if index >= definition.question_count() {
            return Err(SessionError::QuestionOutOfRange {
                index,
                count: definition.question_count(),
            });
        }
        self.current_question = index;
        Ok(IntentOutcome::Applied)
    }

    /// Asks to submit. With everything answered this finalizes immediately;
    /// otherwise it surfaces a confirmation carrying the unanswered count
    /// and leaves the session untouched.
    pub fn request_submit(&mut self) -> IntentOutcome {
        if self.active_definition().is_none() {
            return IntentOutcome::Ignored;
        }

        let unanswered = self.ledger.unanswered_count(self.question_count);
        if unanswered > 0 {
            self.pending_submit = true;
            return IntentOutcome::ConfirmSubmit { unanswered };
        }
        self.finalize(FinalizeTrigger::ManualSubmit)
    }

    /// Accepts the unanswered-questions prompt and finalizes. Ignored when
    /// no such prompt is outstanding.
    pub fn confirm_submit(&mut self) -> IntentOutcome {
        if self.active_definition().is_none() || !self.pending_submit {
            return IntentOutcome::Ignored;
        }
        self.finalize(FinalizeTrigger::ManualSubmit)
    }

    /// Routes a leave intent through the exit guard.
    pub fn request_exit(&mut self) -> IntentOutcome {
        if self.active_definition().is_none() {
            return IntentOutcome::Ignored;
        }
        self.exit_guard.request();
        IntentOutcome::ConfirmQuit
    }

    /// Confirms the quit prompt: stops the clock and abandons the attempt
    /// without finalizing. No submission is ever sent for an abandoned
    /// session.
    pub fn confirm_exit(&mut self) -> IntentOutcome {
        if self.active_definition().is_none() || !self.exit_guard.confirm() {
            return IntentOutcome::Ignored;
        }
        self.countdown.stop();
        self.abandoned = true;
        tracing::debug!(quiz_id = %self.quiz_id, "session abandoned");
        IntentOutcome::Abandoned
    }

    /// Dismisses the quit prompt; the session continues untouched.
    pub fn cancel_exit(&mut self) -> IntentOutcome {
        if self.active_definition().is_none() || !self.exit_guard.is_pending() {
            return IntentOutcome::Ignored;
        }
        self.exit_guard.cancel();
        IntentOutcome::Applied
    }

    /// `Failed → Finalizing` for an explicit retry after a network failure.
    /// The frozen payload is reused as-is; `Active` is not re-entered.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoRetryAvailable` when the stored failure is
    /// terminal (server rejection) or nothing was ever frozen.
    pub fn retry_submission(&mut self) -> Result<IntentOutcome, SessionError> {
        if self.phase.load() != SessionPhase::Failed {
            return Ok(IntentOutcome::Ignored);
        }
        if !self.retry_available() {
            return Err(SessionError::NoRetryAvailable);
        }
        tracing::debug!(quiz_id = %self.quiz_id, "retrying submission");
        self.failure = None;
        self.phase.store(SessionPhase::Finalizing);
        Ok(IntentOutcome::Finalized)
    }

    //
    // ─── CLOCK ─────────────────────────────────────────────────────────────────
    //

    /// Delivers one clock tick. On expiry the session finalizes
    /// unconditionally — time running out is never gated on a confirmation,
    /// and it bypasses any outstanding quit prompt.
    pub fn tick(&mut self) -> IntentOutcome {
        if self.abandoned {
            return IntentOutcome::Ignored;
        }
        match self.countdown.tick() {
            Tick::Running(_) => IntentOutcome::Applied,
            Tick::Expired => self.finalize(FinalizeTrigger::ClockExpiry),
            Tick::Idle => IntentOutcome::Ignored,
        }
    }

    /// The single guarded entry into `Finalizing`.
    ///
    /// Wins the latch at most once; the losing trigger sees the failed CAS
    /// and drops out. On the winning path the countdown is stopped, pending
    /// prompts are cleared, and the answer vector plus elapsed time are
    /// frozen for the reconciler.
    fn finalize(&mut self, trigger: FinalizeTrigger) -> IntentOutcome {
        if !self.phase.try_finalize() {
            return IntentOutcome::Ignored;
        }

        self.countdown.stop();
        self.pending_submit = false;
        self.exit_guard.cancel();

        let elapsed = self.duration_seconds - self.countdown.remaining();
        let answers = self.ledger.to_vector(self.question_count);
        self.frozen = Some(SubmissionRequest::new(answers, elapsed));
        self.finalize_trigger = Some(trigger);
        tracing::debug!(quiz_id = %self.quiz_id, ?trigger, elapsed, "session finalized");
        IntentOutcome::Finalized
    }

    //
    // ─── SUBMISSION OUTCOME ────────────────────────────────────────────────────
    //

    /// `Finalizing → Completed`: the scoring endpoint accepted the attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::IllegalPhase` outside `Finalizing`.
    pub fn complete_submission(&mut self, result: SubmissionResult) -> Result<(), SessionError> {
        if self.phase.load() != SessionPhase::Finalizing {
            return Err(SessionError::IllegalPhase {
                expected: "finalizing",
            });
        }
        tracing::debug!(quiz_id = %self.quiz_id, score = result.score, "submission scored");
        self.result = Some(result);
        self.phase.store(SessionPhase::Completed);
        Ok(())
    }

    /// `Finalizing → Failed`: the scoring call failed with a typed reason.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::IllegalPhase` outside `Finalizing`.
    pub fn fail_submission(&mut self, error: &SubmissionError) -> Result<(), SessionError> {
        if self.phase.load() != SessionPhase::Finalizing {
            return Err(SessionError::IllegalPhase {
                expected: "finalizing",
            });
        }
        tracing::warn!(
            quiz_id = %self.quiz_id,
            %error,
            retryable = error.is_retryable(),
            "submission failed"
        );
        self.failure = Some(FailureNotice::from(error));
        self.phase.store(SessionPhase::Failed);
        Ok(())
    }

    //
    // ─── VIEW ──────────────────────────────────────────────────────────────────
    //

    /// Snapshot of the observable state, published after every event.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let prompt = if self.exit_guard.is_pending() {
            Some(PendingPrompt::ConfirmQuit)
        } else if self.pending_submit {
            Some(PendingPrompt::ConfirmSubmit {
                unanswered: self.ledger.unanswered_count(self.question_count),
            })
        } else {
            None
        };

        SessionSnapshot {
            phase: self.phase.load(),
            current_question: self.current_question,
            total_questions: self.question_count,
            answered: (0..self.question_count)
                .map(|index| self.ledger.get(index).is_answered())
                .collect(),
            remaining_seconds: self.countdown.remaining(),
            unanswered: self.ledger.unanswered_count(self.question_count),
            prompt,
            result: self.result.clone(),
            failure: self.failure.clone(),
            retry_available: self.retry_available(),
            abandoned: self.abandoned,
        }
    }

    /// The definition, but only while intents may still mutate state.
    fn active_definition(&self) -> Option<&QuizDefinition> {
        if self.abandoned || self.phase.load() != SessionPhase::Active {
            return None;
        }
        self.definition.as_ref()
    }
}

impl std::fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuizSession")
            .field("quiz_id", &self.quiz_id)
            .field("phase", &self.phase.load())
            .field("current_question", &self.current_question)
            .field("answered", &self.ledger.answered_count())
            .field("remaining_seconds", &self.countdown.remaining())
            .field("abandoned", &self.abandoned)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
