//! The intent vocabulary the hosting UI speaks to a session.

/// A discrete user-originated event delivered into the session's event loop.
///
/// Intents and clock ticks are the only two inputs the state machine sees;
/// both funnel through the same serialized dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionIntent {
    /// Record the selected option for a question.
    SelectOption { question: usize, option: u32 },
    /// Move the cursor to another question.
    GoToQuestion(usize),
    /// Ask to submit; may come back as a confirmation prompt when questions
    /// are still unanswered.
    RequestSubmit,
    /// Accept the outstanding unanswered-questions prompt.
    ConfirmSubmit,
    /// Ask to leave the session (back navigation).
    RequestExit,
    /// Accept the quit prompt: abandon without submitting.
    ConfirmExit,
    /// Dismiss the quit prompt and stay in the session.
    CancelExit,
    /// Resend the frozen payload after a retryable submission failure.
    RetrySubmission,
}

/// What applying an intent (or a clock tick) did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentOutcome {
    /// State changed (answer recorded, cursor moved, prompt dismissed, tick
    /// counted down).
    Applied,
    /// The event was dropped: wrong phase, finalize latch already set, or a
    /// prompt-response with no prompt outstanding.
    Ignored,
    /// Submit needs explicit confirmation; this many questions are
    /// unanswered.
    ConfirmSubmit { unanswered: usize },
    /// Leaving needs explicit confirmation.
    ConfirmQuit,
    /// The finalize latch was just won; the frozen payload is ready for the
    /// reconciler. Produced at most once per session, plus once per explicit
    /// retry.
    Finalized,
    /// The session was abandoned without finalizing.
    Abandoned,
}
