use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Errors from misusing the countdown. These are caller bugs, not runtime
/// conditions: a session arms its countdown exactly once.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CountdownError {
    #[error("countdown is already armed")]
    AlreadyArmed,

    #[error("countdown cannot be armed with zero seconds")]
    ZeroDuration,
}

//
// ─── TICK OUTCOME ──────────────────────────────────────────────────────────────
//

/// Result of advancing the countdown by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Still armed; this many seconds remain.
    Running(u32),
    /// The countdown just reached zero. Reported exactly once per armed
    /// period; the countdown disarms itself before returning this.
    Expired,
    /// Not armed (never started, stopped, or already expired).
    Idle,
}

//
// ─── COUNTDOWN ─────────────────────────────────────────────────────────────────
//

/// Monotonic one-shot countdown.
///
/// Pure state: something external (the session runtime) supplies the ticks.
/// Arm once, tick down, expire at most once. `stop` disarms without expiring
/// and is safe from any state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Countdown {
    remaining: u32,
    armed: bool,
    expired: bool,
}

impl Countdown {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the countdown with the given time budget.
    ///
    /// # Errors
    ///
    /// Returns `CountdownError::AlreadyArmed` if armed, including after a
    /// previous arm/stop cycle: a countdown serves one session. Returns
    /// `CountdownError::ZeroDuration` for a zero budget.
    pub fn start(&mut self, initial_seconds: u32) -> Result<(), CountdownError> {
        if self.armed || self.expired {
            return Err(CountdownError::AlreadyArmed);
        }
        if initial_seconds == 0 {
            return Err(CountdownError::ZeroDuration);
        }
        self.remaining = initial_seconds;
        self.armed = true;
        Ok(())
    }

    /// Advances the countdown by one second.
    ///
    /// On reaching zero the countdown disarms itself and reports
    /// `Tick::Expired`; every later tick is `Tick::Idle`.
    pub fn tick(&mut self) -> Tick {
        if !self.armed {
            return Tick::Idle;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.armed = false;
            self.expired = true;
            return Tick::Expired;
        }
        Tick::Running(self.remaining)
    }

    /// Disarms without expiring. Idempotent; a stopped countdown never fires.
    pub fn stop(&mut self) {
        self.armed = false;
    }

    /// Seconds left on the clock.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Whether this countdown has ever fired.
    #[must_use]
    pub fn has_expired(&self) -> bool {
        self.expired
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
