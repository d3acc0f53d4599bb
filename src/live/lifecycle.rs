use crate::model::{Session, SessionStatus};
use chrono::{DateTime, Utc};

/// Length of the conclusion grace period, in minutes.
pub const CONCLUSION_MINUTES: i64 = 2;

/// Overtime beyond this bound is treated as a clock or parsing anomaly
/// (an epoch-zero start time yields an enormous negative remainder) and
/// must not trigger auto-termination.
pub const OVERTIME_SANITY_MINUTES: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Countdown has not begun; no start time yet.
    NotStarted,
    /// Live with time on the clock.
    CountingDown { remaining: i64 },
    /// Past the budget, inside the grace period (or beyond it, waiting
    /// for the end call to land).
    Conclusion { overtime: i64 },
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    None,
    /// Remaining time first reached zero; the grace period begins.
    ConclusionStarted,
    /// Overtime is inside the sanity window; the host's client must end
    /// the session. Emitted at most once.
    AutoEnd,
}

/// Derives the countdown phase from the session's start time and budget.
///
/// Pure: feed it the session and a `now`, once per second. Conclusion is
/// entered exactly once, and auto-end fires exactly once — only when the
/// overtime lies within the bounded sanity window, so a malformed
/// timestamp can never kill a session the moment it goes live.
#[derive(Debug, Default)]
pub struct LifecycleController {
    conclusion_entered: bool,
    auto_end_fired: bool,
}

impl LifecycleController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self, session: &Session, now: DateTime<Utc>) -> (Phase, LifecycleEvent) {
        if session.status == SessionStatus::Completed {
            return (Phase::Ended, LifecycleEvent::None);
        }

        let start = match (session.status, session.start_time) {
            (SessionStatus::Live, Some(start)) => start,
            _ => return (Phase::NotStarted, LifecycleEvent::None),
        };

        let elapsed = now.signed_duration_since(start).num_minutes();
        let remaining = session.time_limit_minutes() - elapsed;

        if remaining > 0 {
            return (Phase::CountingDown { remaining }, LifecycleEvent::None);
        }

        let overtime = -remaining;

        if !self.conclusion_entered {
            self.conclusion_entered = true;
            return (Phase::Conclusion { overtime }, LifecycleEvent::ConclusionStarted);
        }

        if !self.auto_end_fired
            && remaining <= -CONCLUSION_MINUTES
            && remaining > -OVERTIME_SANITY_MINUTES
        {
            self.auto_end_fired = true;
            return (Phase::Conclusion { overtime }, LifecycleEvent::AutoEnd);
        }

        (Phase::Conclusion { overtime }, LifecycleEvent::None)
    }
}
