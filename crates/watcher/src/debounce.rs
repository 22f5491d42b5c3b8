//! Debounce window with a hard ceiling
//!
//! A burst of activity opens the window; it closes (and an action fires)
//! once either the burst has been quiet for `quiet_period` or the window
//! has been open for `max_wait`, whichever comes first. Plain trailing
//! debounce would starve under continuous activity; the ceiling bounds
//! worst-case latency.
//!
//! This module is a pure state machine over caller-supplied instants. The
//! scheduler owns the timers and calls [`DebounceWindow::record`] for each
//! accepted notification and [`DebounceWindow::check`] when a timer expires.

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Park time for a timer whose deadlines both overflow the clock
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Window tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceConfig {
    /// Trailing silence required before firing
    pub quiet_period: Duration,
    /// Ceiling on total window age
    pub max_wait: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_secs(60),
            max_wait: Duration::from_secs(300),
        }
    }
}

/// Why a window closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FireReason {
    /// Burst went quiet
    Quiet,
    /// Window reached its ceiling
    MaxWait,
}

impl FireReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FireReason::Quiet => "quiet",
            FireReason::MaxWait => "max_wait",
        }
    }
}

impl fmt::Display for FireReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of recording activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Window closed; fire now
    Fire(FireReason),
    /// Window still open; run a quiet-check at this instant
    Arm(Instant),
}

/// Result of a quiet-check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuietCheck {
    /// Window already closed by someone else
    Idle,
    /// Window closed; fire now
    Fire(FireReason),
    /// Activity landed after the timer was armed; check again later
    Rearm(Instant),
}

/// The open interval of unacknowledged activity
#[derive(Debug)]
pub struct DebounceWindow {
    config: DebounceConfig,
    first_activity_at: Option<Instant>,
    last_activity_at: Option<Instant>,
    pending_fire_at: Option<Instant>,
}

impl DebounceWindow {
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            first_activity_at: None,
            last_activity_at: None,
            pending_fire_at: None,
        }
    }

    /// Record an accepted notification at `now`
    pub fn record(&mut self, now: Instant) -> Transition {
        let first = *self.first_activity_at.get_or_insert(now);
        self.last_activity_at = Some(now);

        if now.duration_since(first) >= self.config.max_wait {
            self.reset();
            return Transition::Fire(FireReason::MaxWait);
        }

        let at = self.deadline(first, now);
        self.pending_fire_at = Some(at);
        Transition::Arm(at)
    }

    /// Re-evaluate the window when an armed timer expires
    pub fn check(&mut self, now: Instant) -> QuietCheck {
        let (first, last) = match (self.first_activity_at, self.last_activity_at) {
            (Some(first), Some(last)) => (first, last),
            _ => return QuietCheck::Idle,
        };

        if now.duration_since(first) >= self.config.max_wait {
            self.reset();
            QuietCheck::Fire(FireReason::MaxWait)
        } else if now.duration_since(last) >= self.config.quiet_period {
            self.reset();
            QuietCheck::Fire(FireReason::Quiet)
        } else {
            let at = self.deadline(first, last);
            self.pending_fire_at = Some(at);
            QuietCheck::Rearm(at)
        }
    }

    /// Close the window
    pub fn reset(&mut self) {
        self.first_activity_at = None;
        self.last_activity_at = None;
        self.pending_fire_at = None;
    }

    pub fn is_open(&self) -> bool {
        self.first_activity_at.is_some()
    }

    pub fn first_activity_at(&self) -> Option<Instant> {
        self.first_activity_at
    }

    pub fn last_activity_at(&self) -> Option<Instant> {
        self.last_activity_at
    }

    pub fn pending_fire_at(&self) -> Option<Instant> {
        self.pending_fire_at
    }

    pub fn config(&self) -> DebounceConfig {
        self.config
    }

    /// Nearer of the quiet deadline and the ceiling
    ///
    /// A deadline past the end of the clock is ignored; if both are, the
    /// timer is parked far in the future.
    fn deadline(&self, first: Instant, last: Instant) -> Instant {
        let quiet_at = last.checked_add(self.config.quiet_period);
        let ceiling_at = first.checked_add(self.config.max_wait);
        match (quiet_at, ceiling_at) {
            (Some(quiet_at), Some(ceiling_at)) => quiet_at.min(ceiling_at),
            (Some(at), None) | (None, Some(at)) => at,
            (None, None) => last.checked_add(FAR_FUTURE).unwrap_or(last),
        }
    }
}
