//! Gatekeeping for incoming change notifications

use crate::event::ChangeNotification;
use tracing::{debug, info};

/// Outcome of filtering a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Notification counts as activity
    Accept,
    /// Subject is a directory
    Directory,
    /// An action is running; its own writes are noise
    Suppressed,
    /// Read-only or unknown event kind
    IgnoredKind,
}

impl Verdict {
    pub fn is_accepted(self) -> bool {
        self == Verdict::Accept
    }
}

/// Stateless classifier; suppression is passed in by the scheduler
/// which reads it under the state lock.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventFilter;

impl EventFilter {
    pub fn new() -> Self {
        Self
    }

    /// Decide whether a notification should reach the debounce window
    ///
    /// Pure; the scheduler calls this under its state lock and logs the
    /// verdict with [`EventFilter::report`] afterwards.
    pub fn evaluate(&self, notification: &ChangeNotification, suppressed: bool) -> Verdict {
        if notification.is_directory {
            Verdict::Directory
        } else if suppressed {
            Verdict::Suppressed
        } else if !notification.kind.schedules_sync() {
            Verdict::IgnoredKind
        } else {
            Verdict::Accept
        }
    }

    pub fn report(&self, notification: &ChangeNotification, verdict: Verdict) {
        let path = notification.path.display();
        match verdict {
            Verdict::Accept => {
                info!(kind = %notification.kind, path = %path, "change accepted");
            }
            Verdict::Directory => {
                debug!(kind = %notification.kind, path = %path, "ignoring directory event");
            }
            Verdict::Suppressed => {
                debug!(kind = %notification.kind, path = %path, "suppressed during action run");
            }
            Verdict::IgnoredKind => {
                debug!(kind = %notification.kind, path = %path, "ignoring event kind");
            }
        }
    }
}
