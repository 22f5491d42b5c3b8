//! Debounced sync triggering for photosync
//!
//! This crate decides *when* the external sync action runs:
//! - Filtering of raw filesystem notifications
//! - Quiet-period debouncing with a max-wait ceiling
//! - Cross-process single-flight locking
//! - Intake suppression while the action runs
//! - Periodic reconciliation against the last-sync record

pub mod config;
pub mod debounce;
pub mod error;
pub mod event;
pub mod filter;
pub mod live;
pub mod lock;
pub mod reconcile;
pub mod runner;
pub mod scheduler;
pub mod suppression;
pub mod timestamp;

pub use config::WatcherConfig;
pub use debounce::{DebounceConfig, DebounceWindow, FireReason};
pub use error::{Error, Result};
pub use event::{ChangeNotification, EventKind, NotificationSink};
pub use filter::{EventFilter, Verdict};
pub use live::LiveWatcher;
pub use lock::{LockAttempt, LockHandle, SingleFlightLock};
pub use reconcile::{PollReconciler, StaleEntry};
pub use runner::{Action, ActionRunner, ExternalCommand, RunOutcome};
pub use scheduler::{Scheduler, SchedulerSnapshot};
pub use timestamp::StoredTimestamp;
