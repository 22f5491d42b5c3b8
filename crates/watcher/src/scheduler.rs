//! Trigger scheduler
//!
//! Owns the only mutable state in the pipeline: the debounce window, the
//! suppression flag and the handle of the armed quiet-check timer, all behind
//! one mutex. Critical sections only classify, transition and swap timer
//! handles; logging and the action itself happen outside the lock.

use crate::debounce::{DebounceConfig, DebounceWindow, FireReason, QuietCheck, Transition};
use crate::event::{ChangeNotification, NotificationSink};
use crate::filter::{EventFilter, Verdict};
use crate::runner::ActionRunner;
use crate::suppression::SuppressionGate;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info};

pub(crate) type SharedState = Arc<Mutex<SchedulerState>>;

/// State guarded by the scheduler mutex
#[derive(Debug)]
pub(crate) struct SchedulerState {
    pub(crate) window: DebounceWindow,
    pub(crate) suppression: SuppressionGate,
    timer: Option<ArmedTimer>,
    next_timer_id: u64,
}

#[derive(Debug)]
struct ArmedTimer {
    id: u64,
    handle: AbortHandle,
}

impl SchedulerState {
    pub(crate) fn new(window: DebounceWindow) -> Self {
        Self {
            window,
            suppression: SuppressionGate::new(),
            timer: None,
            next_timer_id: 0,
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.handle.abort();
        }
    }

    /// End of an action run: intake back on, window empty
    pub(crate) fn finish_run(&mut self) {
        self.suppression.release();
        self.window.reset();
        self.cancel_timer();
    }
}

/// Point-in-time view of the scheduler, for logs and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    pub window_open: bool,
    pub first_activity_at: Option<Instant>,
    pub last_activity_at: Option<Instant>,
    pub pending_fire_at: Option<Instant>,
    pub suppressed: bool,
    pub timer_armed: bool,
}

/// Cheaply cloneable handle to the shared scheduler
#[derive(Clone, Debug)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    state: SharedState,
    config: DebounceConfig,
    filter: EventFilter,
    runner: ActionRunner,
    runtime: Handle,
}

impl NotificationSink for Scheduler {
    fn deliver(&self, notification: ChangeNotification) {
        self.notify(notification);
    }
}

impl Scheduler {
    /// Create a scheduler bound to the current tokio runtime
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new(config: DebounceConfig, runner: ActionRunner) -> Self {
        Self::with_runtime(config, runner, Handle::current())
    }

    /// Create a scheduler that spawns timers and runs on `runtime`
    ///
    /// Use this when notifications arrive on threads outside the runtime.
    pub fn with_runtime(config: DebounceConfig, runner: ActionRunner, runtime: Handle) -> Self {
        let state = SchedulerState::new(DebounceWindow::new(config));
        Self {
            inner: Arc::new(Inner {
                state: Arc::new(Mutex::new(state)),
                config,
                filter: EventFilter::new(),
                runner,
                runtime,
            }),
        }
    }

    /// Feed one notification through the filter and, if accepted, the window
    pub fn notify(&self, notification: ChangeNotification) -> Verdict {
        let now = Instant::now();
        let mut state = self.inner.state.lock();

        let verdict = self
            .inner
            .filter
            .evaluate(&notification, state.suppression.is_active());
        if !verdict.is_accepted() {
            drop(state);
            self.inner.filter.report(&notification, verdict);
            return verdict;
        }

        let opened = !state.window.is_open();
        state.cancel_timer();
        let transition = state.window.record(now);
        if let Transition::Arm(at) = transition {
            self.arm(&mut state, at);
        }
        drop(state);

        self.inner.filter.report(&notification, verdict);
        if opened {
            let config = self.inner.config;
            info!(
                path = %notification.path.display(),
                quiet_secs = config.quiet_period.as_secs(),
                max_wait_secs = config.max_wait.as_secs(),
                "first change detected; opening window"
            );
        }

        match transition {
            Transition::Fire(reason) => {
                info!(reason = %reason, "max wait reached; triggering immediately");
                self.fire(reason);
            }
            Transition::Arm(at) => {
                debug!(
                    fire_in_ms = at.saturating_duration_since(now).as_millis() as u64,
                    "quiet-check armed"
                );
            }
        }

        verdict
    }

    /// Cancel the pending quiet-check; used on shutdown
    pub fn cancel_pending(&self) {
        self.inner.state.lock().cancel_timer();
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let state = self.inner.state.lock();
        SchedulerSnapshot {
            window_open: state.window.is_open(),
            first_activity_at: state.window.first_activity_at(),
            last_activity_at: state.window.last_activity_at(),
            pending_fire_at: state.window.pending_fire_at(),
            suppressed: state.suppression.is_active(),
            timer_armed: state.timer.is_some(),
        }
    }

    pub fn is_suppressed(&self) -> bool {
        self.inner.state.lock().suppression.is_active()
    }

    /// Spawn a one-shot quiet-check and store its handle
    fn arm(&self, state: &mut SchedulerState, at: Instant) {
        state.cancel_timer();

        let id = state.next_timer_id;
        state.next_timer_id += 1;

        let scheduler = self.clone();
        let task = self.inner.runtime.spawn(async move {
            tokio::time::sleep_until(at).await;
            scheduler.quiet_check(id);
        });

        state.timer = Some(ArmedTimer {
            id,
            handle: task.abort_handle(),
        });
    }

    fn quiet_check(&self, id: u64) {
        let now = Instant::now();
        let mut state = self.inner.state.lock();

        // A newer notification re-armed after this timer woke up; it owns the window
        let current = state.timer.as_ref().map(|timer| timer.id) == Some(id);
        if !current {
            drop(state);
            debug!(timer = id, "quiet-check superseded");
            return;
        }
        state.timer = None;

        let check = state.window.check(now);
        if let QuietCheck::Rearm(at) = check {
            self.arm(&mut state, at);
        }
        drop(state);

        match check {
            QuietCheck::Idle => debug!("quiet-check found empty window"),
            QuietCheck::Fire(FireReason::Quiet) => {
                info!(reason = %FireReason::Quiet, "quiet period complete; triggering");
                self.fire(FireReason::Quiet);
            }
            QuietCheck::Fire(reason) => {
                info!(reason = %reason, "max wait reached; triggering");
                self.fire(reason);
            }
            QuietCheck::Rearm(at) => {
                debug!(
                    remaining_ms = at.saturating_duration_since(now).as_millis() as u64,
                    "activity since arming; quiet-check re-armed"
                );
            }
        }
    }

    /// Run the action on its own task so the next window is never blocked
    fn fire(&self, reason: FireReason) {
        let scheduler = self.clone();
        self.inner.runtime.spawn(async move {
            let inner = &scheduler.inner;
            let outcome = inner.runner.run(reason, &inner.state).await;
            debug!(reason = %reason, outcome = ?outcome, "fire attempt finished");
        });
    }
}
