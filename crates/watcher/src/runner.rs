//! Running the external sync action under the single-flight lock

use crate::debounce::FireReason;
use crate::error::{Error, Result};
use crate::lock::{LockAttempt, LockHandle, SingleFlightLock};
use crate::scheduler::SharedState;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Environment variable telling the action why it was started
pub const REASON_ENV: &str = "PHOTOSYNC_TRIGGER_REASON";

/// Something the scheduler can run when a window closes
#[async_trait]
pub trait Action: Send + Sync {
    /// Short description for logs
    fn describe(&self) -> String;

    /// Run to completion, returning the exit code if there is one
    async fn run(&self, reason: FireReason) -> Result<Option<i32>>;
}

/// External executable, spawned once per fire
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    path: PathBuf,
    args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(path: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            path: path.into(),
            args,
        }
    }
}

#[async_trait]
impl Action for ExternalCommand {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn run(&self, reason: FireReason) -> Result<Option<i32>> {
        if !is_executable(&self.path) {
            return Err(Error::ActionMissing(self.path.clone()));
        }

        info!(action = %self.path.display(), reason = %reason, "launching action");

        // No timeout: a stuck action keeps the lock until it exits
        let status = tokio::process::Command::new(&self.path)
            .args(&self.args)
            .env(REASON_ENV, reason.as_str())
            .status()
            .await
            .map_err(|source| Error::Spawn {
                path: self.path.clone(),
                source,
            })?;

        Ok(status.code())
    }
}

/// Regular file with at least one execute bit
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

/// How a fire attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Another holder has the lock; trigger dropped
    Busy,
    /// Lock file unusable; trigger dropped
    LockFailed,
    /// Action executable missing or not executable
    Missing,
    /// Action ran and exited (code is `None` when killed by a signal)
    Exited(Option<i32>),
    /// Action could not be spawned or awaited
    Failed,
}

/// Executes the action while holding the lock and muting intake
pub struct ActionRunner {
    lock: SingleFlightLock,
    action: Arc<dyn Action>,
}

impl std::fmt::Debug for ActionRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRunner")
            .field("lock", &self.lock)
            .field("action", &self.action.describe())
            .finish()
    }
}

impl ActionRunner {
    pub fn new(lock: SingleFlightLock, action: Arc<dyn Action>) -> Self {
        Self { lock, action }
    }

    /// One fire attempt. Never fails; every problem becomes a logged outcome.
    pub(crate) async fn run(&self, reason: FireReason, state: &SharedState) -> RunOutcome {
        info!(
            reason = %reason,
            lock = %self.lock.path().display(),
            "trigger: acquiring lock"
        );

        let handle = match self.lock.try_acquire() {
            LockAttempt::Acquired(handle) => handle,
            LockAttempt::Busy => {
                match self.lock.holder() {
                    Some(holder) => info!(pid = holder.pid, "another sync is running; skipping trigger"),
                    None => info!("another sync is running; skipping trigger"),
                }
                return RunOutcome::Busy;
            }
            LockAttempt::Error(e) => {
                error!(error = %e, "cannot take sync lock; skipping trigger");
                return RunOutcome::LockFailed;
            }
        };

        // Released on every exit path, including a panic in the action
        let _guard = RunGuard::engage(state, handle);

        match self.action.run(reason).await {
            Ok(Some(0)) => {
                info!(action = %self.action.describe(), "action finished with code 0");
                RunOutcome::Exited(Some(0))
            }
            Ok(code) => {
                warn!(action = %self.action.describe(), code = ?code, "action finished unsuccessfully");
                RunOutcome::Exited(code)
            }
            Err(Error::ActionMissing(path)) => {
                error!(action = %path.display(), "action not found or not executable");
                RunOutcome::Missing
            }
            Err(e) => {
                error!(action = %self.action.describe(), error = ?e, "action failed");
                RunOutcome::Failed
            }
        }
    }
}

/// Holds the lock and suppression for the duration of one run
struct RunGuard<'a> {
    state: &'a SharedState,
    handle: LockHandle,
}

impl<'a> RunGuard<'a> {
    fn engage(state: &'a SharedState, handle: LockHandle) -> Self {
        state.lock().suppression.engage();
        Self { state, handle }
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.handle.release();
        self.state.lock().finish_run();
        info!("lock released; intake resumed");
    }
}
