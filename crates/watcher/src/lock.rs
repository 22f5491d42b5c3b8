//! Cross-process single-flight lock
//!
//! An advisory `flock` on a well-known path. Acquisition never blocks: if
//! another process (or another open handle in this one) holds the lock the
//! attempt reports [`LockAttempt::Busy`] and the caller drops its trigger.
//! The kernel releases the lock when the holder exits, so a crash can never
//! leave the system permanently locked.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lock file location
#[derive(Debug, Clone)]
pub struct SingleFlightLock {
    path: PathBuf,
}

/// Tri-state acquisition result
#[derive(Debug)]
pub enum LockAttempt {
    /// Lock is ours until the handle is released or dropped
    Acquired(LockHandle),
    /// Someone else is running an action
    Busy,
    /// Lock file could not be opened or locked
    Error(Error),
}

/// Diagnostic content written by the holder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
    pub pid: u32,
    pub started_at: u64,
}

impl SingleFlightLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Try to take the lock without waiting
    pub fn try_acquire(&self) -> LockAttempt {
        let mut file = match self.open() {
            Ok(file) => file,
            Err(e) => return LockAttempt::Error(e),
        };

        match try_flock_exclusive(&file) {
            Ok(true) => {}
            Ok(false) => return LockAttempt::Busy,
            Err(source) => {
                return LockAttempt::Error(Error::Lock {
                    path: self.path.clone(),
                    source,
                })
            }
        }

        // Content is informational; a failed write must not cost us the lock
        if let Err(e) = write_holder(&mut file) {
            debug!(path = %self.path.display(), error = %e, "failed to record lock holder");
        }

        LockAttempt::Acquired(LockHandle {
            path: self.path.clone(),
            file: Some(file),
        })
    }

    /// Read the last recorded holder, if any
    pub fn holder(&self) -> Option<LockHolder> {
        let mut contents = String::new();
        File::open(&self.path)
            .and_then(|mut f| f.read_to_string(&mut contents))
            .ok()?;
        serde_json::from_str(&contents).ok()
    }

    fn open(&self) -> Result<File> {
        let lock_err = |source| Error::Lock {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(lock_err)?;
            }
        }

        OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.path)
            .map_err(lock_err)
    }
}

/// Proof of holding the lock
///
/// The lock file itself stays on disk; only the flock is released.
#[derive(Debug)]
pub struct LockHandle {
    path: PathBuf,
    file: Option<File>,
}

impl LockHandle {
    /// Release the lock. Idempotent.
    pub fn release(&mut self) {
        // Closing the descriptor drops the flock
        if self.file.take().is_some() {
            debug!(path = %self.path.display(), "lock released");
        }
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Try to acquire exclusive file lock (non-blocking)
#[cfg(unix)]
fn try_flock_exclusive(file: &File) -> std::io::Result<bool> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(()) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(std::io::Error::from(e)),
    }
}

fn write_holder(file: &mut File) -> std::io::Result<()> {
    let holder = LockHolder {
        pid: std::process::id(),
        started_at: current_timestamp_ms(),
    };
    let serialized = serde_json::to_string(&holder)?;

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(serialized.as_bytes())?;
    file.flush()
}

fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_is_busy() {
        let temp_dir = TempDir::new().unwrap();
        let lock = SingleFlightLock::new(temp_dir.path().join("sync.lock"));

        let first = lock.try_acquire();
        assert!(matches!(first, LockAttempt::Acquired(_)));

        // Separate open file description, same process: still excluded
        assert!(matches!(lock.try_acquire(), LockAttempt::Busy));

        drop(first);
        assert!(matches!(lock.try_acquire(), LockAttempt::Acquired(_)));
    }

    #[test]
    fn test_release_is_idempotent_and_keeps_file() {
        let temp_dir = TempDir::new().unwrap();
        let lock = SingleFlightLock::new(temp_dir.path().join("sync.lock"));

        let mut handle = match lock.try_acquire() {
            LockAttempt::Acquired(h) => h,
            other => panic!("expected lock, got {:?}", other),
        };
        assert!(handle.is_held());

        handle.release();
        handle.release();
        assert!(!handle.is_held());
        assert!(lock.path().exists());

        assert!(matches!(lock.try_acquire(), LockAttempt::Acquired(_)));
    }

    #[test]
    fn test_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let lock = SingleFlightLock::new(temp_dir.path().join("cache/photosync/.photosync.lock"));

        assert!(matches!(lock.try_acquire(), LockAttempt::Acquired(_)));
        assert!(lock.path().exists());
    }

    #[test]
    fn test_holder_records_pid() {
        let temp_dir = TempDir::new().unwrap();
        let lock = SingleFlightLock::new(temp_dir.path().join("sync.lock"));

        let _handle = lock.try_acquire();
        let holder = lock.holder().unwrap();
        assert_eq!(holder.pid, std::process::id());
        assert!(holder.started_at > 0);
    }

    #[test]
    fn test_unopenable_path_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let lock = SingleFlightLock::new(blocker.join("sync.lock"));
        assert!(matches!(lock.try_acquire(), LockAttempt::Error(Error::Lock { .. })));
    }
}
