//! Periodic reconciliation against the last-sync record
//!
//! Live notifications miss changes on network mounts and are absent entirely
//! when no watch roots are configured. Every cycle this loop compares the
//! mtime of each path in the record file with the time it was last synced and,
//! on the first stale path, feeds one synthetic notification into the same
//! pipeline a live event would take.

use crate::event::{ChangeNotification, NotificationSink};
use crate::timestamp::StoredTimestamp;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Default sentinel path carried by synthetic notifications
pub const DEFAULT_POLL_PATH: &str = "<poll>";

/// A recorded path whose mtime is newer than its last sync
#[derive(Debug, Clone, PartialEq)]
pub struct StaleEntry {
    pub path: PathBuf,
    pub mtime: f64,
    pub synced_at: StoredTimestamp,
}

/// Periodic reconciliation loop
pub struct PollReconciler {
    /// Record file written by the sync action
    record_path: PathBuf,

    /// Path reported by synthetic notifications
    poll_path: PathBuf,

    /// Cycle cadence (default: 5 minutes)
    interval: Duration,

    /// Slack added to stored timestamps
    tolerance: f64,

    /// Where synthetic notifications go
    sink: Arc<dyn NotificationSink>,
}

impl PollReconciler {
    pub fn new(
        record_path: PathBuf,
        interval: Duration,
        tolerance: f64,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            record_path,
            poll_path: PathBuf::from(DEFAULT_POLL_PATH),
            interval,
            tolerance,
            sink,
        }
    }

    pub fn with_poll_path(mut self, poll_path: PathBuf) -> Self {
        self.poll_path = poll_path;
        self
    }

    /// Run forever; the first cycle happens immediately
    pub async fn run(self) {
        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            record = %self.record_path.display(),
            interval_secs = self.interval.as_secs(),
            tolerance_secs = self.tolerance,
            "starting poll reconciliation"
        );

        loop {
            timer.tick().await;
            self.cycle();
        }
    }

    /// One reconciliation cycle; returns the stale path that triggered, if any
    pub fn cycle(&self) -> Option<StaleEntry> {
        debug!(record = %self.record_path.display(), "poll cycle start");

        match self.scan() {
            Some(stale) => {
                info!(
                    path = %stale.path.display(),
                    mtime = stale.mtime,
                    synced_at = stale.synced_at.epoch_secs(),
                    tolerance_secs = self.tolerance,
                    "polling detected newer mtime"
                );
                self.sink.deliver(ChangeNotification::synthetic(&self.poll_path));
                Some(stale)
            }
            None => {
                info!("poll cycle found no changes");
                None
            }
        }
    }

    /// Find the first recorded path modified after its last sync.
    /// Does not notify anyone.
    pub fn scan(&self) -> Option<StaleEntry> {
        scan_records(&self.record_path, self.tolerance)
    }
}

/// Scan a record file for the first stale path
pub fn scan_records(record_path: &Path, tolerance: f64) -> Option<StaleEntry> {
    let records = load_records(record_path);
    let record_self = resolve(record_path);

    // At most one hit per cycle; more would only restart the same window
    records.iter().find_map(|(key, value)| {
        let path = resolve(Path::new(key));
        if path == record_self || !path.exists() {
            return None;
        }

        let synced_at = StoredTimestamp::from_json(value);
        if synced_at.is_default() {
            debug!(path = %path.display(), value = %value, "unreadable sync timestamp; using epoch");
        }

        let mtime = match modified_secs(&path) {
            Ok(mtime) => mtime,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "cannot stat recorded path");
                return None;
            }
        };

        (mtime > synced_at.epoch_secs() + tolerance).then(|| StaleEntry {
            path,
            mtime,
            synced_at,
        })
    })
}

/// Read the record map; any failure yields an empty map
pub fn load_records(record_path: &Path) -> Map<String, Value> {
    let contents = match std::fs::read_to_string(record_path) {
        Ok(contents) => contents,
        Err(e) => {
            debug!(record = %record_path.display(), error = %e, "cannot read sync record");
            return Map::new();
        }
    };

    match serde_json::from_str::<Value>(&contents) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            debug!(record = %record_path.display(), "sync record is not a JSON object");
            Map::new()
        }
        Err(e) => {
            debug!(record = %record_path.display(), error = %e, "cannot parse sync record");
            Map::new()
        }
    }
}

fn resolve(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn modified_secs(path: &Path) -> std::io::Result<f64> {
    let mtime = std::fs::metadata(path)?.modified()?;
    Ok(match mtime.duration_since(UNIX_EPOCH) {
        Ok(since) => since.as_secs_f64(),
        Err(before) => -before.duration().as_secs_f64(),
    })
}
