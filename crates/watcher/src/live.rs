//! Live filesystem notifications via `notify`
//!
//! The platform watcher pushes raw events into a channel; one dedicated
//! thread drains it, splits events per path and hands them to the sink.

use crate::error::Result;
use crate::event::{ChangeNotification, NotificationSink};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Recursive watch over the configured source roots
pub struct LiveWatcher {
    watcher: Option<RecommendedWatcher>,
    roots: Vec<PathBuf>,
}

impl LiveWatcher {
    /// Register every root that can be watched; failures are logged and skipped
    pub fn start(roots: &[PathBuf], sink: Arc<dyn NotificationSink>) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded::<notify::Result<notify::Event>>();
        let mut watcher = RecommendedWatcher::new(
            move |event| {
                let _ = tx.send(event);
            },
            notify::Config::default(),
        )?;

        let mut watched = Vec::new();
        for root in roots {
            match watcher.watch(root, RecursiveMode::Recursive) {
                Ok(()) => {
                    info!(root = %root.display(), "watching");
                    watched.push(root.clone());
                }
                Err(e) => warn!(root = %root.display(), error = %e, "cannot watch root; skipping"),
            }
        }

        // Ends when the watcher (and with it the sender) is dropped
        std::thread::spawn(move || {
            for result in rx {
                match result {
                    Ok(event) => {
                        for notification in ChangeNotification::from_notify(&event) {
                            sink.deliver(notification);
                        }
                    }
                    Err(e) => warn!(error = %e, "watch error"),
                }
            }
            debug!("notification channel closed");
        });

        Ok(Self {
            watcher: Some(watcher),
            roots: watched,
        })
    }

    /// Roots actually being watched
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Stop watching; the delivery thread exits once the channel drains
    pub fn stop(&mut self) {
        if self.watcher.take().is_some() {
            debug!("live watch stopped");
        }
    }
}

/// Wait for configured roots to appear (network mounts come up late)
///
/// Returns the roots that exist after at most `retries` attempts; missing
/// roots are logged. An empty result means polling only.
pub async fn await_roots(roots: &[PathBuf], retries: u32, delay: Duration) -> Vec<PathBuf> {
    if roots.is_empty() {
        return Vec::new();
    }

    let attempts = retries.max(1);
    let mut existing = Vec::new();
    for attempt in 1..=attempts {
        existing = roots.iter().filter(|root| root.exists()).cloned().collect();
        if !existing.is_empty() {
            break;
        }
        if attempt < attempts {
            warn!(
                attempt,
                attempts,
                retry_in_secs = delay.as_secs(),
                "no watch roots available yet"
            );
            tokio::time::sleep(delay).await;
        }
    }

    for root in roots.iter().filter(|root| !existing.contains(root)) {
        warn!(root = %root.display(), "watch root does not exist; ignoring");
    }
    existing
}
