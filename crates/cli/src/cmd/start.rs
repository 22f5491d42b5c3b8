//! Run the watcher daemon in the foreground

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};
use watcher::live::{await_roots, LiveWatcher};
use watcher::{
    ActionRunner, ExternalCommand, PollReconciler, Scheduler, SingleFlightLock, WatcherConfig,
};

pub async fn run(config: WatcherConfig) -> Result<()> {
    info!(
        quiet_secs = config.quiet_period_secs,
        max_wait_secs = config.max_wait_secs,
        poll_interval_secs = config.poll_interval_secs,
        lock = %config.lock_path.display(),
        action = %config.action_path.display(),
        "starting photosync watcher"
    );

    let action = Arc::new(ExternalCommand::new(
        &config.action_path,
        config.action_args.clone(),
    ));
    let runner = ActionRunner::new(SingleFlightLock::new(&config.lock_path), action);
    let scheduler = Scheduler::new(config.debounce(), runner);

    // An in-flight action is not awaited: its subprocess is abandoned and the
    // kernel drops the flock when we exit
    tokio::select! {
        received = shutdown_signal() => {
            let name = received?;
            info!(signal = name, "signal received; shutting down");
        }
        _ = serve(&config, scheduler.clone()) => {}
    }

    scheduler.cancel_pending();
    Ok(())
}

/// Live watch (when roots exist) plus the poll loop; runs until cancelled
async fn serve(config: &WatcherConfig, scheduler: Scheduler) {
    let roots = await_roots(
        &config.watch_paths,
        config.watch_retries,
        config.watch_retry_delay(),
    )
    .await;

    let _live = if roots.is_empty() {
        warn!("no watch roots; running in polling mode only");
        None
    } else {
        match LiveWatcher::start(&roots, Arc::new(scheduler.clone())) {
            Ok(live) if !live.roots().is_empty() => Some(live),
            Ok(_) => {
                warn!("no root could be watched; running in polling mode only");
                None
            }
            Err(e) => {
                warn!(error = %e, "live watch unavailable; running in polling mode only");
                None
            }
        }
    };

    PollReconciler::new(
        config.record_path.clone(),
        config.poll_interval(),
        config.poll_tolerance_secs,
        Arc::new(scheduler),
    )
    .with_poll_path(config.poll_path.clone())
    .run()
    .await;
}

async fn shutdown_signal() -> Result<&'static str> {
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    tokio::select! {
        _ = terminate.recv() => Ok("SIGTERM"),
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for SIGINT")?;
            Ok("SIGINT")
        }
    }
}
