//! One-shot reconciliation scan

use anyhow::Result;
use owo_colors::OwoColorize;
use watcher::reconcile::{load_records, scan_records};
use watcher::WatcherConfig;

/// Report the first recorded path modified since its last sync
///
/// Never triggers the action.
pub fn run(config: WatcherConfig) -> Result<()> {
    let records = load_records(&config.record_path);
    println!(
        "{} {} ({} recorded path{})",
        "Record:".dimmed(),
        config.record_path.display(),
        records.len(),
        if records.len() == 1 { "" } else { "s" }
    );

    match scan_records(&config.record_path, config.poll_tolerance_secs) {
        Some(stale) => {
            println!(
                "{} {} {}",
                "stale".yellow().bold(),
                stale.path.display(),
                format!(
                    "(modified {:.0}s after last sync)",
                    stale.mtime - stale.synced_at.epoch_secs()
                )
                .dimmed()
            );
        }
        None => println!("{}", "no changes since last sync".green()),
    }

    Ok(())
}
