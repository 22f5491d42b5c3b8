//! Show the effective configuration

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;
use watcher::WatcherConfig;

pub fn run(config: &WatcherConfig, as_toml: bool) -> Result<()> {
    if as_toml {
        let rendered =
            toml::to_string_pretty(config).context("Failed to serialize configuration")?;
        print!("{rendered}");
        return Ok(());
    }

    println!("{}", "Effective Configuration".bold());

    println!("\n{}", "[debounce]".yellow());
    println!(
        "  {} = {} {}",
        "quiet_period_secs".cyan(),
        config.quiet_period_secs,
        format!("({}s)", config.quiet_period_secs).dimmed()
    );
    println!(
        "  {} = {} {}",
        "max_wait_secs".cyan(),
        config.max_wait_secs,
        if config.max_wait_secs == 0 {
            "(fire immediately)".dimmed().to_string()
        } else {
            format!("({}s = {} min)", config.max_wait_secs, config.max_wait_secs / 60)
                .dimmed()
                .to_string()
        }
    );

    println!("\n{}", "[action]".yellow());
    print_path("lock_path", &config.lock_path);
    print_path("action_path", &config.action_path);
    println!(
        "  {} = {}",
        "action_args".cyan(),
        if config.action_args.is_empty() {
            "(none)".dimmed().to_string()
        } else {
            config.action_args.join(" ")
        }
    );

    println!("\n{}", "[poll]".yellow());
    println!(
        "  {} = {} {}",
        "poll_interval_secs".cyan(),
        config.poll_interval_secs,
        format!("({}s)", config.poll_interval_secs).dimmed()
    );
    println!(
        "  {} = {}",
        "poll_tolerance_secs".cyan(),
        config.poll_tolerance_secs
    );
    print_path("record_path", &config.record_path);
    print_path("poll_path", &config.poll_path);

    println!("\n{}", "[watch]".yellow());
    if config.watch_paths.is_empty() {
        println!("  {} = {}", "watch_paths".cyan(), "(none, polling only)".dimmed());
    } else {
        println!("  {}", "watch_paths".cyan());
        for path in &config.watch_paths {
            let marker = if path.exists() {
                "✓".green().to_string()
            } else {
                "✗".red().to_string()
            };
            println!("    {} {}", marker, path.display());
        }
    }
    println!(
        "  {} = {} {}",
        "watch_retries".cyan(),
        config.watch_retries,
        format!("(every {}s)", config.watch_retry_delay_secs).dimmed()
    );

    Ok(())
}

fn print_path(key: &str, path: &Path) {
    println!("  {} = {}", key.cyan(), path.display());
}
