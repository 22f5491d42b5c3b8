//! photosync-watcher - debounced trigger for the photosync runner

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;
mod logging;
mod settings;

use settings::ConfigArgs;

/// Watches photo sources and runs photosync once changes settle
#[derive(Parser)]
#[command(name = "photosync-watcher")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the watcher in the foreground
    Start {
        #[command(flatten)]
        config: ConfigArgs,

        /// Override the quiet period (seconds)
        #[arg(long)]
        quiet_secs: Option<u64>,

        /// Override the max wait ceiling (seconds)
        #[arg(long)]
        max_wait_secs: Option<u64>,

        /// Also write logs to photosync-watcher.log in this directory
        #[arg(long, value_name = "DIR")]
        log_dir: Option<PathBuf>,
    },
    /// Run one reconciliation scan without triggering a sync
    Scan {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Show the effective configuration
    Config {
        #[command(flatten)]
        config: ConfigArgs,

        /// Print as TOML, suitable for --config
        #[arg(long)]
        toml: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_dir = match &cli.command {
        Commands::Start { log_dir, .. } => log_dir.clone(),
        _ => None,
    };
    let _log_guard = logging::init(log_dir.as_deref())?;

    match cli.command {
        Commands::Start {
            config,
            quiet_secs,
            max_wait_secs,
            ..
        } => {
            let mut config = settings::load(&config)?;
            if let Some(secs) = quiet_secs {
                config.quiet_period_secs = secs;
            }
            if let Some(secs) = max_wait_secs {
                config.max_wait_secs = secs;
            }
            config.validate()?;
            cmd::start::run(config).await
        }
        Commands::Scan { config } => cmd::scan::run(settings::load(&config)?),
        Commands::Config { config, toml } => cmd::config::run(&settings::load(&config)?, toml),
    }
}
