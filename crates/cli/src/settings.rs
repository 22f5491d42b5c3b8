//! Configuration loading for every subcommand

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use tracing::debug;
use watcher::WatcherConfig;

/// Flags shared by all subcommands
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Environment file (default: ~/.config/photosync/photosync.env)
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,
}

/// Default location of the env file shared with the sync action
pub fn default_env_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config/photosync/photosync.env"))
}

/// Load the env file (never overriding variables already set), then the
/// layered watcher configuration
pub fn load(args: &ConfigArgs) -> Result<WatcherConfig> {
    let env_file = args.env_file.clone().or_else(default_env_file);
    if let Some(path) = env_file {
        let loaded = load_env_file(&path)?;
        debug!(path = %path.display(), loaded, "env file");
    }

    WatcherConfig::load(args.config.as_deref()).context("Failed to load configuration")
}

fn load_env_file(path: &Path) -> Result<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(dotenvy::Error::Io(_)) => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to parse env file {}", path.display())),
    }
}
