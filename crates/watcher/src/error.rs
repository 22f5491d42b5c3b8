//! Error types for the trigger scheduler

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the watcher crate
///
/// None of these terminate the daemon once it is running: the trigger and
/// poll paths log them and carry on. Only configuration errors abort startup.
#[derive(Debug, Error)]
pub enum Error {
    /// Lock file could not be created or locked
    #[error("failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Action executable is absent or lacks an execute bit
    #[error("action not found or not executable: {0}")]
    ActionMissing(PathBuf),

    /// Action subprocess could not be spawned or awaited
    #[error("failed to run action {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be read
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML
    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Filesystem watch registration failed
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
}

/// Result alias for watcher operations
pub type Result<T> = std::result::Result<T, Error>;
