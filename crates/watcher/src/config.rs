//! Watcher configuration
//!
//! Layers, lowest precedence first: built-in defaults, an optional TOML file,
//! then environment variables. The environment names are the ones the
//! deployment unit files already export.

use crate::debounce::DebounceConfig;
use crate::error::{Error, Result};
use crate::reconcile::DEFAULT_POLL_PATH;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Effective daemon configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Trailing silence before a sync fires (seconds)
    pub quiet_period_secs: u64,

    /// Ceiling on how long a burst may postpone a sync (seconds)
    pub max_wait_secs: u64,

    /// Advisory lock shared by every sync trigger on this host
    pub lock_path: PathBuf,

    /// Sync action executable
    pub action_path: PathBuf,

    /// Arguments passed to the action
    pub action_args: Vec<String>,

    /// Poll reconciliation cadence (seconds)
    pub poll_interval_secs: u64,

    /// Slack added to recorded sync times before comparing mtimes (seconds)
    pub poll_tolerance_secs: f64,

    /// Last-sync record written by the action
    pub record_path: PathBuf,

    /// Path carried by synthetic poll notifications
    pub poll_path: PathBuf,

    /// Source roots to watch; empty means polling only
    pub watch_paths: Vec<PathBuf>,

    /// Attempts to wait for watch roots to appear at startup
    pub watch_retries: u32,

    /// Delay between those attempts (seconds)
    pub watch_retry_delay_secs: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let cache = home.join(".cache/photosync");

        Self {
            quiet_period_secs: 60,
            max_wait_secs: 300,
            lock_path: cache.join(".photosync.lock"),
            action_path: home.join(".local/bin/photosync-run"),
            action_args: Vec::new(),
            poll_interval_secs: 300,
            poll_tolerance_secs: 1.0,
            record_path: cache.join(".photosync_last.json"),
            poll_path: PathBuf::from(DEFAULT_POLL_PATH),
            watch_paths: Vec::new(),
            watch_retries: 12,
            watch_retry_delay_secs: 5,
        }
    }
}

impl WatcherConfig {
    /// Defaults, then `config_file` if given, then the process environment
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.expand_paths();
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Override fields from environment-style variables
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(raw) = get("QUIET_SECONDS") {
            self.quiet_period_secs = parse_number("QUIET_SECONDS", &raw)?;
        }
        if let Some(raw) = get("MAX_WAIT_SECONDS") {
            self.max_wait_secs = parse_number("MAX_WAIT_SECONDS", &raw)?;
        }
        if let Some(raw) = get("LOCK_PATH") {
            self.lock_path = PathBuf::from(raw);
        }
        if let Some(raw) = get("RUNNER_PATH") {
            self.action_path = PathBuf::from(raw);
        }
        if let Some(raw) = get("RUNNER_ARGS") {
            self.action_args = raw.split_whitespace().map(str::to_string).collect();
        }
        if let Some(raw) = get("POLL_INTERVAL") {
            self.poll_interval_secs = parse_number("POLL_INTERVAL", &raw)?;
        }
        if let Some(raw) = get("POLL_MTIME_DELTA") {
            self.poll_tolerance_secs = parse_number("POLL_MTIME_DELTA", &raw)?;
        }
        if let Some(raw) = get("LAST_SYNC_FILE").or_else(|| get("PHOTOSYNC_LAST_SYNC_TIME_PATH")) {
            self.record_path = PathBuf::from(raw);
        }
        if let Some(raw) = get("POLL_PATH") {
            self.poll_path = PathBuf::from(raw);
        }
        if let Some(raw) = get("PHOTOSYNC_SOURCE_PATHS") {
            self.watch_paths = split_source_paths(&raw);
        }
        if let Some(raw) = get("WATCHER_READ_RETRIES") {
            self.watch_retries = parse_number("WATCHER_READ_RETRIES", &raw)?;
        }
        if let Some(raw) = get("WATCHER_READ_RETRY_SLEEP") {
            self.watch_retry_delay_secs = parse_number("WATCHER_READ_RETRY_SLEEP", &raw)?;
        }

        Ok(())
    }

    /// Expand a leading `~` in every path field
    pub fn expand_paths(&mut self) {
        self.lock_path = expand_tilde(&self.lock_path);
        self.action_path = expand_tilde(&self.action_path);
        self.record_path = expand_tilde(&self.record_path);
        self.watch_paths = self.watch_paths.iter().map(|p| expand_tilde(p)).collect();
    }

    pub fn validate(&self) -> Result<()> {
        if self.quiet_period_secs == 0 {
            return Err(Error::Config("quiet period must be at least 1 second".into()));
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::Config("poll interval must be at least 1 second".into()));
        }
        if !self.poll_tolerance_secs.is_finite() || self.poll_tolerance_secs < 0.0 {
            return Err(Error::Config(format!(
                "poll tolerance must be a non-negative number, got {}",
                self.poll_tolerance_secs
            )));
        }
        Ok(())
    }

    pub fn debounce(&self) -> DebounceConfig {
        DebounceConfig {
            quiet_period: Duration::from_secs(self.quiet_period_secs),
            max_wait: Duration::from_secs(self.max_wait_secs),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn watch_retry_delay(&self) -> Duration {
        Duration::from_secs(self.watch_retry_delay_secs)
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a number, got {:?}", key, raw)))
}

/// Colon-separated list, blanks dropped
pub fn split_source_paths(raw: &str) -> Vec<PathBuf> {
    raw.split(':')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Replace a leading `~` with the home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = WatcherConfig::default();

        assert_eq!(config.debounce().quiet_period, Duration::from_secs(60));
        assert_eq!(config.debounce().max_wait, Duration::from_secs(300));
        assert_eq!(config.poll_interval(), Duration::from_secs(300));
        assert_eq!(config.poll_tolerance_secs, 1.0);
        assert_eq!(config.poll_path, PathBuf::from("<poll>"));
        assert!(config.watch_paths.is_empty());
        assert!(config.lock_path.ends_with(".cache/photosync/.photosync.lock"));
        assert!(config.record_path.ends_with(".cache/photosync/.photosync_last.json"));
        assert!(config.action_path.ends_with(".local/bin/photosync-run"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = WatcherConfig::default();
        config
            .apply_env(env(&[
                ("QUIET_SECONDS", "5"),
                ("MAX_WAIT_SECONDS", "20"),
                ("LOCK_PATH", "/run/photosync.lock"),
                ("RUNNER_PATH", "/usr/local/bin/photosync-run"),
                ("RUNNER_ARGS", "--dry-run  --verbose"),
                ("POLL_INTERVAL", "60"),
                ("POLL_MTIME_DELTA", "2.5"),
                ("LAST_SYNC_FILE", "/var/lib/photosync/last.json"),
                ("POLL_PATH", "<nas>"),
                ("PHOTOSYNC_SOURCE_PATHS", "/mnt/a: /mnt/b ::"),
                ("WATCHER_READ_RETRIES", "3"),
                ("WATCHER_READ_RETRY_SLEEP", "1"),
            ]))
            .unwrap();

        assert_eq!(config.quiet_period_secs, 5);
        assert_eq!(config.max_wait_secs, 20);
        assert_eq!(config.lock_path, PathBuf::from("/run/photosync.lock"));
        assert_eq!(config.action_path, PathBuf::from("/usr/local/bin/photosync-run"));
        assert_eq!(config.action_args, vec!["--dry-run", "--verbose"]);
        assert_eq!(config.poll_interval_secs, 60);
        assert_eq!(config.poll_tolerance_secs, 2.5);
        assert_eq!(config.record_path, PathBuf::from("/var/lib/photosync/last.json"));
        assert_eq!(config.poll_path, PathBuf::from("<nas>"));
        assert_eq!(
            config.watch_paths,
            vec![PathBuf::from("/mnt/a"), PathBuf::from("/mnt/b")]
        );
        assert_eq!(config.watch_retries, 3);
        assert_eq!(config.watch_retry_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_record_path_fallback_variable() {
        let mut config = WatcherConfig::default();
        config
            .apply_env(env(&[("PHOTOSYNC_LAST_SYNC_TIME_PATH", "/srv/last.json")]))
            .unwrap();
        assert_eq!(config.record_path, PathBuf::from("/srv/last.json"));

        config
            .apply_env(env(&[
                ("PHOTOSYNC_LAST_SYNC_TIME_PATH", "/srv/last.json"),
                ("LAST_SYNC_FILE", "/srv/preferred.json"),
            ]))
            .unwrap();
        assert_eq!(config.record_path, PathBuf::from("/srv/preferred.json"));
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let mut config = WatcherConfig::default();
        let err = config
            .apply_env(env(&[("QUIET_SECONDS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("QUIET_SECONDS"));
    }

    #[test]
    fn test_blank_env_values_ignored() {
        let mut config = WatcherConfig::default();
        config
            .apply_env(env(&[("QUIET_SECONDS", "  "), ("PHOTOSYNC_SOURCE_PATHS", "")]))
            .unwrap();
        assert_eq!(config.quiet_period_secs, 60);
        assert!(config.watch_paths.is_empty());
    }

    #[test]
    fn test_validation() {
        let mut config = WatcherConfig::default();
        config.quiet_period_secs = 0;
        assert!(config.validate().is_err());

        let mut config = WatcherConfig::default();
        config.poll_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = WatcherConfig::default();
        config.poll_tolerance_secs = -1.0;
        assert!(config.validate().is_err());

        // A ceiling below the quiet period is allowed; it just always wins
        let mut config = WatcherConfig::default();
        config.max_wait_secs = 10;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_file_keeps_unset_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("watcher.toml");
        fs::write(
            &path,
            "quiet_period_secs = 10\nwatch_paths = [\"/mnt/photos\"]\naction_args = [\"--dry-run\"]\n",
        )
        .unwrap();

        let config = WatcherConfig::from_file(&path).unwrap();
        assert_eq!(config.quiet_period_secs, 10);
        assert_eq!(config.max_wait_secs, 300);
        assert_eq!(config.watch_paths, vec![PathBuf::from("/mnt/photos")]);
        assert_eq!(config.action_args, vec!["--dry-run"]);
    }

    #[test]
    fn test_bad_toml_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("watcher.toml");
        fs::write(&path, "quiet_period_secs = \"sixty\"\n").unwrap();

        let err = WatcherConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));

        let missing = WatcherConfig::from_file(&temp_dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, Error::ConfigRead { .. }));
    }

    #[test]
    fn test_tilde_expansion() {
        let expanded = expand_tilde(Path::new("~/.cache/photosync/.photosync.lock"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join(".cache/photosync/.photosync.lock"));
        }
        assert_eq!(expand_tilde(Path::new("/abs/path")), PathBuf::from("/abs/path"));
        assert_eq!(expand_tilde(Path::new("~user/x")), PathBuf::from("~user/x"));
    }
}
