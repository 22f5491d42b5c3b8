//! Helpers for driving the `photosync-watcher` binary
//!
//! Every command runs with a scrubbed environment rooted in a temporary
//! home directory so the developer's own photosync settings never leak in.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Variables the watcher reads; always removed from the inherited environment
const WATCHER_VARS: &[&str] = &[
    "QUIET_SECONDS",
    "MAX_WAIT_SECONDS",
    "LOCK_PATH",
    "RUNNER_PATH",
    "RUNNER_ARGS",
    "POLL_INTERVAL",
    "POLL_MTIME_DELTA",
    "LAST_SYNC_FILE",
    "PHOTOSYNC_LAST_SYNC_TIME_PATH",
    "POLL_PATH",
    "PHOTOSYNC_SOURCE_PATHS",
    "WATCHER_READ_RETRIES",
    "WATCHER_READ_RETRY_SLEEP",
];

/// Temporary home with conventional file locations
pub struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: TempDir::new().context("Failed to create sandbox")?,
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Write a file, creating parent directories
    pub fn write(&self, rel: &str, contents: &str) -> Result<PathBuf> {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    /// Write an executable shell script
    #[cfg(unix)]
    pub fn script(&self, rel: &str, body: &str) -> Result<PathBuf> {
        use std::os::unix::fs::PermissionsExt;

        let path = self.write(rel, &format!("#!/bin/sh\n{body}\n"))?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        Ok(path)
    }

    pub fn command(&self) -> WatcherCommand {
        WatcherCommand::new(self.root())
    }
}

/// Builder for a single CLI invocation
pub struct WatcherCommand {
    home: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
}

impl WatcherCommand {
    pub fn new(home: impl AsRef<Path>) -> Self {
        Self {
            home: home.as_ref().to_path_buf(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn env(&mut self, key: &str, value: impl AsRef<str>) -> &mut Self {
        self.env.insert(key.to_string(), value.as_ref().to_string());
        self
    }

    fn build(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_photosync-watcher"));
        for var in WATCHER_VARS {
            command.env_remove(var);
        }
        command
            .args(&self.args)
            .current_dir(&self.home)
            .env("HOME", &self.home)
            .env("RUST_LOG", "info")
            .envs(&self.env);
        command
    }

    pub fn execute(&self) -> Result<CommandResult> {
        let output = self.build().output().context("Failed to execute command")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    pub fn assert_success(&self) -> Result<CommandResult> {
        let result = self.execute()?;
        if !result.success() {
            anyhow::bail!(
                "Command failed (exit code: {}):\nArgs: {:?}\nStdout: {}\nStderr: {}",
                result.exit_code,
                self.args,
                result.stdout,
                result.stderr
            );
        }
        Ok(result)
    }

    pub fn assert_failure(&self) -> Result<CommandResult> {
        let result = self.execute()?;
        if result.success() {
            anyhow::bail!(
                "Command should have failed but succeeded:\nArgs: {:?}\nStdout: {}",
                self.args,
                result.stdout
            );
        }
        Ok(result)
    }

    /// Start a long-running invocation (the daemon)
    pub fn spawn(&self) -> Result<Child> {
        self.build()
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn command")
    }
}

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    condition()
}
