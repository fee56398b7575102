//! Subprocess execution for external collaborators.
//!
//! Used for the content-health validator and for `agate record --run`. Every
//! command runs through the platform shell with captured output and an
//! optional timeout; a timed-out child is killed when its future is dropped.

use crate::core::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Exit code reported for a command that exceeded its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Output from a command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code of the command.
    pub exit_code: i32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Whether the command was killed due to timeout.
    pub timed_out: bool,
    /// Duration the command took to run.
    pub duration: Duration,
}

impl CommandOutput {
    /// Returns true if the command succeeded (exit code 0).
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Returns combined stdout and stderr output.
    #[must_use]
    pub fn combined_output(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }

    /// Returns at most `limit` non-empty trimmed lines of combined output.
    #[must_use]
    pub fn tail_lines(&self, limit: usize) -> Vec<String> {
        let combined = self.combined_output();
        let lines: Vec<&str> = combined
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.trim().is_empty())
            .collect();
        let start = lines.len().saturating_sub(limit);
        lines[start..].iter().map(|l| (*l).to_string()).collect()
    }
}

/// Options for command execution.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Working directory for the command.
    pub cwd: Option<PathBuf>,
    /// Timeout for the command; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Environment variables to set.
    pub env: Vec<(String, String)>,
}

impl ExecuteOptions {
    /// Sets the working directory.
    #[must_use]
    pub fn cwd(mut self, path: impl AsRef<Path>) -> Self {
        self.cwd = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Executor for running shell commands.
#[derive(Debug, Default)]
pub struct Executor;

impl Executor {
    /// Creates a new executor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Executes a shell command and captures its output.
    pub async fn execute(&self, command: &str, options: ExecuteOptions) -> Result<CommandOutput> {
        let start = Instant::now();

        let (shell, shell_arg) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };

        let mut cmd = Command::new(shell);
        cmd.arg(shell_arg)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref cwd) = options.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &options.env {
            cmd.env(key, value);
        }

        tracing::debug!(command, timeout = ?options.timeout, "spawning command");
        let child = cmd.spawn().map_err(|e| Error::io("spawn command", e))?;
        let wait = child.wait_with_output();

        let output = match options.timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(output) => output,
                Err(_) => {
                    tracing::warn!(command, limit = %humantime::format_duration(limit), "command timed out");
                    return Ok(CommandOutput {
                        exit_code: TIMEOUT_EXIT_CODE,
                        stdout: String::new(),
                        stderr: format!(
                            "Command timed out after {}",
                            humantime::format_duration(limit)
                        ),
                        timed_out: true,
                        duration: start.elapsed(),
                    });
                },
            },
            None => wait.await,
        }
        .map_err(|e| Error::io("wait for command", e))?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            timed_out: false,
            duration: start.elapsed(),
        })
    }

    /// Checks if a command exists in PATH.
    #[must_use]
    pub fn command_exists(command: &str) -> bool {
        which::which(command).is_ok()
    }

    /// Returns the program name of a shell command line (its first word).
    #[must_use]
    pub fn program_of(command: &str) -> Option<&str> {
        command.split_whitespace().next()
    }
}
