//! Git repository operations.
//!
//! The gate only needs a handful of read-only queries from version control.
//! They sit behind the [`Vcs`] trait so the orchestrator can be driven by a
//! mock in tests; [`GitRepo`] answers them by shelling out to `git`.

use crate::core::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Read-only version-control queries used by the gate.
#[cfg_attr(test, mockall::automock)]
pub trait Vcs {
    /// Files staged for the next commit, relative to the repository root.
    fn staged_files(&self) -> Result<Vec<String>>;

    /// Name of the checked-out branch.
    fn current_branch(&self) -> Result<String>;

    /// Full hash of `HEAD`.
    fn head_commit(&self) -> Result<String>;

    /// Full message of the latest commit.
    fn last_commit_message(&self) -> Result<String>;

    /// One-line summaries of the most recent commits, newest first.
    fn recent_log(&self, count: usize) -> Result<Vec<String>>;

    /// Whether the working tree has uncommitted changes.
    fn has_uncommitted_changes(&self) -> Result<bool>;
}

/// Represents a Git repository.
#[derive(Debug, Clone)]
pub struct GitRepo {
    /// Root directory of the repository (where .git is).
    root: PathBuf,
}

impl GitRepo {
    /// Discovers the Git repository from a specific path.
    pub fn discover_from(path: &Path) -> Result<Self> {
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(path)
            .output()
            .map_err(|e| Error::io("run git rev-parse", e))?;

        if !output.status.success() {
            return Err(Error::NotGitRepo);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let root = stdout
            .lines()
            .next()
            .filter(|l| !l.is_empty())
            .map(PathBuf::from)
            .ok_or(Error::NotGitRepo)?;

        Ok(Self { root })
    }

    /// Returns the root directory of the repository.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Runs a git subcommand in the repository root and returns trimmed stdout.
    fn git(&self, operation: &str, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| Error::io(format!("run git {operation}"), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::git(operation, stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }
}

impl Vcs for GitRepo {
    fn staged_files(&self) -> Result<Vec<String>> {
        let stdout = self.git(
            "diff --cached",
            &["diff", "--cached", "--name-only", "--diff-filter=ACMR"],
        )?;

        Ok(stdout
            .lines()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn current_branch(&self) -> Result<String> {
        self.git("rev-parse", &["rev-parse", "--abbrev-ref", "HEAD"])
            .map(|s| s.trim().to_string())
    }

    fn head_commit(&self) -> Result<String> {
        self.git("rev-parse", &["rev-parse", "HEAD"])
            .map(|s| s.trim().to_string())
    }

    fn last_commit_message(&self) -> Result<String> {
        self.git("log", &["log", "-1", "--format=%B"])
    }

    fn recent_log(&self, count: usize) -> Result<Vec<String>> {
        let limit = format!("-{count}");
        let stdout = self.git("log", &["log", &limit, "--oneline"])?;
        Ok(stdout.lines().map(str::to_string).collect())
    }

    fn has_uncommitted_changes(&self) -> Result<bool> {
        let stdout = self.git("status", &["status", "--porcelain"])?;
        Ok(!stdout.trim().is_empty())
    }
}
