//! Read-only snapshot of the working tree.
//!
//! Taken once per gate run. Failing to read the root directory is fatal;
//! unreadable entries deeper in the tree are logged and skipped.

use crate::core::error::{Error, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Files and directories present in the working tree.
#[derive(Debug, Clone, Default)]
pub struct FileTree {
    root: PathBuf,
    root_dirs: BTreeSet<String>,
    files: Vec<String>,
}

impl FileTree {
    /// Scans `root`, skipping any directory whose name is in `ignore_dirs`.
    pub fn scan(root: &Path, ignore_dirs: &[String]) -> Result<Self> {
        // Fail loudly if the root itself is unreadable.
        std::fs::read_dir(root)
            .map_err(|e| Error::io(format!("read directory {}", root.display()), e))?;

        let mut root_dirs = BTreeSet::new();
        let mut files = Vec::new();

        let walker = WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                !(entry.file_type().is_dir()
                    && ignore_dirs
                        .iter()
                        .any(|d| entry.file_name().to_string_lossy() == d.as_str()))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable tree entry");
                    continue;
                },
            };

            let Some(relative) = relative_slash_path(root, entry.path()) else {
                continue;
            };

            if entry.file_type().is_dir() {
                if entry.depth() == 1 {
                    root_dirs.insert(relative);
                }
            } else {
                files.push(relative);
            }
        }

        tracing::debug!(
            root = %root.display(),
            files = files.len(),
            dirs = root_dirs.len(),
            "scanned working tree"
        );

        Ok(Self {
            root: root.to_path_buf(),
            root_dirs,
            files,
        })
    }

    /// Builds a snapshot from an explicit file list (paths use `/`).
    #[must_use]
    pub fn from_files(root: impl Into<PathBuf>, files: &[&str]) -> Self {
        let root_dirs = files
            .iter()
            .filter_map(|f| f.split_once('/').map(|(dir, _)| dir.to_string()))
            .collect();
        Self {
            root: root.into(),
            root_dirs,
            files: files.iter().map(|f| (*f).to_string()).collect(),
        }
    }

    /// Root directory of the snapshot.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every file, relative to the root, in sorted order.
    #[must_use]
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Directories directly under the root.
    #[must_use]
    pub fn root_dirs(&self) -> impl Iterator<Item = &str> {
        self.root_dirs.iter().map(String::as_str)
    }

    /// Files directly under the root.
    pub fn root_files(&self) -> impl Iterator<Item = &str> {
        self.files
            .iter()
            .map(String::as_str)
            .filter(|f| !f.contains('/'))
    }
}

/// Converts `path` into a `/`-separated path relative to `root`.
fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}
