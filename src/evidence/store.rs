//! Evidence persistence.
//!
//! The filesystem layout under the evidence directory:
//!
//! ```text
//! .evidence/
//! ├── results-<epoch-millis>.json   one per recorded run, never overwritten
//! ├── latest-run.json               copy of the most recent record
//! ├── test-status.txt               PASSED|FAILED and the timestamp
//! └── metrics.json                  metrics of the most recent run
//! ```

use super::EvidenceRecord;
use crate::core::error::{Error, Result};
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Pointer to the most recent record.
pub const LATEST_FILE: &str = "latest-run.json";
/// Plain-text status of the most recent record.
pub const STATUS_FILE: &str = "test-status.txt";
/// Metrics exported from the most recent record.
pub const METRICS_FILE: &str = "metrics.json";

/// Storage for evidence records.
///
/// `append` adds to a log that is never rewritten; `set_latest` replaces the
/// pointer used by verification.
pub trait EvidenceStore: Send + Sync {
    /// Appends a record to the log, returning an identifier for it.
    fn append(&self, record: &EvidenceRecord) -> Result<String>;

    /// Replaces the latest-record pointer.
    fn set_latest(&self, record: &EvidenceRecord) -> Result<()>;

    /// Reads the latest record, if any.
    fn latest(&self) -> Result<Option<EvidenceRecord>>;

    /// Writes the human-readable status artifact.
    fn write_status(&self, record: &EvidenceRecord) -> Result<()>;

    /// Writes the metrics artifact.
    fn export_metrics(&self, metrics: &Map<String, Value>) -> Result<()>;
}

/// Evidence stored as JSON files in a directory.
#[derive(Debug, Clone)]
pub struct FsEvidenceStore {
    dir: PathBuf,
}

impl FsEvidenceStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the evidence files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| Error::io(format!("create {}", self.dir.display()), e))
    }

    /// Replaces `name` atomically by writing a sibling temp file and renaming it.
    fn replace_file(&self, name: &str, contents: &str) -> Result<()> {
        self.ensure_dir()?;
        let target = self.dir.join(name);
        let temp = self.dir.join(format!(".{name}.tmp"));
        std::fs::write(&temp, contents)
            .map_err(|e| Error::io(format!("write {}", temp.display()), e))?;
        std::fs::rename(&temp, &target)
            .map_err(|e| Error::io(format!("replace {}", target.display()), e))
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| Error::Internal {
        message: format!("serialize evidence: {e}"),
    })
}

impl EvidenceStore for FsEvidenceStore {
    fn append(&self, record: &EvidenceRecord) -> Result<String> {
        self.ensure_dir()?;
        let json = to_json(record)?;
        let millis = record.timestamp.timestamp_millis();

        // Two runs in the same millisecond get a numeric suffix.
        for attempt in 0_u32..1000 {
            let name = if attempt == 0 {
                format!("results-{millis}.json")
            } else {
                format!("results-{millis}-{attempt}.json")
            };
            let path = self.dir.join(&name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(json.as_bytes())
                        .map_err(|e| Error::io(format!("write {}", path.display()), e))?;
                    tracing::debug!(file = %path.display(), "appended evidence record");
                    return Ok(name);
                },
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {},
                Err(e) => return Err(Error::io(format!("create {}", path.display()), e)),
            }
        }

        Err(Error::Internal {
            message: format!("too many evidence records at {millis}"),
        })
    }

    fn set_latest(&self, record: &EvidenceRecord) -> Result<()> {
        self.replace_file(LATEST_FILE, &to_json(record)?)
    }

    fn latest(&self) -> Result<Option<EvidenceRecord>> {
        let path = self.dir.join(LATEST_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(format!("read {}", path.display()), e)),
        };
        EvidenceRecord::from_json(&text, &path.display().to_string()).map(Some)
    }

    fn write_status(&self, record: &EvidenceRecord) -> Result<()> {
        self.replace_file(STATUS_FILE, &record.status_text())
    }

    fn export_metrics(&self, metrics: &Map<String, Value>) -> Result<()> {
        self.replace_file(METRICS_FILE, &to_json(metrics)?)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    log: Vec<EvidenceRecord>,
    latest: Option<EvidenceRecord>,
    status: Option<String>,
    metrics: Option<Map<String, Value>>,
}

/// In-memory store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryEvidenceStore {
    state: Mutex<MemoryState>,
}

impl MemoryEvidenceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| Error::Internal {
            message: "evidence store lock poisoned".to_string(),
        })
    }

    /// Every appended record, oldest first.
    pub fn log(&self) -> Result<Vec<EvidenceRecord>> {
        Ok(self.lock()?.log.clone())
    }

    /// Last status text written.
    pub fn status(&self) -> Result<Option<String>> {
        Ok(self.lock()?.status.clone())
    }

    /// Last metrics exported.
    pub fn metrics(&self) -> Result<Option<Map<String, Value>>> {
        Ok(self.lock()?.metrics.clone())
    }
}

impl EvidenceStore for MemoryEvidenceStore {
    fn append(&self, record: &EvidenceRecord) -> Result<String> {
        let mut state = self.lock()?;
        state.log.push(record.clone());
        Ok(format!("memory-{}", state.log.len()))
    }

    fn set_latest(&self, record: &EvidenceRecord) -> Result<()> {
        self.lock()?.latest = Some(record.clone());
        Ok(())
    }

    fn latest(&self) -> Result<Option<EvidenceRecord>> {
        Ok(self.lock()?.latest.clone())
    }

    fn write_status(&self, record: &EvidenceRecord) -> Result<()> {
        self.lock()?.status = Some(record.status_text());
        Ok(())
    }

    fn export_metrics(&self, metrics: &Map<String, Value>) -> Result<()> {
        self.lock()?.metrics = Some(metrics.clone());
        Ok(())
    }
}
