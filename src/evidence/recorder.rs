//! Writing evidence for a test run.

use super::{EnvironmentInfo, EvidenceRecord, EvidenceStore, TestResults, VcsInfo};
use crate::core::error::{Error, Result};
use crate::core::git::Vcs;
use chrono::{DateTime, Utc};
use std::path::Path;

const UNKNOWN: &str = "unknown";

/// Checkout and machine context stamped onto every record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Version-control context.
    pub vcs_info: VcsInfo,
    /// Machine context.
    pub environment: EnvironmentInfo,
}

impl RunContext {
    /// Captures the context of a run in `root`.
    ///
    /// VCS queries that fail (or no VCS at all) yield `unknown` rather than
    /// an error, so evidence can be recorded outside a repository.
    pub fn capture(root: &Path, vcs: Option<&dyn Vcs>) -> Self {
        Self {
            vcs_info: VcsInfo {
                commit: query(vcs, |v| v.head_commit()),
                branch: query(vcs, |v| v.current_branch()),
            },
            environment: EnvironmentInfo {
                runtime_version: format!(
                    "{} {}",
                    env!("CARGO_PKG_NAME"),
                    env!("CARGO_PKG_VERSION")
                ),
                platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
                cwd: root.display().to_string(),
            },
        }
    }
}

fn query(vcs: Option<&dyn Vcs>, f: impl Fn(&dyn Vcs) -> Result<String>) -> String {
    vcs.and_then(|v| match f(v) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "vcs query failed");
            None
        },
    })
    .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Options for recording evidence.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordOptions {
    /// Record a failing run instead of refusing.
    pub force: bool,
}

/// Records test runs into an [`EvidenceStore`].
pub struct EvidenceRecorder<'a> {
    store: &'a dyn EvidenceStore,
    context: RunContext,
}

impl std::fmt::Debug for EvidenceRecorder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceRecorder")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl<'a> EvidenceRecorder<'a> {
    /// Creates a recorder writing into `store`.
    pub fn new(store: &'a dyn EvidenceStore, context: RunContext) -> Self {
        Self { store, context }
    }

    /// Records `results` for `phase`, timestamped now.
    pub fn record(
        &self,
        phase: &str,
        results: TestResults,
        options: RecordOptions,
    ) -> Result<EvidenceRecord> {
        self.record_at(phase, results, options, Utc::now())
    }

    /// Records `results` for `phase` with an explicit timestamp.
    ///
    /// A failing run is refused with [`Error::TestsFailed`] unless
    /// `options.force` is set; forced failures are still written so the
    /// latest pointer reflects reality.
    pub fn record_at(
        &self,
        phase: &str,
        results: TestResults,
        options: RecordOptions,
        timestamp: DateTime<Utc>,
    ) -> Result<EvidenceRecord> {
        let phase = phase.trim();
        if phase.is_empty() {
            return Err(Error::config_invalid("phase", "phase must not be empty"));
        }
        results.check_consistency("test results")?;

        if !results.success && !options.force {
            return Err(Error::TestsFailed {
                phase: phase.to_string(),
            });
        }

        let record = EvidenceRecord {
            phase: phase.to_string(),
            timestamp,
            passed: results.success,
            test_results: results,
            vcs_info: self.context.vcs_info.clone(),
            environment: self.context.environment.clone(),
        };

        let id = self.store.append(&record)?;
        self.store.set_latest(&record)?;
        self.store.write_status(&record)?;
        if let Some(ref metrics) = record.test_results.metrics {
            self.store.export_metrics(metrics)?;
        }

        tracing::info!(
            phase,
            passed = record.passed,
            id = %id,
            commit = %record.vcs_info.commit,
            "recorded evidence"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::git::MockVcs;
    use crate::evidence::MemoryEvidenceStore;
    use pretty_assertions::assert_eq;
    use serde_json::{Map, Value};

    fn context() -> RunContext {
        RunContext::capture(Path::new("/repo"), None)
    }

    #[test]
    fn test_capture_without_vcs_is_unknown() {
        let ctx = context();
        assert_eq!(ctx.vcs_info.commit, "unknown");
        assert_eq!(ctx.vcs_info.branch, "unknown");
        assert_eq!(ctx.environment.cwd, "/repo");
        assert!(ctx.environment.runtime_version.starts_with("agent-gate "));
    }

    #[test]
    fn test_capture_with_vcs() {
        let mut vcs = MockVcs::new();
        vcs.expect_head_commit()
            .returning(|| Ok("0123abcd\n".to_string()));
        vcs.expect_current_branch()
            .returning(|| Err(Error::git("branch", "detached")));

        let ctx = RunContext::capture(Path::new("/repo"), Some(&vcs));
        assert_eq!(ctx.vcs_info.commit, "0123abcd");
        assert_eq!(ctx.vcs_info.branch, "unknown");
    }

    #[test]
    fn test_record_writes_every_artifact() {
        let store = MemoryEvidenceStore::new();
        let mut results = TestResults::passing(12);
        let mut metrics = Map::new();
        metrics.insert("coverage".into(), Value::from(90));
        results.metrics = Some(metrics.clone());

        let record = EvidenceRecorder::new(&store, context())
            .record("1.2", results, RecordOptions::default())
            .expect("record");

        assert_eq!(store.log().expect("log").len(), 1);
        assert_eq!(store.latest().expect("latest"), Some(record));
        assert!(store
            .status()
            .expect("status")
            .is_some_and(|s| s.starts_with("PASSED\n")));
        assert_eq!(store.metrics().expect("metrics"), Some(metrics));
    }

    #[test]
    fn test_failing_run_is_refused() {
        let store = MemoryEvidenceStore::new();
        let err = EvidenceRecorder::new(&store, context())
            .record("1.2", TestResults::failing(1, 2), RecordOptions::default())
            .expect_err("refused");

        assert!(matches!(err, Error::TestsFailed { .. }));
        assert!(store.log().expect("log").is_empty());
        assert!(store.latest().expect("latest").is_none());
    }

    #[test]
    fn test_forced_failing_run_is_recorded() {
        let store = MemoryEvidenceStore::new();
        let record = EvidenceRecorder::new(&store, context())
            .record("1.2", TestResults::failing(1, 2), RecordOptions { force: true })
            .expect("forced");

        assert!(!record.passed);
        assert!(store
            .status()
            .expect("status")
            .is_some_and(|s| s.starts_with("FAILED\n")));
    }

    #[test]
    fn test_empty_phase_is_rejected() {
        let store = MemoryEvidenceStore::new();
        let err = EvidenceRecorder::new(&store, context())
            .record("  ", TestResults::passing(1), RecordOptions::default())
            .expect_err("empty phase");
        assert!(matches!(err, Error::ConfigInvalid { .. }));
    }

    #[test]
    fn test_inconsistent_results_are_rejected() {
        let store = MemoryEvidenceStore::new();
        let mut results = TestResults::passing(1);
        results.summary.failed = 1;
        let err = EvidenceRecorder::new(&store, context())
            .record("1.2", results, RecordOptions::default())
            .expect_err("inconsistent");
        assert!(matches!(err, Error::EvidenceSchema { .. }));
    }

    #[test]
    fn test_log_grows_with_each_record() {
        let store = MemoryEvidenceStore::new();
        let recorder = EvidenceRecorder::new(&store, context());
        for phase in ["1.0", "1.1", "1.2"] {
            recorder
                .record(phase, TestResults::passing(1), RecordOptions::default())
                .expect("record");
        }
        let log = store.log().expect("log");
        assert_eq!(log.len(), 3);
        assert_eq!(
            store.latest().expect("latest").map(|r| r.phase),
            Some("1.2".to_string())
        );
    }
}
