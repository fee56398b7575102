//! Test-result ingestion and detection.

use crate::core::error::{Error, Result};
use crate::core::executor::CommandOutput;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Note attached to results synthesized without a results file.
pub const UNDETECTED_NOTE: &str = "results were not auto-detected; success was assumed";

/// Pass/fail counts of a test run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSummary {
    /// Number of passing tests.
    pub passed: u64,
    /// Number of failing tests.
    pub failed: u64,
}

/// Outcome of a test run, as recorded in evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResults {
    /// Whether the run succeeded.
    pub success: bool,
    /// Pass/fail counts.
    pub summary: TestSummary,
    /// Free-form metrics exported alongside the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Map<String, Value>>,
    /// Provenance note (e.g. when success was assumed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TestResults {
    /// A successful run with `passed` tests.
    #[must_use]
    pub fn passing(passed: u64) -> Self {
        Self {
            success: true,
            summary: TestSummary { passed, failed: 0 },
            metrics: None,
            note: None,
        }
    }

    /// A failed run.
    #[must_use]
    pub fn failing(passed: u64, failed: u64) -> Self {
        Self {
            success: false,
            summary: TestSummary { passed, failed },
            metrics: None,
            note: None,
        }
    }

    /// Results synthesized when nothing could be detected and the caller
    /// explicitly accepted assuming success.
    #[must_use]
    pub fn assumed_passed() -> Self {
        Self {
            note: Some(UNDETECTED_NOTE.to_string()),
            ..Self::passing(0)
        }
    }

    /// Parses and validates a test-results document read from `origin`.
    pub fn from_json(text: &str, origin: &str) -> Result<Self> {
        let results: Self = serde_json::from_str(text)
            .map_err(|e| Error::evidence_schema(origin, e.to_string()))?;
        results.check_consistency(origin)?;
        Ok(results)
    }

    /// Rejects results that claim success while reporting failures.
    pub fn check_consistency(&self, origin: &str) -> Result<()> {
        if self.success && self.summary.failed > 0 {
            return Err(Error::evidence_schema(
                origin,
                format!(
                    "success is true but summary reports {} failed test(s)",
                    self.summary.failed
                ),
            ));
        }
        Ok(())
    }

    /// Derives results from a test command's exit status and output.
    ///
    /// Counts are summed from every `N passed` / `N failed` occurrence, which
    /// covers cargo's per-binary summaries and pytest's final line.
    #[must_use]
    pub fn from_command_output(output: &CommandOutput) -> Self {
        let text = output.combined_output();
        let summary = TestSummary {
            passed: sum_counts(&text, "passed"),
            failed: sum_counts(&text, "failed"),
        };

        let mut metrics = Map::new();
        metrics.insert("exitCode".to_string(), Value::from(output.exit_code));
        metrics.insert(
            "durationMs".to_string(),
            Value::from(u64::try_from(output.duration.as_millis()).unwrap_or(u64::MAX)),
        );
        if output.timed_out {
            metrics.insert("timedOut".to_string(), Value::Bool(true));
        }

        Self {
            success: output.success() && summary.failed == 0,
            summary,
            metrics: Some(metrics),
            note: None,
        }
    }
}

fn sum_counts(text: &str, label: &str) -> u64 {
    let Ok(pattern) = Regex::new(&format!(r"\b(\d+) {label}\b")) else {
        return 0;
    };
    pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u64>().ok())
        .sum()
}

/// Where a results file was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultsSource {
    /// Given explicitly by the caller.
    Explicit(PathBuf),
    /// Found at a well-known location.
    Probed(PathBuf),
}

impl ResultsSource {
    /// Path of the results file.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Explicit(p) | Self::Probed(p) => p,
        }
    }

    /// Locates a results file: an explicit path wins, then the probe list in order.
    pub fn locate(root: &Path, explicit: Option<&Path>, probes: &[String]) -> Result<Self> {
        if let Some(path) = explicit {
            let path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                root.join(path)
            };
            if !path.is_file() {
                return Err(Error::config_invalid(
                    "results",
                    format!("results file not found: {}", path.display()),
                ));
            }
            return Ok(Self::Explicit(path));
        }

        let candidates: Vec<PathBuf> = probes.iter().map(|p| root.join(p)).collect();
        if let Some(found) = candidates.iter().find(|p| p.is_file()) {
            tracing::debug!(path = %found.display(), "detected test results");
            return Ok(Self::Probed(found.clone()));
        }

        Err(Error::ResultsNotDetected { probed: candidates })
    }

    /// Reads and validates the results file.
    pub fn load(&self) -> Result<TestResults> {
        let path = self.path();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("read {}", path.display()), e))?;
        TestResults::from_json(&text, &path.display().to_string())
    }
}

/// Finds and loads test results for `record`.
///
/// When nothing is found the result is `Error::ResultsNotDetected`, unless
/// `assume_passed` is set, in which case a success record carrying an
/// explanatory note is synthesized.
pub fn resolve_results(
    root: &Path,
    explicit: Option<&Path>,
    probes: &[String],
    assume_passed: bool,
) -> Result<TestResults> {
    match ResultsSource::locate(root, explicit, probes) {
        Ok(source) => source.load(),
        Err(Error::ResultsNotDetected { probed }) if assume_passed => {
            tracing::warn!(
                probed = probed.len(),
                "no test results found; assuming success as requested"
            );
            Ok(TestResults::assumed_passed())
        },
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tempfile::TempDir;

    fn output(exit_code: i32, stdout: &str) -> CommandOutput {
        CommandOutput {
            exit_code,
            stdout: stdout.to_string(),
            stderr: String::new(),
            timed_out: false,
            duration: Duration::from_millis(1500),
        }
    }

    fn probes() -> Vec<String> {
        vec![
            "test-results.json".to_string(),
            "target/test-results.json".to_string(),
        ]
    }

    #[test]
    fn test_from_json_with_metrics() {
        let results = TestResults::from_json(
            r#"{"success": true, "summary": {"passed": 42, "failed": 0}, "metrics": {"coverage": 81.5}}"#,
            "test",
        )
        .expect("valid");
        assert!(results.success);
        assert_eq!(results.summary.passed, 42);
        assert_eq!(
            results.metrics.and_then(|m| m.get("coverage").cloned()),
            Some(Value::from(81.5))
        );
    }

    #[test]
    fn test_from_json_rejects_success_with_failures() {
        let err = TestResults::from_json(
            r#"{"success": true, "summary": {"passed": 4, "failed": 1}}"#,
            "test",
        )
        .expect_err("inconsistent");
        assert!(matches!(err, Error::EvidenceSchema { .. }));
    }

    #[test]
    fn test_from_json_rejects_non_object_metrics() {
        assert!(TestResults::from_json(
            r#"{"success": true, "summary": {"passed": 1, "failed": 0}, "metrics": [1, 2]}"#,
            "test",
        )
        .is_err());
    }

    #[test]
    fn test_from_json_rejects_missing_summary() {
        assert!(TestResults::from_json(r#"{"success": true}"#, "test").is_err());
    }

    #[test]
    fn test_from_cargo_output() {
        let results = TestResults::from_command_output(&output(
            0,
            "running 3 tests\ntest result: ok. 3 passed; 0 failed; 0 ignored\n\
             running 2 tests\ntest result: ok. 2 passed; 0 failed; 1 ignored\n",
        ));
        assert!(results.success);
        assert_eq!(results.summary, TestSummary { passed: 5, failed: 0 });
        let metrics = results.metrics.expect("metrics");
        assert_eq!(metrics.get("durationMs"), Some(&Value::from(1500_u64)));
    }

    #[test]
    fn test_from_pytest_failure() {
        let results =
            TestResults::from_command_output(&output(1, "==== 2 failed, 10 passed in 0.31s ===="));
        assert!(!results.success);
        assert_eq!(results.summary, TestSummary { passed: 10, failed: 2 });
    }

    #[test]
    fn test_zero_exit_with_failures_is_not_success() {
        let results = TestResults::from_command_output(&output(0, "1 passed, 1 failed"));
        assert!(!results.success);
    }

    #[test]
    fn test_locate_prefers_explicit() {
        let temp = TempDir::new().expect("temp");
        std::fs::write(temp.path().join("test-results.json"), "{}").expect("write");
        std::fs::write(temp.path().join("mine.json"), "{}").expect("write");

        let source = ResultsSource::locate(temp.path(), Some(Path::new("mine.json")), &probes())
            .expect("found");
        assert_eq!(source, ResultsSource::Explicit(temp.path().join("mine.json")));
    }

    #[test]
    fn test_locate_probes_in_order() {
        let temp = TempDir::new().expect("temp");
        std::fs::create_dir_all(temp.path().join("target")).expect("mkdir");
        std::fs::write(temp.path().join("target/test-results.json"), "{}").expect("write");

        let source = ResultsSource::locate(temp.path(), None, &probes()).expect("found");
        assert_eq!(
            source,
            ResultsSource::Probed(temp.path().join("target/test-results.json"))
        );
    }

    #[test]
    fn test_locate_missing_explicit_is_config_error() {
        let temp = TempDir::new().expect("temp");
        let err = ResultsSource::locate(temp.path(), Some(Path::new("nope.json")), &probes())
            .expect_err("missing");
        assert!(matches!(err, Error::ConfigInvalid { .. }));
    }

    #[test]
    fn test_resolve_without_results_fails_by_default() {
        let temp = TempDir::new().expect("temp");
        let err = resolve_results(temp.path(), None, &probes(), false).expect_err("undetected");
        let probed = match err {
            Error::ResultsNotDetected { probed } => probed,
            _ => Vec::new(),
        };
        assert_eq!(probed.len(), 2);
    }

    #[test]
    fn test_resolve_assume_passed_adds_note() {
        let temp = TempDir::new().expect("temp");
        let results = resolve_results(temp.path(), None, &probes(), true).expect("assumed");
        assert!(results.success);
        assert_eq!(results.note.as_deref(), Some(UNDETECTED_NOTE));
    }

    #[test]
    fn test_resolve_loads_probed_file() {
        let temp = TempDir::new().expect("temp");
        std::fs::write(
            temp.path().join("test-results.json"),
            r#"{"success": false, "summary": {"passed": 1, "failed": 3}}"#,
        )
        .expect("write");

        let results = resolve_results(temp.path(), None, &probes(), true).expect("loaded");
        assert!(!results.success);
        assert_eq!(results.summary.failed, 3);
    }
}
