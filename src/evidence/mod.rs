//! Proof-of-execution records.
//!
//! An [`EvidenceRecord`] states that a test run happened, when, with what
//! outcome, and in which checkout. Records are written by the
//! [`EvidenceRecorder`] into an [`EvidenceStore`] (an append-only log plus a
//! "latest" pointer) and checked by [`verify`], which only trusts a passing
//! record for the right phase that is still inside the freshness window.

mod recorder;
mod results;
mod store;

pub use recorder::{EvidenceRecorder, RecordOptions, RunContext};
pub use results::{resolve_results, ResultsSource, TestResults, TestSummary};
pub use store::{
    EvidenceStore, FsEvidenceStore, MemoryEvidenceStore, LATEST_FILE, METRICS_FILE, STATUS_FILE,
};

use crate::core::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version-control context of a recorded run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsInfo {
    /// Commit hash, or `unknown`.
    pub commit: String,
    /// Branch name, or `unknown`.
    pub branch: String,
}

/// Machine context of a recorded run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentInfo {
    /// Version of the tool that wrote the record.
    pub runtime_version: String,
    /// Operating system and architecture.
    pub platform: String,
    /// Working directory of the run.
    pub cwd: String,
}

/// A timestamped proof that a verification step ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceRecord {
    /// Phase the run was recorded for.
    pub phase: String,
    /// When the record was written.
    pub timestamp: DateTime<Utc>,
    /// Whether the run passed.
    pub passed: bool,
    /// Test outcome the record is based on.
    pub test_results: TestResults,
    /// Checkout the run happened in.
    pub vcs_info: VcsInfo,
    /// Machine the run happened on.
    pub environment: EnvironmentInfo,
}

impl EvidenceRecord {
    /// Parses and validates a record read from `origin`.
    pub fn from_json(text: &str, origin: &str) -> Result<Self> {
        let record: Self = serde_json::from_str(text)
            .map_err(|e| Error::evidence_schema(origin, e.to_string()))?;

        if record.phase.trim().is_empty() {
            return Err(Error::evidence_schema(origin, "phase must not be empty"));
        }
        if record.passed != record.test_results.success {
            return Err(Error::evidence_schema(
                origin,
                "passed does not agree with testResults.success",
            ));
        }
        record.test_results.check_consistency(origin)?;

        Ok(record)
    }

    /// Plain-text status artifact: outcome line, then the timestamp.
    #[must_use]
    pub fn status_text(&self) -> String {
        let outcome = if self.passed { "PASSED" } else { "FAILED" };
        format!("{outcome}\n{}\n", self.timestamp.to_rfc3339())
    }

    /// Age of the record at `now`; records from the future are age zero.
    #[must_use]
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.timestamp).max(Duration::zero())
    }
}

/// Outcome of checking the latest evidence for a phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Passing, fresh evidence for the phase.
    Valid {
        /// Age of the record, in whole seconds.
        age: std::time::Duration,
        /// Freshness window applied.
        max_age_minutes: u64,
    },
    /// No evidence has been recorded.
    Missing,
    /// The latest run failed.
    Failed {
        /// When the failing run was recorded.
        timestamp: DateTime<Utc>,
    },
    /// The latest run belongs to another phase.
    PhaseMismatch {
        /// Phase named in the record.
        recorded: String,
        /// Phase being verified.
        expected: String,
    },
    /// The latest run is older than the freshness window.
    Stale {
        /// Age of the record, rounded up to whole seconds.
        age: std::time::Duration,
        /// Freshness window applied.
        max_age_minutes: u64,
    },
}

impl Verification {
    /// Whether the evidence counts toward phase completion.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// What to do about a failed verification.
    #[must_use]
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            Self::Valid { .. } => None,
            Self::Missing | Self::PhaseMismatch { .. } | Self::Stale { .. } => {
                Some("run the test suite and record it: agate record --phase <id> --run <command>")
            },
            Self::Failed { .. } => Some("fix the failing tests, then record a passing run"),
        }
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid {
                age,
                max_age_minutes,
            } => write!(
                f,
                "evidence is {} old, within the {max_age_minutes} minute limit",
                humantime::format_duration(*age)
            ),
            Self::Missing => write!(f, "no evidence recorded ({LATEST_FILE} not found)"),
            Self::Failed { timestamp } => write!(
                f,
                "latest evidence recorded a failing test run at {}",
                timestamp.to_rfc3339()
            ),
            Self::PhaseMismatch { recorded, expected } => write!(
                f,
                "latest evidence is for phase {recorded}, not phase {expected}"
            ),
            Self::Stale {
                age,
                max_age_minutes,
            } => write!(
                f,
                "evidence is too old: {} exceeds the {max_age_minutes} minute limit",
                humantime::format_duration(*age)
            ),
        }
    }
}

/// Verifies the latest evidence for `phase` against the current time.
pub fn verify(store: &dyn EvidenceStore, phase: &str, max_age_minutes: u64) -> Result<Verification> {
    verify_at(store, phase, max_age_minutes, Utc::now())
}

/// Verifies the latest evidence for `phase` as of `now`.
pub fn verify_at(
    store: &dyn EvidenceStore,
    phase: &str,
    max_age_minutes: u64,
    now: DateTime<Utc>,
) -> Result<Verification> {
    let Some(record) = store.latest()? else {
        return Ok(Verification::Missing);
    };

    if !record.passed {
        return Ok(Verification::Failed {
            timestamp: record.timestamp,
        });
    }

    if record.phase != phase {
        return Ok(Verification::PhaseMismatch {
            recorded: record.phase,
            expected: phase.to_string(),
        });
    }

    let age = record.age_at(now);
    let window = i64::try_from(max_age_minutes)
        .ok()
        .and_then(Duration::try_minutes)
        .unwrap_or(Duration::MAX);
    let verification = if age > window {
        Verification::Stale {
            age: whole_seconds(age, true),
            max_age_minutes,
        }
    } else {
        Verification::Valid {
            age: whole_seconds(age, false),
            max_age_minutes,
        }
    };

    tracing::debug!(phase, %verification, "verified evidence");
    Ok(verification)
}

/// Converts a non-negative age to whole seconds. Stale ages round up so the
/// reported age always exceeds the window it failed.
fn whole_seconds(age: Duration, round_up: bool) -> std::time::Duration {
    let secs = age.num_seconds();
    let partial = age - Duration::seconds(secs) > Duration::zero();
    let secs = if round_up && partial { secs + 1 } else { secs };
    std::time::Duration::from_secs(u64::try_from(secs).unwrap_or(0))
}
