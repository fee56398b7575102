//! Gate orchestration.
//!
//! Runs the fixed check sequence against a repository root and aggregates
//! the results into one verdict:
//!
//! ```text
//! location -> vcs-status -> maturity -> [evidence -> deliverables]
//! ```
//!
//! The bracketed checks only run while a phase is active. A check that
//! returns an error is reported as failed; the run itself only aborts when
//! the root directory cannot be read or the configuration is unusable.

use crate::checks::deliverables::{check_deliverables, Deliverables};
use crate::checks::location::{LocationPolicy, ScanMode};
use crate::checks::maturity::{MaturityClassifier, HEALTH_OUTPUT_LINES};
use crate::checks::CheckKind;
use crate::config::Config;
use crate::core::error::{Error, Result};
use crate::core::executor::Executor;
use crate::core::git::{GitRepo, Vcs};
use crate::core::phase::{ActivePhase, PhaseDetector};
use crate::core::tree::FileTree;
use crate::evidence::{self, EvidenceStore, FsEvidenceStore};
use chrono::Utc;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Number of log entries shown by the VCS status check.
const RECENT_LOG_ENTRIES: usize = 5;

/// Extra information attached to a result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Details {
    /// Nothing to add.
    #[default]
    None,
    /// A free-form note.
    Text(String),
    /// One line per finding.
    Items(Vec<String>),
}

impl Details {
    /// Items as a list, or an empty list otherwise.
    #[must_use]
    pub fn lines(&self) -> Vec<&str> {
        match self {
            Self::None => Vec::new(),
            Self::Text(text) => vec![text.as_str()],
            Self::Items(items) => items.iter().map(String::as_str).collect(),
        }
    }
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateResult {
    /// Which check produced this.
    pub kind: CheckKind,
    /// Whether the check passed. Skipped checks count as passed.
    pub passed: bool,
    /// Whether the check was skipped.
    pub skipped: bool,
    /// One-line summary.
    pub message: String,
    /// Itemized findings or remediation.
    pub details: Details,
}

impl GateResult {
    /// A passing result.
    pub fn pass(kind: CheckKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            passed: true,
            skipped: false,
            message: message.into(),
            details: Details::None,
        }
    }

    /// A failing result.
    pub fn fail(kind: CheckKind, message: impl Into<String>, details: Details) -> Self {
        Self {
            kind,
            passed: false,
            skipped: false,
            message: message.into(),
            details,
        }
    }

    /// A skipped result.
    pub fn skip(kind: CheckKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            passed: true,
            skipped: true,
            message: reason.into(),
            details: Details::None,
        }
    }

    /// Attaches details.
    #[must_use]
    pub fn with_details(mut self, details: Details) -> Self {
        self.details = details;
        self
    }
}

impl fmt::Display for GateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Aggregated outcome of a gate run.
#[derive(Debug, Clone)]
pub struct GateReport {
    /// Phase that was active, if any.
    pub phase: Option<ActivePhase>,
    /// Results in execution order.
    pub results: Vec<GateResult>,
    /// Wall-clock time of the run.
    pub duration: Duration,
}

impl GateReport {
    /// True when every executed check passed.
    #[must_use]
    pub fn success(&self) -> bool {
        self.results.iter().filter(|r| !r.skipped).all(|r| r.passed)
    }

    /// Number of results, skipped ones included.
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Number of executed checks that passed.
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed && !r.skipped).count()
    }

    /// Number of failed checks.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }

    /// Number of skipped checks.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.results.iter().filter(|r| r.skipped).count()
    }

    /// Failed results, in execution order.
    pub fn failed_checks(&self) -> impl Iterator<Item = &GateResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    /// One-line tally: total, passed, failed and skipped.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} total, {} passed, {} failed, {} skipped",
            self.total(),
            self.passed_count(),
            self.failed_count(),
            self.skipped_count()
        )
    }

    /// Result of a given check.
    #[must_use]
    pub fn result(&self, kind: CheckKind) -> Option<&GateResult> {
        self.results.iter().find(|r| r.kind == kind)
    }
}

/// Caller-controlled options for a run.
#[derive(Debug, Clone, Default)]
pub struct GateOptions {
    /// Checks to skip.
    pub skip: Vec<CheckKind>,
    /// Explicit phase, overriding the commit message.
    pub phase: Option<String>,
    /// Commit message to read the phase from; defaults to the last commit.
    pub commit_message: Option<String>,
    /// Which files the location check validates.
    pub scan: ScanMode,
    /// Show a spinner and per-check status lines on stderr.
    pub progress: bool,
}

/// Runs the gate sequence.
pub struct Orchestrator {
    config: Config,
    root: PathBuf,
    vcs: Option<Box<dyn Vcs>>,
    store: Box<dyn EvidenceStore>,
    executor: Executor,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("root", &self.root)
            .field("vcs", &self.vcs.is_some())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator for `root`, discovering the repository and
    /// using the configured evidence directory.
    pub fn new(config: Config, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let vcs = match GitRepo::discover_from(&root) {
            Ok(repo) => Some(Box::new(repo) as Box<dyn Vcs>),
            Err(e) => {
                tracing::debug!(error = %e, "running without version control");
                None
            },
        };
        let store = Box::new(FsEvidenceStore::new(root.join(&config.evidence.dir)));
        Self {
            config,
            root,
            vcs,
            store,
            executor: Executor::new(),
        }
    }

    /// Replaces the version-control backend.
    #[must_use]
    pub fn with_vcs(mut self, vcs: Option<Box<dyn Vcs>>) -> Self {
        self.vcs = vcs;
        self
    }

    /// Replaces the evidence store.
    #[must_use]
    pub fn with_store(mut self, store: Box<dyn EvidenceStore>) -> Self {
        self.store = store;
        self
    }

    /// Repository root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Determines the active phase: explicit override, then the given
    /// commit message, then the last commit's message.
    pub fn active_phase(&self, options: &GateOptions) -> Result<Option<ActivePhase>> {
        let detector = PhaseDetector::new(&self.config.phase)?;
        let message = options.commit_message.clone().or_else(|| {
            self.vcs
                .as_ref()
                .and_then(|vcs| vcs.last_commit_message().ok())
        });
        Ok(detector.resolve(options.phase.as_deref(), message.as_deref()))
    }

    /// Runs every check and aggregates the verdict.
    pub async fn run(&self, options: &GateOptions) -> Result<GateReport> {
        let start = Instant::now();

        let tree = FileTree::scan(&self.root, &self.config.location.ignore_dirs)?;
        let phase = self.active_phase(options)?;
        match phase {
            Some(ref active) => {
                tracing::info!(phase = %active.id, source = ?active.source, "phase active");
            },
            None => tracing::debug!("no active phase"),
        }

        let mut results = Vec::with_capacity(CheckKind::ALL.len());
        for kind in CheckKind::ALL {
            let result = if options.skip.contains(&kind) {
                GateResult::skip(kind, "skipped by request")
            } else if kind.is_phase_conditional() && phase.is_none() {
                GateResult::skip(kind, "no active phase")
            } else {
                let spinner = options.progress.then(|| spinner(kind));
                let outcome = self.run_check(kind, &tree, phase.as_ref(), options).await;
                if let Some(pb) = spinner {
                    pb.finish_and_clear();
                }
                outcome.unwrap_or_else(|e| {
                    tracing::warn!(check = %kind, error = %e, "check errored");
                    GateResult::fail(kind, format!("check could not run: {e}"), Details::None)
                })
            };

            if options.progress {
                print_status(&result);
            }
            results.push(result);
        }

        Ok(GateReport {
            phase,
            results,
            duration: start.elapsed(),
        })
    }

    async fn run_check(
        &self,
        kind: CheckKind,
        tree: &FileTree,
        phase: Option<&ActivePhase>,
        options: &GateOptions,
    ) -> Result<GateResult> {
        let phase_id = phase.map(|p| p.id.as_str());
        match kind {
            CheckKind::Location => self.check_location(tree, options.scan),
            CheckKind::VcsStatus => Ok(self.check_vcs_status()),
            CheckKind::Maturity => self.check_maturity(phase_id).await,
            CheckKind::Evidence => self.check_evidence(phase_id),
            CheckKind::Deliverables => self.check_deliverables(phase_id),
        }
    }

    fn check_location(&self, tree: &FileTree, scan: ScanMode) -> Result<GateResult> {
        let policy = LocationPolicy::from_config(&self.config.location)?;
        let violations = match scan {
            ScanMode::FullTree => policy.validate_tree(tree),
            ScanMode::Staged => {
                let vcs = self.vcs.as_ref().ok_or(Error::NotGitRepo)?;
                policy.validate_staged(&vcs.staged_files()?)
            },
        };

        if violations.is_empty() {
            return Ok(GateResult::pass(CheckKind::Location, "all files are in place"));
        }
        Ok(GateResult::fail(
            CheckKind::Location,
            format!("{} misplaced file(s)", violations.len()),
            Details::Items(violations.iter().map(ToString::to_string).collect()),
        ))
    }

    fn check_vcs_status(&self) -> GateResult {
        let Some(ref vcs) = self.vcs else {
            return GateResult::pass(CheckKind::VcsStatus, "no repository detected");
        };

        let branch = vcs.current_branch().unwrap_or_else(|_| "unknown".to_string());
        let state = match vcs.has_uncommitted_changes() {
            Ok(true) => "uncommitted changes",
            Ok(false) => "clean",
            Err(_) => "status unknown",
        };
        let log = vcs.recent_log(RECENT_LOG_ENTRIES).unwrap_or_default();

        GateResult::pass(CheckKind::VcsStatus, format!("on {branch}, {state}"))
            .with_details(if log.is_empty() {
                Details::None
            } else {
                Details::Items(log)
            })
    }

    async fn check_maturity(&self, phase: Option<&str>) -> Result<GateResult> {
        let classifier = MaturityClassifier::new(&self.config.maturity)?;
        let report = classifier.check(&self.root, phase, Utc::now().date_naive())?;
        let mut items: Vec<String> = report.findings.iter().map(ToString::to_string).collect();

        if let Some(output) = classifier.run_health(&self.root, &self.executor).await? {
            if !output.success() {
                let status = if output.timed_out {
                    "content health command timed out".to_string()
                } else {
                    format!("content health command exited with {}", output.exit_code)
                };
                items.push(status);
                items.extend(output.tail_lines(HEALTH_OUTPUT_LINES));
            }
        }

        let units = report.units.len();
        if items.is_empty() {
            return Ok(GateResult::pass(
                CheckKind::Maturity,
                format!("{units} content unit(s) checked"),
            ));
        }
        Ok(GateResult::fail(
            CheckKind::Maturity,
            format!(
                "{} maturity finding(s) across {units} content unit(s)",
                report.findings.len()
            ),
            Details::Items(items),
        ))
    }

    fn check_evidence(&self, phase: Option<&str>) -> Result<GateResult> {
        let phase = phase.ok_or_else(|| Error::Internal {
            message: "evidence check requires an active phase".to_string(),
        })?;
        let verification =
            evidence::verify(self.store.as_ref(), phase, self.config.evidence.max_age_minutes)?;

        if verification.is_valid() {
            return Ok(GateResult::pass(CheckKind::Evidence, verification.to_string()));
        }
        let details = verification
            .remediation()
            .map_or(Details::None, |r| Details::Text(r.replace("<id>", phase)));
        Ok(GateResult::fail(
            CheckKind::Evidence,
            verification.to_string(),
            details,
        ))
    }

    fn check_deliverables(&self, phase: Option<&str>) -> Result<GateResult> {
        let phase = phase.ok_or_else(|| Error::Internal {
            message: "deliverables check requires an active phase".to_string(),
        })?;

        match check_deliverables(&self.root, &self.config.phase, phase)? {
            Deliverables::NoDescription(path) => Ok(GateResult::fail(
                CheckKind::Deliverables,
                format!("phase description not found: {}", path.display()),
                Details::Text(format!("describe phase {phase} in {}", path.display())),
            )),
            Deliverables::Checked(report) if report.passed() => {
                let result = GateResult::pass(
                    CheckKind::Deliverables,
                    format!("{} deliverable(s) present", report.present.len()),
                );
                Ok(if report.objectives.is_empty() {
                    result
                } else {
                    result.with_details(Details::Items(report.objectives))
                })
            },
            Deliverables::Checked(report) => Ok(GateResult::fail(
                CheckKind::Deliverables,
                format!(
                    "{} of {} deliverable(s) missing",
                    report.missing.len(),
                    report.missing.len() + report.present.len()
                ),
                Details::Items(
                    report
                        .missing
                        .iter()
                        .map(|path| format!("missing: {path}"))
                        .collect(),
                ),
            )),
        }
    }
}

fn spinner(kind: CheckKind) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .ok()
            .unwrap_or_else(ProgressStyle::default_spinner),
    );
    pb.set_message(format!("Checking {kind}..."));
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn print_status(result: &GateResult) {
    if result.skipped {
        eprintln!("{} {} ({})", style("•").dim(), result.kind, result.message);
    } else if result.passed {
        eprintln!("{} {}", style("✓").green(), result.kind);
    } else {
        eprintln!("{} {}", style("✗").red(), result.kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::git::MockVcs;
    use crate::evidence::{
        EvidenceRecorder, MemoryEvidenceStore, RecordOptions, RunContext, TestResults,
    };
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn mock_vcs(message: &'static str) -> MockVcs {
        let mut vcs = MockVcs::new();
        vcs.expect_last_commit_message()
            .returning(move || Ok(message.to_string()));
        vcs.expect_current_branch()
            .returning(|| Ok("main".to_string()));
        vcs.expect_head_commit()
            .returning(|| Ok("abc123".to_string()));
        vcs.expect_has_uncommitted_changes().returning(|| Ok(false));
        vcs.expect_recent_log()
            .returning(|_| Ok(vec!["abc123 initial commit".to_string()]));
        vcs.expect_staged_files().returning(|| Ok(Vec::new()));
        vcs
    }

    fn repo() -> TempDir {
        let temp = TempDir::new().expect("temp");
        std::fs::write(temp.path().join("README.md"), "# Project\n").expect("write");
        std::fs::create_dir_all(temp.path().join("src")).expect("mkdir");
        std::fs::write(temp.path().join("src/lib.rs"), "").expect("write");
        temp
    }

    fn orchestrator(root: &Path, message: &'static str, store: MemoryEvidenceStore) -> Orchestrator {
        Orchestrator::new(Config::default(), root)
            .with_vcs(Some(Box::new(mock_vcs(message))))
            .with_store(Box::new(store))
    }

    fn run(orch: &Orchestrator, options: &GateOptions) -> GateReport {
        tokio::runtime::Runtime::new()
            .expect("runtime")
            .block_on(orch.run(options))
            .expect("run")
    }

    #[test]
    fn test_report_counts() {
        let report = GateReport {
            phase: None,
            results: vec![
                GateResult::pass(CheckKind::Location, "ok"),
                GateResult::fail(CheckKind::Maturity, "bad", Details::None),
                GateResult::skip(CheckKind::Evidence, "no active phase"),
            ],
            duration: Duration::ZERO,
        };
        assert!(!report.success());
        assert_eq!(report.total(), 3);
        assert_eq!(report.passed_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.summary(), "3 total, 1 passed, 1 failed, 1 skipped");
        assert_eq!(
            report.failed_checks().map(|r| r.kind).collect::<Vec<_>>(),
            vec![CheckKind::Maturity]
        );
    }

    #[test]
    fn test_skipped_results_do_not_affect_verdict() {
        let report = GateReport {
            phase: None,
            results: vec![
                GateResult::pass(CheckKind::Location, "ok"),
                GateResult::skip(CheckKind::Evidence, "no active phase"),
            ],
            duration: Duration::ZERO,
        };
        assert!(report.success());
        assert_eq!(report.summary(), "2 total, 1 passed, 0 failed, 1 skipped");
    }

    #[test]
    fn test_without_phase_marker_phase_checks_are_skipped() {
        let temp = repo();
        let orch = orchestrator(temp.path(), "fix: typo", MemoryEvidenceStore::new());
        let report = run(&orch, &GateOptions::default());

        assert!(report.phase.is_none());
        assert!(report.success(), "{:?}", report.failed_checks().collect::<Vec<_>>());
        for kind in [CheckKind::Evidence, CheckKind::Deliverables] {
            let result = report.result(kind).expect("result");
            assert!(result.skipped);
            assert_eq!(result.message, "no active phase");
        }
    }

    #[test]
    fn test_phase_marker_activates_evidence_and_deliverables() {
        let temp = repo();
        let orch = orchestrator(temp.path(), "feat: complete phase-1.2", MemoryEvidenceStore::new());
        let report = run(&orch, &GateOptions::default());

        assert_eq!(report.phase.as_ref().map(|p| p.id.as_str()), Some("1.2"));
        let evidence = report.result(CheckKind::Evidence).expect("evidence");
        assert!(!evidence.skipped);
        assert!(!evidence.passed);
        assert!(evidence.message.starts_with("no evidence recorded"));
        let deliverables = report.result(CheckKind::Deliverables).expect("deliverables");
        assert!(!deliverables.passed);
        assert!(!report.success());
    }

    #[test]
    fn test_fresh_evidence_and_deliverables_pass() {
        let temp = repo();
        std::fs::create_dir_all(temp.path().join("docs/phases")).expect("mkdir");
        std::fs::write(
            temp.path().join("docs/phases/phase-1.2.md"),
            "## Objectives\n- ship the library\n\nDeliver `src/lib.rs`.\n",
        )
        .expect("write");

        let store = MemoryEvidenceStore::new();
        EvidenceRecorder::new(&store, RunContext::capture(temp.path(), None))
            .record("1.2", TestResults::passing(8), RecordOptions::default())
            .expect("record");

        let orch = orchestrator(temp.path(), "unrelated message", store);
        let options = GateOptions {
            phase: Some("1.2".to_string()),
            ..GateOptions::default()
        };
        let report = run(&orch, &options);

        assert!(report.success(), "{:?}", report.failed_checks().collect::<Vec<_>>());
        let deliverables = report.result(CheckKind::Deliverables).expect("deliverables");
        assert_eq!(deliverables.details, Details::Items(vec!["ship the library".into()]));
    }

    #[test]
    fn test_commit_message_option_overrides_last_commit() {
        let temp = repo();
        let orch = orchestrator(temp.path(), "complete phase-9.9", MemoryEvidenceStore::new());
        let options = GateOptions {
            commit_message: Some("docs: no marker here".to_string()),
            ..GateOptions::default()
        };
        assert!(orch.active_phase(&options).expect("phase").is_none());
    }

    #[test]
    fn test_skip_requested_checks() {
        let temp = repo();
        std::fs::write(temp.path().join("SESSION-NOTES.md"), "notes").expect("write");
        let orch = orchestrator(temp.path(), "complete phase-1.2", MemoryEvidenceStore::new());
        let options = GateOptions {
            skip: vec![CheckKind::Location, CheckKind::Evidence],
            ..GateOptions::default()
        };
        let report = run(&orch, &options);

        assert!(report.result(CheckKind::Location).is_some_and(|r| r.skipped));
        assert!(report.result(CheckKind::Evidence).is_some_and(|r| r.skipped));
        assert!(report.result(CheckKind::Deliverables).is_some_and(|r| !r.skipped));
    }

    #[test]
    fn test_misplaced_file_fails_location() {
        let temp = repo();
        std::fs::write(temp.path().join("DRAFT-plan.md"), "plan").expect("write");
        let orch = orchestrator(temp.path(), "chore", MemoryEvidenceStore::new());
        let report = run(&orch, &GateOptions::default());

        let location = report.result(CheckKind::Location).expect("location");
        assert!(!location.passed);
        assert_eq!(
            location.details.lines(),
            vec!["DRAFT-plan.md: session/temporary file in root -> move to docs/drafts/DRAFT-plan.md"]
        );
    }

    #[test]
    fn test_check_errors_become_failed_results() {
        let temp = repo();
        let mut vcs = MockVcs::new();
        vcs.expect_last_commit_message()
            .returning(|| Ok("chore".to_string()));
        vcs.expect_current_branch()
            .returning(|| Ok("main".to_string()));
        vcs.expect_has_uncommitted_changes().returning(|| Ok(true));
        vcs.expect_recent_log().returning(|_| Ok(Vec::new()));
        vcs.expect_staged_files()
            .returning(|| Err(Error::git("diff", "index locked")));

        let orch = Orchestrator::new(Config::default(), temp.path())
            .with_vcs(Some(Box::new(vcs)))
            .with_store(Box::new(MemoryEvidenceStore::new()));
        let options = GateOptions {
            scan: ScanMode::Staged,
            ..GateOptions::default()
        };
        let report = run(&orch, &options);

        let location = report.result(CheckKind::Location).expect("location");
        assert!(!location.passed);
        assert!(location.message.contains("index locked"));
        let status = report.result(CheckKind::VcsStatus).expect("status");
        assert!(status.passed);
        assert_eq!(status.message, "on main, uncommitted changes");
    }

    #[test]
    fn test_unreadable_root_aborts() {
        let temp = TempDir::new().expect("temp");
        let missing = temp.path().join("gone");
        let orch = Orchestrator::new(Config::default(), &missing)
            .with_vcs(None)
            .with_store(Box::new(MemoryEvidenceStore::new()));
        let result = tokio::runtime::Runtime::new()
            .expect("runtime")
            .block_on(orch.run(&GateOptions::default()));
        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[test]
    fn test_without_vcs_status_is_informational() {
        let temp = repo();
        let orch = Orchestrator::new(Config::default(), temp.path())
            .with_vcs(None)
            .with_store(Box::new(MemoryEvidenceStore::new()));
        let report = run(&orch, &GateOptions::default());
        let status = report.result(CheckKind::VcsStatus).expect("status");
        assert!(status.passed);
        assert_eq!(status.message, "no repository detected");
    }
}
