//! CLI command implementations.

use super::{CheckArgs, RecordArgs};
use crate::checks::location::{LocationPolicy, ScanMode};
use crate::checks::maturity::{format_date, MaturityClassifier, HEALTH_OUTPUT_LINES};
use crate::checks::CheckKind;
use crate::config::{Config, CONFIG_FILE_NAME};
use crate::core::error::{Error, Result};
use crate::core::executor::{ExecuteOptions, Executor};
use crate::core::git::{GitRepo, Vcs};
use crate::core::orchestrator::{GateOptions, GateReport, Orchestrator};
use crate::core::tree::FileTree;
use crate::evidence::{
    self, resolve_results, EvidenceRecorder, FsEvidenceStore, RecordOptions, RunContext,
    TestResults,
};
use crate::similarity::SimilarityDetector;
use chrono::Utc;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// Output lines shown per failed check.
const MAX_DETAIL_LINES: usize = 20;

/// Configuration plus the root it applies to.
struct Workspace {
    config: Config,
    root: PathBuf,
}

/// Loads configuration and picks the root: the directory holding
/// `agent-gate.toml`, else the repository root, else the current directory.
fn workspace() -> Result<Workspace> {
    let cwd = std::env::current_dir().map_err(|e| Error::io("get current dir", e))?;
    match Config::find_config_file_from(&cwd) {
        Ok(path) => {
            let config = Config::load_from(&path)?;
            let root = path.parent().map_or_else(|| cwd.clone(), PathBuf::from);
            Ok(Workspace { config, root })
        },
        Err(Error::ConfigNotFound { .. }) => {
            let root = GitRepo::discover_from(&cwd)
                .map_or(cwd, |repo| repo.root().to_path_buf());
            tracing::debug!(root = %root.display(), "no configuration file; using defaults");
            Ok(Workspace {
                config: Config::default(),
                root,
            })
        },
        Err(e) => Err(e),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| Error::Internal {
        message: format!("Failed to create runtime: {e}"),
    })
}

fn store(ws: &Workspace) -> FsEvidenceStore {
    FsEvidenceStore::new(ws.root.join(&ws.config.evidence.dir))
}

/// Run the full gate.
pub fn check(args: &CheckArgs, quiet: bool) -> Result<ExitCode> {
    let ws = workspace()?;

    let skip = [
        (args.skip_location, CheckKind::Location),
        (args.skip_evidence, CheckKind::Evidence),
        (args.skip_maturity, CheckKind::Maturity),
    ]
    .into_iter()
    .filter_map(|(skip, kind)| skip.then_some(kind))
    .collect();
    let options = GateOptions {
        skip,
        phase: args.phase.clone(),
        commit_message: args.message.clone(),
        scan: if args.staged {
            ScanMode::Staged
        } else {
            ScanMode::FullTree
        },
        progress: !quiet,
    };

    let orchestrator = Orchestrator::new(ws.config, ws.root);
    let report = runtime()?.block_on(orchestrator.run(&options))?;

    print_report(&report, quiet);
    Ok(if report.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_report(report: &GateReport, quiet: bool) {
    if report.success() {
        if !quiet {
            eprintln!();
            if let Some(ref phase) = report.phase {
                eprintln!("{} Phase {}", style("•").cyan(), style(&phase.id).bold());
            }
            eprintln!(
                "{} Gate passed ({}) in {}",
                style("✓").green().bold(),
                report.summary(),
                humantime::format_duration(Duration::from_millis(
                    u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX)
                ))
            );
        }
        return;
    }

    eprintln!();
    eprintln!("{} Gate failed ({})", style("✗").red().bold(), report.summary());
    for result in report.failed_checks() {
        eprintln!();
        eprintln!("  {} {}: {}", style("Failed:").red(), result.kind, result.message);
        for line in result.details.lines().into_iter().take(MAX_DETAIL_LINES) {
            eprintln!("    {line}");
        }
    }
}

/// Record test evidence.
pub fn record(args: &RecordArgs) -> Result<ExitCode> {
    let ws = workspace()?;
    let results = match args.run {
        Some(ref command) => run_tests(&ws, command)?,
        None => resolve_results(
            &ws.root,
            args.results.as_deref(),
            &ws.config.evidence.result_probes,
            args.assume_passed,
        )?,
    };

    let repo = GitRepo::discover_from(&ws.root).ok();
    let context = RunContext::capture(&ws.root, repo.as_ref().map(|r| r as &dyn Vcs));
    let store = store(&ws);
    let recorder = EvidenceRecorder::new(&store, context);

    match recorder.record(&args.phase, results, RecordOptions { force: args.force }) {
        Ok(record) => {
            let summary = record.test_results.summary;
            if record.passed {
                eprintln!(
                    "{} Recorded passing evidence for phase {} ({} passed)",
                    style("✓").green(),
                    style(&record.phase).bold(),
                    summary.passed
                );
                if let Some(ref note) = record.test_results.note {
                    eprintln!("  {} {note}", style("!").yellow());
                }
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!(
                    "{} Recorded failing evidence for phase {} ({} passed, {} failed)",
                    style("!").yellow(),
                    style(&record.phase).bold(),
                    summary.passed,
                    summary.failed
                );
                Ok(ExitCode::FAILURE)
            }
        },
        Err(e @ Error::TestsFailed { .. }) => {
            eprintln!("{} {e}", style("✗").red());
            Ok(ExitCode::FAILURE)
        },
        Err(e) => Err(e),
    }
}

fn run_tests(ws: &Workspace, command: &str) -> Result<TestResults> {
    if let Some(program) = Executor::program_of(command) {
        if !program.contains(['=', '/']) && !Executor::command_exists(program) {
            return Err(Error::CommandNotFound {
                command: program.to_string(),
            });
        }
    }

    let timeout = ws.config.evidence.run_timeout_duration()?;
    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(template);
    }
    spinner.set_message(format!("Running {command}..."));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let output = runtime()?.block_on(
        Executor::new().execute(command, ExecuteOptions::default().cwd(&ws.root).timeout(timeout)),
    );
    spinner.finish_and_clear();
    let output = output?;

    if output.timed_out {
        eprintln!(
            "{} Test command timed out after {}",
            style("✗").red(),
            humantime::format_duration(timeout)
        );
    }
    Ok(TestResults::from_command_output(&output))
}

/// Verify evidence for a phase.
pub fn verify(phase: &str, max_age: Option<Duration>) -> Result<ExitCode> {
    let ws = workspace()?;
    let max_age_minutes =
        max_age.map_or(ws.config.evidence.max_age_minutes, |d| (d.as_secs() / 60).max(1));

    let verification = evidence::verify(&store(&ws), phase, max_age_minutes)?;
    if verification.is_valid() {
        eprintln!("{} {verification}", style("✓").green());
        return Ok(ExitCode::SUCCESS);
    }

    eprintln!("{} {verification}", style("✗").red());
    if let Some(remediation) = verification.remediation() {
        eprintln!("  {}", remediation.replace("<id>", phase));
    }
    Ok(ExitCode::FAILURE)
}

/// Check file placement.
pub fn location(staged: bool) -> Result<ExitCode> {
    let ws = workspace()?;
    let policy = LocationPolicy::from_config(&ws.config.location)?;

    let violations = if staged {
        let repo = GitRepo::discover_from(&ws.root)?;
        policy.validate_staged(&repo.staged_files()?)
    } else {
        let tree = FileTree::scan(&ws.root, &ws.config.location.ignore_dirs)?;
        policy.validate_tree(&tree)
    };

    if violations.is_empty() {
        eprintln!("{} All files are in place", style("✓").green());
        return Ok(ExitCode::SUCCESS);
    }

    eprintln!(
        "{} {} misplaced file(s)",
        style("✗").red(),
        violations.len()
    );
    for violation in &violations {
        eprintln!("  {violation}");
    }
    Ok(ExitCode::FAILURE)
}

/// Report overlapping documentation.
///
/// Advisory: errors are printed and the exit code is always success.
pub fn similar(threshold: Option<f64>, json: bool) -> Result<ExitCode> {
    if let Err(e) = report_overlaps(threshold, json) {
        eprintln!("{} Similarity check could not run: {e}", style("!").yellow());
    }
    Ok(ExitCode::SUCCESS)
}

fn report_overlaps(threshold: Option<f64>, json: bool) -> Result<()> {
    let ws = workspace()?;
    let mut detector = SimilarityDetector::new(&ws.config.similarity)?;
    if let Some(threshold) = threshold {
        detector = detector.with_threshold(threshold)?;
    }

    let docs = detector.load_corpus(&ws.root)?;
    let overlaps = detector.find_overlaps(&docs);

    if json {
        let text = serde_json::to_string_pretty(&overlaps).map_err(|e| Error::Internal {
            message: format!("Failed to serialize overlaps: {e}"),
        })?;
        println!("{text}");
        return Ok(());
    }

    if overlaps.is_empty() {
        eprintln!(
            "{} No overlapping documents among {} (threshold {:.2})",
            style("✓").green(),
            docs.len(),
            detector.threshold()
        );
        return Ok(());
    }

    println!(
        "{} overlapping pair(s) among {} document(s):",
        overlaps.len(),
        docs.len()
    );
    for overlap in &overlaps {
        println!();
        println!(
            "{} {} <-> {} ({})",
            style(format!("{:.0}%", overlap.similarity() * 100.0)).yellow(),
            overlap.first.display(),
            overlap.second.display(),
            overlap.reason
        );
        println!(
            "  keep {}, merge {}",
            style(overlap.suggestion.keep.display()).bold(),
            overlap.suggestion.merge_from.display()
        );
        for (i, step) in overlap.suggestion.steps.iter().enumerate() {
            println!("    {}. {step}", i + 1);
        }
    }
    Ok(())
}

/// Classify content units.
pub fn maturity(phase: Option<&str>) -> Result<ExitCode> {
    let ws = workspace()?;
    let classifier = MaturityClassifier::new(&ws.config.maturity)?;
    let report = classifier.check(&ws.root, phase, Utc::now().date_naive())?;

    if report.units.is_empty() {
        eprintln!("{} No content units found", style("•").cyan());
    } else {
        println!(
            "{:<48} {:<10} {:>6} {:<10} {}",
            "PATH", "STATUS", "WORDS", "UPDATED", "SIGNALS"
        );
        for unit in &report.units {
            let status = unit.status().to_string();
            println!(
                "{:<48} {:<10} {:>6} {:<10} {}",
                unit.path.display(),
                if unit.stub {
                    style(status).yellow()
                } else {
                    style(status).green()
                },
                unit.meta.word_count,
                format_date(unit.meta.last_updated),
                unit.signals.join(", ")
            );
        }
    }

    let health = runtime()?.block_on(classifier.run_health(&ws.root, &Executor::new()))?;
    let health_failed = health.as_ref().is_some_and(|output| !output.success());

    for finding in &report.findings {
        eprintln!("{} {finding}", style("✗").red());
    }
    if let Some(output) = health.filter(|output| !output.success()) {
        eprintln!(
            "{} Content health command exited with {}",
            style("✗").red(),
            output.exit_code
        );
        for line in output.tail_lines(HEALTH_OUTPUT_LINES) {
            eprintln!("    {line}");
        }
    }

    Ok(if report.passed() && !health_failed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Initialize configuration.
pub fn init(force: bool) -> Result<ExitCode> {
    let config_path = PathBuf::from(CONFIG_FILE_NAME);

    if config_path.exists() && !force {
        let overwrite = std::io::stdin().is_terminal()
            && dialoguer::Confirm::new()
                .with_prompt(format!("{} already exists. Overwrite?", config_path.display()))
                .default(false)
                .interact()
                .map_err(|e| Error::Internal {
                    message: format!("Failed to read confirmation: {e}"),
                })?;
        if !overwrite {
            eprintln!(
                "{} Configuration already exists: {}",
                style("!").yellow(),
                config_path.display()
            );
            eprintln!("  Use --force to overwrite.");
            return Ok(ExitCode::FAILURE);
        }
    }

    std::fs::write(&config_path, Config::default_toml())
        .map_err(|e| Error::io("write config", e))?;

    eprintln!("{} Created {}", style("✓").green(), config_path.display());
    eprintln!("\nNext steps:");
    eprintln!("  1. Review and customize {CONFIG_FILE_NAME}");
    eprintln!("  2. Record evidence: agate record --phase <id> --run \"<test command>\"");
    eprintln!("  3. Run the gate: agate check");

    Ok(ExitCode::SUCCESS)
}

/// Validate configuration.
pub fn validate() -> Result<ExitCode> {
    match Config::load() {
        Ok(_) => {
            eprintln!("{} Configuration is valid", style("✓").green());
            Ok(ExitCode::SUCCESS)
        },
        Err(Error::ConfigNotFound { path }) => {
            eprintln!(
                "{} Configuration not found: {}",
                style("!").yellow(),
                path.display()
            );
            eprintln!("  Run: agate init");
            Ok(ExitCode::FAILURE)
        },
        Err(e) => {
            eprintln!("{} Configuration validation failed: {e}", style("✗").red());
            Ok(ExitCode::FAILURE)
        },
    }
}

/// Show configuration.
pub fn config(raw: bool) -> Result<ExitCode> {
    match Config::find_config_file() {
        Ok(path) => {
            eprintln!("Configuration file: {}", path.display());

            if raw {
                let content =
                    std::fs::read_to_string(&path).map_err(|e| Error::io("read config", e))?;
                eprintln!();
                std::io::stdout()
                    .write_all(content.as_bytes())
                    .map_err(|e| Error::io("write output", e))?;
            }

            Ok(ExitCode::SUCCESS)
        },
        Err(Error::ConfigNotFound { .. }) => {
            eprintln!("{} No configuration file found", style("!").yellow());
            eprintln!("  Run: agate init");
            Ok(ExitCode::FAILURE)
        },
        Err(e) => Err(e),
    }
}

/// Generate shell completions.
pub fn completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    clap_complete::generate(
        shell,
        &mut super::Cli::command(),
        "agate",
        &mut std::io::stdout(),
    );
}
