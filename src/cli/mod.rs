//! Command-line interface for agent-gate.
//!
//! The `agate` binary is thin glue over the library:
//! - `check`: run the full gate (default)
//! - `record` / `verify`: write and check test evidence
//! - `location`, `similar`, `maturity`: run one validator on its own
//! - `init`, `validate`, `config`, `completions`: configuration glue

mod commands;

use crate::core::error::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Evidence-based quality gates for commits produced by AI coding agents.
#[derive(Debug, Parser)]
#[command(
    name = "agate",
    author,
    version,
    about = "Evidence-based quality gates for commits produced by AI coding agents",
    long_about = r#"
agent-gate (agate) decides whether a unit of work is done. It checks where
files were put, whether content is still a stub, and, when a commit message
declares a phase complete, whether fresh passing test evidence and every
promised deliverable exist.

Quick start:
  agate init                              # Create agent-gate.toml
  agate record --phase 1.2 --run "cargo test"
  agate check --message "complete phase-1.2"

Environment variables:
  RUST_LOG=agent_gate=debug   Fine-grained log filtering
"#,
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use color output.
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,
}

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Always use color.
    Always,
    /// Auto-detect color support.
    #[default]
    Auto,
    /// Never use color.
    Never,
}

/// Options for `agate check`.
#[derive(Debug, Clone, Default, Args)]
pub struct CheckArgs {
    /// Skip the file location check.
    #[arg(long)]
    pub skip_location: bool,

    /// Skip the evidence check.
    #[arg(long)]
    pub skip_evidence: bool,

    /// Skip the content maturity check.
    #[arg(long)]
    pub skip_maturity: bool,

    /// Treat this phase as active, ignoring the commit message.
    #[arg(short, long)]
    pub phase: Option<String>,

    /// Read the phase from this commit message instead of the last commit.
    #[arg(short, long)]
    pub message: Option<String>,

    /// Only validate staged files at the repository root.
    #[arg(long)]
    pub staged: bool,
}

/// Options for `agate record`.
#[derive(Debug, Clone, Args)]
pub struct RecordArgs {
    /// Phase the test run belongs to.
    #[arg(short, long)]
    pub phase: String,

    /// Test-results JSON file to record.
    #[arg(short, long, conflicts_with = "run")]
    pub results: Option<PathBuf>,

    /// Run this test command and record its outcome.
    #[arg(long)]
    pub run: Option<String>,

    /// Record a failing run instead of refusing it.
    #[arg(short, long)]
    pub force: bool,

    /// Record success when no results file can be found.
    #[arg(long, conflicts_with_all = ["results", "run"])]
    pub assume_passed: bool,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run every gate check (the default).
    #[command(visible_alias = "c")]
    Check(CheckArgs),

    /// Record test evidence for a phase.
    #[command(visible_alias = "r")]
    Record(RecordArgs),

    /// Verify that fresh passing evidence exists for a phase.
    Verify {
        /// Phase to verify.
        #[arg(short, long)]
        phase: String,

        /// Freshness window, e.g. `30m` or `2h`.
        #[arg(long, value_parser = humantime::parse_duration)]
        max_age: Option<Duration>,
    },

    /// Check file placement only.
    #[command(visible_alias = "l")]
    Location {
        /// Only validate staged files at the repository root.
        #[arg(long)]
        staged: bool,
    },

    /// Find overlapping documentation (advisory, always exits 0).
    #[command(visible_alias = "s")]
    Similar {
        /// Similarity threshold in [0, 1].
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Print overlaps as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Classify content units and report stubs.
    #[command(visible_alias = "m")]
    Maturity {
        /// Treat this phase as active.
        #[arg(short, long)]
        phase: Option<String>,
    },

    /// Create an agent-gate.toml with default settings.
    #[command(visible_alias = "i")]
    Init {
        /// Overwrite existing configuration.
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the configuration file.
    #[command(visible_alias = "v")]
    Validate,

    /// Show configuration file location and contents.
    Config {
        /// Output raw TOML.
        #[arg(long)]
        raw: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Runs the CLI.
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);
    setup_color(cli.color);

    match cli.command {
        Some(Commands::Check(args)) => commands::check(&args, cli.quiet),
        Some(Commands::Record(args)) => commands::record(&args),
        Some(Commands::Verify { phase, max_age }) => commands::verify(&phase, max_age),
        Some(Commands::Location { staged }) => commands::location(staged),
        Some(Commands::Similar { threshold, json }) => commands::similar(threshold, json),
        Some(Commands::Maturity { phase }) => commands::maturity(phase.as_deref()),
        Some(Commands::Init { force }) => commands::init(force),
        Some(Commands::Validate) => commands::validate(),
        Some(Commands::Config { raw }) => commands::config(raw),
        Some(Commands::Completions { shell }) => {
            commands::completions(shell);
            Ok(ExitCode::SUCCESS)
        },
        None => commands::check(&CheckArgs::default(), cli.quiet),
    }
}

/// Sets up logging based on verbosity flags.
fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Sets up color output.
fn setup_color(choice: ColorChoice) {
    match choice {
        ColorChoice::Always => {
            console::set_colors_enabled(true);
            console::set_colors_enabled_stderr(true);
        },
        ColorChoice::Never => {
            console::set_colors_enabled(false);
            console::set_colors_enabled_stderr(false);
        },
        ColorChoice::Auto => {},
    }
}
