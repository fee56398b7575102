//! # agent-gate
//!
//! Evidence-based quality gates for commits produced by AI coding agents.
//!
//! Agents are quick to say a task is done. `agent-gate` checks instead: it
//! refuses work that leaves files in the wrong place, ships stub content, or
//! declares a phase complete without fresh passing test evidence and every
//! promised deliverable.
//!
//! ## Features
//!
//! - **File placement**: keeps session notes, drafts and scratch files out of
//!   the repository root
//! - **Test evidence**: timestamped proof that a passing test run happened,
//!   checked against a freshness window
//! - **Phase gating**: a commit message such as "complete phase-1.2" turns on
//!   the evidence and deliverable checks
//! - **Content maturity**: flags stubs that are published, stale, or belong to
//!   the phase being closed
//! - **Duplicate docs**: an advisory similarity pass over Markdown
//!
//! ## Example
//!
//! ```rust,no_run
//! use agent_gate::{Config, GateOptions, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> agent_gate::Result<()> {
//!     let config = Config::load_or_default()?;
//!     let gate = Orchestrator::new(config, ".");
//!
//!     let options = GateOptions {
//!         commit_message: Some("feat: complete phase-1.2".to_string()),
//!         ..GateOptions::default()
//!     };
//!     let report = gate.run(&options).await?;
//!
//!     for failed in report.failed_checks() {
//!         eprintln!("{failed}");
//!     }
//!     std::process::exit(i32::from(!report.success()));
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/agent-gate/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod checks;
pub mod cli;
pub mod config;
pub mod core;
pub mod evidence;
pub mod similarity;

// Re-export main types for convenience
pub use checks::CheckKind;
pub use config::Config;
pub use core::error::{Error, Result};
pub use core::orchestrator::{GateOptions, GateReport, GateResult, Orchestrator};
pub use evidence::{EvidenceRecord, EvidenceRecorder, EvidenceStore, Verification};
pub use similarity::{Overlap, SimilarityDetector};
