//! Core functionality for agent-gate.
//!
//! - [`orchestrator`]: runs the gate sequence and aggregates results
//! - [`phase`]: phase detection from commit messages
//! - [`tree`]: working-tree snapshot
//! - [`git`]: version-control queries
//! - [`executor`]: subprocess execution
//! - [`error`]: error types and result handling

pub mod error;
pub mod executor;
pub mod git;
pub mod orchestrator;
pub mod phase;
pub mod tree;
