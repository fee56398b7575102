//! Deliverable completeness for an active phase.
//!
//! A phase is described in prose (`docs/phases/phase-<id>.md` by default).
//! Every backtick-quoted file path in that document is a deliverable that
//! must exist once the phase is declared complete.

use crate::config::PhaseConfig;
use crate::core::error::{Error, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static BACKTICKED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`\s]+)`").expect("static regex"));
static PATH_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.\-/]+$").expect("static regex"));
static EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.[A-Za-z][A-Za-z0-9]*$").expect("static regex"));
static BARE_FILE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Za-z0-9_-]*$").expect("static regex"));
static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+(?:\[[ xX]\]\s+)?(.+)$").expect("static regex")
});

/// Backtick-quoted file paths in `text`, in first-seen order.
///
/// Directory references (a trailing `/`) are dropped, as are tokens that do
/// not look like a file path. A token counts as a path when it has a
/// separator, an extension, or is a capitalized bare name like `Makefile`.
#[must_use]
pub fn extract_path_references(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    BACKTICKED
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim_start_matches("./"))
        .filter(|token| !token.ends_with('/'))
        .filter(|token| PATH_LIKE.is_match(token))
        .filter(|token| {
            token.contains('/') || EXTENSION.is_match(token) || BARE_FILE_NAME.is_match(token)
        })
        .filter(|token| seen.insert((*token).to_string()))
        .map(str::to_string)
        .collect()
}

/// List items under any heading whose text mentions "objectives".
#[must_use]
pub fn extract_objectives(text: &str) -> Vec<String> {
    let mut in_section = false;
    let mut objectives = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') {
            in_section = trimmed
                .trim_start_matches('#')
                .to_lowercase()
                .contains("objective");
            continue;
        }
        if in_section {
            if let Some(item) = LIST_ITEM.captures(line).and_then(|c| c.get(1)) {
                objectives.push(item.as_str().trim().to_string());
            }
        }
    }
    objectives
}

/// Outcome of checking a phase's deliverables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliverableReport {
    /// Phase checked.
    pub phase: String,
    /// Description document, relative to the root.
    pub description: PathBuf,
    /// Objectives listed in the description.
    pub objectives: Vec<String>,
    /// Deliverables that exist.
    pub present: Vec<String>,
    /// Deliverables that do not exist.
    pub missing: Vec<String>,
}

impl DeliverableReport {
    /// Whether every deliverable exists.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Result of looking for a phase's deliverables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deliverables {
    /// The description document does not exist.
    NoDescription(PathBuf),
    /// The description was read and its paths checked.
    Checked(DeliverableReport),
}

impl Deliverables {
    /// The report, when the description document was found.
    #[must_use]
    pub fn report(self) -> Option<DeliverableReport> {
        match self {
            Self::NoDescription(_) => None,
            Self::Checked(report) => Some(report),
        }
    }
}

/// Checks that every deliverable named in the phase description exists under `root`.
pub fn check_deliverables(root: &Path, config: &PhaseConfig, phase: &str) -> Result<Deliverables> {
    let description = config.description_path(phase);
    let full = root.join(&description);
    let text = match std::fs::read_to_string(&full) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %full.display(), "no phase description");
            return Ok(Deliverables::NoDescription(description));
        },
        Err(e) => return Err(Error::io(format!("read {}", full.display()), e)),
    };

    let (present, missing): (Vec<String>, Vec<String>) = extract_path_references(&text)
        .into_iter()
        .partition(|path| root.join(path).exists());

    tracing::debug!(
        phase,
        present = present.len(),
        missing = missing.len(),
        "checked deliverables"
    );

    Ok(Deliverables::Checked(DeliverableReport {
        phase: phase.to_string(),
        objectives: extract_objectives(&text),
        description,
        present,
        missing,
    }))
}
