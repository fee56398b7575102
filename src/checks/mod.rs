//! Gate checks.
//!
//! - [`location`]: file placement policy
//! - [`maturity`]: content stub/staleness classification
//! - [`deliverables`]: phase deliverable completeness

pub mod deliverables;
pub mod location;
pub mod maturity;

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Identifies one step of the gate sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckKind {
    /// Root file placement.
    Location,
    /// Working-tree status, informational only.
    VcsStatus,
    /// Content maturity.
    Maturity,
    /// Fresh passing test evidence for the active phase.
    Evidence,
    /// Deliverables named by the active phase.
    Deliverables,
}

impl CheckKind {
    /// Every check, in execution order.
    pub const ALL: [Self; 5] = [
        Self::Location,
        Self::VcsStatus,
        Self::Maturity,
        Self::Evidence,
        Self::Deliverables,
    ];

    /// Stable name used in reports and on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::VcsStatus => "vcs-status",
            Self::Maturity => "maturity",
            Self::Evidence => "evidence",
            Self::Deliverables => "deliverables",
        }
    }

    /// Whether the check only runs while a phase is active.
    #[must_use]
    pub const fn is_phase_conditional(self) -> bool {
        matches!(self, Self::Evidence | Self::Deliverables)
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CheckKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown check: {s}"))
    }
}
