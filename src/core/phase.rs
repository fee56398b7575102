//! Phase detection from commit messages.

use crate::config::PhaseConfig;
use crate::core::error::{Error, Result};
use regex::Regex;

/// Where the active phase came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseSource {
    /// Supplied explicitly by the caller.
    Override,
    /// Extracted from the commit message.
    CommitMessage,
}

/// An active phase whose completion triggers the evidence and deliverable checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePhase {
    /// Phase identifier, e.g. `1.2`.
    pub id: String,
    /// How the phase was determined.
    pub source: PhaseSource,
}

/// Extracts phase ids from commit messages.
#[derive(Debug, Clone)]
pub struct PhaseDetector {
    marker: Regex,
}

impl PhaseDetector {
    /// Compiles the marker pattern from configuration.
    pub fn new(config: &PhaseConfig) -> Result<Self> {
        let marker = Regex::new(&config.marker_pattern)
            .map_err(|e| Error::config_invalid("phase.marker_pattern", e.to_string()))?;
        Ok(Self { marker })
    }

    /// Returns the first phase id named in `message`.
    #[must_use]
    pub fn extract(&self, message: &str) -> Option<String> {
        self.marker
            .captures(message)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Resolves the active phase: an override wins over the commit message.
    #[must_use]
    pub fn resolve(&self, phase_override: Option<&str>, message: Option<&str>) -> Option<ActivePhase> {
        if let Some(id) = phase_override.map(str::trim).filter(|id| !id.is_empty()) {
            return Some(ActivePhase {
                id: id.to_string(),
                source: PhaseSource::Override,
            });
        }

        message.and_then(|m| self.extract(m)).map(|id| ActivePhase {
            id,
            source: PhaseSource::CommitMessage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn detector() -> PhaseDetector {
        PhaseDetector::new(&PhaseConfig::default()).expect("default pattern compiles")
    }

    #[rstest]
    #[case("feat: complete phase-1.2", Some("1.2"))]
    #[case("Phase 2.1 complete", Some("2.1"))]
    #[case("PHASE_3.4.1 done", Some("3.4.1"))]
    #[case("phase1.0: wrap up", Some("1.0"))]
    #[case("phase-1 is not dotted", None)]
    #[case("fix typo in README", None)]
    #[case("multiphase-1.2 rollout", None)]
    fn test_extract(#[case] message: &str, #[case] expected: Option<&str>) {
        assert_eq!(detector().extract(message).as_deref(), expected);
    }

    #[test]
    fn test_override_takes_precedence() {
        let active = detector()
            .resolve(Some("4.0"), Some("complete phase-1.2"))
            .expect("active");
        assert_eq!(active.id, "4.0");
        assert_eq!(active.source, PhaseSource::Override);
    }

    #[test]
    fn test_blank_override_falls_back_to_message() {
        let active = detector()
            .resolve(Some("  "), Some("complete phase-1.2"))
            .expect("active");
        assert_eq!(active.id, "1.2");
        assert_eq!(active.source, PhaseSource::CommitMessage);
    }

    #[test]
    fn test_no_phase() {
        assert!(detector().resolve(None, Some("chore: bump deps")).is_none());
        assert!(detector().resolve(None, None).is_none());
    }

    #[test]
    fn test_custom_pattern() {
        let config = PhaseConfig {
            marker_pattern: r"milestone/(\w+)".to_string(),
            ..PhaseConfig::default()
        };
        let detector = PhaseDetector::new(&config).expect("compile");
        assert_eq!(detector.extract("closes milestone/alpha").as_deref(), Some("alpha"));
    }
}
