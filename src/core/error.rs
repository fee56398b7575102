//! Error types for agent-gate.
//!
//! Business-rule failures (misplaced files, stale evidence, missing
//! deliverables) are never errors; they travel as gate results. The variants
//! here are the conditions that make a run untrustworthy.

use std::path::PathBuf;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in agent-gate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Configuration errors
    // =========================================================================
    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// Path where config was expected.
        path: PathBuf,
    },

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        /// Description of the parse error.
        message: String,
        /// Optional source error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration: {field} - {message}")]
    ConfigInvalid {
        /// Field name that is invalid.
        field: String,
        /// Description of why it's invalid.
        message: String,
    },

    // =========================================================================
    // Evidence errors
    // =========================================================================
    /// Evidence or test-result JSON did not match the expected schema.
    #[error("Invalid evidence data in {origin}: {message}")]
    EvidenceSchema {
        /// File or source the data came from.
        origin: String,
        /// What was wrong with it.
        message: String,
    },

    /// No test results could be found to record.
    #[error("No test results found (looked in: {}). Pass --results, --run, or --assume-passed", format_paths(.probed))]
    ResultsNotDetected {
        /// Locations that were probed.
        probed: Vec<PathBuf>,
    },

    /// Refused to record evidence for a failing test run.
    #[error("Tests failed for phase {phase}; refusing to record evidence (use --force to record anyway)")]
    TestsFailed {
        /// Phase the run was recorded for.
        phase: String,
    },

    // =========================================================================
    // Git errors
    // =========================================================================
    /// Not in a Git repository.
    #[error("Not in a Git repository")]
    NotGitRepo,

    /// Git operation failed.
    #[error("Git operation failed: {operation} - {message}")]
    GitOperation {
        /// Name of the operation that failed.
        operation: String,
        /// Error message.
        message: String,
    },

    // =========================================================================
    // Process errors
    // =========================================================================
    /// Command not found.
    #[error("Command not found: {command}")]
    CommandNotFound {
        /// The command that wasn't found.
        command: String,
    },

    // =========================================================================
    // I/O errors
    // =========================================================================
    /// File I/O error.
    #[error("I/O error: {message}")]
    Io {
        /// Description of what failed.
        message: String,
        /// Source error.
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Internal errors
    // =========================================================================
    /// Internal error (should never happen).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Creates a new configuration parse error.
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new configuration parse error with source.
    pub fn config_parse_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an invalid-configuration error for a field.
    pub fn config_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an evidence schema error.
    pub fn evidence_schema(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EvidenceSchema {
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Creates a new I/O error with context.
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Creates a new Git operation error.
    pub fn git(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GitOperation {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration-class error.
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. }
                | Self::ConfigParse { .. }
                | Self::ConfigInvalid { .. }
                | Self::EvidenceSchema { .. }
                | Self::ResultsNotDetected { .. }
        )
    }

    /// Returns true if this is a user-correctable error.
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. }
                | Self::ConfigInvalid { .. }
                | Self::ResultsNotDetected { .. }
                | Self::TestsFailed { .. }
                | Self::NotGitRepo
        )
    }

    /// Returns an exit code appropriate for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigNotFound { .. }
            | Self::ConfigParse { .. }
            | Self::ConfigInvalid { .. }
            | Self::EvidenceSchema { .. }
            | Self::ResultsNotDetected { .. } => 78, // EX_CONFIG
            Self::NotGitRepo | Self::GitOperation { .. } => 65, // EX_DATAERR
            Self::Io { .. } => 74,                              // EX_IOERR
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Display tests
    // =========================================================================

    #[test]
    fn test_display_config_not_found() {
        let err = Error::ConfigNotFound {
            path: PathBuf::from("/my/agent-gate.toml"),
        };
        assert_eq!(
            err.to_string(),
            "Configuration file not found: /my/agent-gate.toml"
        );
    }

    #[test]
    fn test_display_config_invalid() {
        let err = Error::config_invalid("similarity.threshold", "must be within [0, 1]");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: similarity.threshold - must be within [0, 1]"
        );
    }

    #[test]
    fn test_display_evidence_schema() {
        let err = Error::evidence_schema("latest-run.json", "missing field `passed`");
        assert_eq!(
            err.to_string(),
            "Invalid evidence data in latest-run.json: missing field `passed`"
        );
    }

    #[test]
    fn test_display_results_not_detected_lists_probes() {
        let err = Error::ResultsNotDetected {
            probed: vec![
                PathBuf::from("test-results.json"),
                PathBuf::from("target/test-results.json"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("test-results.json, target/test-results.json"));
        assert!(msg.contains("--assume-passed"));
    }

    #[test]
    fn test_display_tests_failed() {
        let err = Error::TestsFailed {
            phase: "1.2".to_string(),
        };
        assert!(err.to_string().starts_with("Tests failed for phase 1.2"));
    }

    #[test]
    fn test_display_git_operation() {
        let err = Error::git("rev-parse", "bad revision");
        assert_eq!(
            err.to_string(),
            "Git operation failed: rev-parse - bad revision"
        );
    }

    #[test]
    fn test_display_io() {
        let err = Error::io("read tree", std::io::Error::other("denied"));
        assert_eq!(err.to_string(), "I/O error: read tree");
    }

    // =========================================================================
    // Classification
    // =========================================================================

    #[test]
    fn test_configuration_class() {
        assert!(Error::config_parse("x").is_configuration());
        assert!(Error::evidence_schema("a", "b").is_configuration());
        assert!(Error::ResultsNotDetected { probed: vec![] }.is_configuration());
        assert!(!Error::io("x", std::io::Error::other("y")).is_configuration());
        assert!(!Error::NotGitRepo.is_configuration());
    }

    #[test]
    fn test_is_user_error() {
        assert!(Error::NotGitRepo.is_user_error());
        assert!(Error::TestsFailed { phase: "1".into() }.is_user_error());
        assert!(!Error::Internal {
            message: "x".into()
        }
        .is_user_error());
    }

    // =========================================================================
    // Exit codes
    // =========================================================================

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::config_parse("x").exit_code(), 78);
        assert_eq!(Error::evidence_schema("a", "b").exit_code(), 78);
        assert_eq!(Error::NotGitRepo.exit_code(), 65);
        assert_eq!(Error::git("op", "msg").exit_code(), 65);
        assert_eq!(Error::io("x", std::io::Error::other("y")).exit_code(), 74);
        assert_eq!(Error::TestsFailed { phase: "1".into() }.exit_code(), 1);
    }

    #[test]
    fn test_io_error_has_source() {
        use std::error::Error as StdError;
        let err = Error::io("x", std::io::Error::other("inner"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_config_parse_with_source_has_source() {
        use std::error::Error as StdError;
        let toml_err = toml::from_str::<toml::Value>("bad").expect_err("should fail");
        let err = Error::config_parse_with_source("msg", toml_err);
        assert!(err.source().is_some());
    }
}
