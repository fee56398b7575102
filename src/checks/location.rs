//! File placement validation.
//!
//! Keeps the repository root clean: only allow-listed files and directories
//! may live there, and session/draft/progress/temp files are redirected to a
//! canonical directory.

use crate::config::LocationConfig;
use crate::core::error::{Error, Result};
use crate::core::tree::FileTree;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Reason attached to every forbidden-pattern violation.
pub const FORBIDDEN_REASON: &str = "session/temporary file in root";

/// Which placement rule a file broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    /// The file name matches a forbidden pattern.
    ForbiddenPattern,
    /// A root file that is not on the allow-list.
    NotInAllowList,
    /// A root directory that is not on the allow-list.
    UnexpectedDirectory,
}

/// A misplaced file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Offending path, relative to the root (directories end in `/`).
    pub file: String,
    /// Rule that was broken.
    pub rule: RuleKind,
    /// Human-readable reason.
    pub reason: String,
    /// Where the file should go, when known.
    pub suggested_path: Option<PathBuf>,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file, self.reason)?;
        if let Some(ref target) = self.suggested_path {
            write!(f, " -> move to {}", target.display())?;
        }
        Ok(())
    }
}

/// Outcome of classifying one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// The path may stay where it is.
    Allowed,
    /// The path breaks a rule.
    Violation(Violation),
}

impl Placement {
    /// Returns the violation, if the path broke a rule.
    #[must_use]
    pub fn violation(self) -> Option<Violation> {
        match self {
            Self::Allowed => None,
            Self::Violation(v) => Some(v),
        }
    }
}

/// Which files to validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    /// Every file in the working tree.
    #[default]
    FullTree,
    /// Only staged files at the repository root.
    Staged,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    keyword: String,
    pattern: Regex,
    template: PathBuf,
}

/// Compiled placement policy.
#[derive(Debug, Clone)]
pub struct LocationPolicy {
    root_files: BTreeSet<String>,
    root_dirs: BTreeSet<String>,
    forbidden: Vec<CompiledRule>,
}

impl LocationPolicy {
    /// Compiles the policy from configuration.
    pub fn from_config(config: &LocationConfig) -> Result<Self> {
        let forbidden = config
            .forbidden
            .iter()
            .map(|rule| {
                let pattern = RegexBuilder::new(&rule.pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| Error::config_invalid("location.forbidden", e.to_string()))?;
                Ok(CompiledRule {
                    keyword: rule.keyword.clone(),
                    pattern,
                    template: PathBuf::from(&rule.template),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            root_files: config.allowed_root_files.iter().cloned().collect(),
            root_dirs: config.allowed_root_dirs.iter().cloned().collect(),
            forbidden,
        })
    }

    /// Returns the keyword and template of the first forbidden rule matching `name`.
    #[must_use]
    pub fn matches_forbidden(&self, name: &str) -> Option<(&str, PathBuf)> {
        self.forbidden
            .iter()
            .find(|rule| rule.pattern.is_match(name))
            .map(|rule| (rule.keyword.as_str(), rule.template.join(name)))
    }

    /// Whether `name` is allow-listed as a root file.
    #[must_use]
    pub fn is_allowed_root_file(&self, name: &str) -> bool {
        self.root_files.contains(name)
    }

    /// Whether `name` is allow-listed as a root directory.
    #[must_use]
    pub fn is_allowed_root_dir(&self, name: &str) -> bool {
        self.root_dirs.contains(name)
    }

    /// Classifies a `/`-separated path relative to the repository root.
    #[must_use]
    pub fn classify(&self, path: &str) -> Placement {
        let path = path.trim_start_matches("./");

        if let Some((dir, _)) = path.split_once('/') {
            if self.is_allowed_root_dir(dir) {
                return Placement::Allowed;
            }
            return Placement::Violation(Violation {
                file: format!("{dir}/"),
                rule: RuleKind::UnexpectedDirectory,
                reason: format!("unexpected root directory '{dir}'"),
                suggested_path: None,
            });
        }

        if let Some((keyword, target)) = self.matches_forbidden(path) {
            tracing::debug!(file = path, keyword, "forbidden root file");
            return Placement::Violation(Violation {
                file: path.to_string(),
                rule: RuleKind::ForbiddenPattern,
                reason: FORBIDDEN_REASON.to_string(),
                suggested_path: Some(target),
            });
        }

        if self.is_allowed_root_file(path) {
            Placement::Allowed
        } else {
            Placement::Violation(Violation {
                file: path.to_string(),
                rule: RuleKind::NotInAllowList,
                reason: "root file not in allow-list".to_string(),
                suggested_path: None,
            })
        }
    }

    /// Validates every file in the snapshot; unexpected directories are reported once.
    #[must_use]
    pub fn validate_tree(&self, tree: &FileTree) -> Vec<Violation> {
        let mut seen = BTreeSet::new();
        let mut violations: Vec<Violation> = tree
            .files()
            .iter()
            .filter_map(|file| self.classify(file).violation())
            .filter(|v| seen.insert(v.file.clone()))
            .collect();

        // Empty directories carry no files but are still misplaced.
        for dir in tree.root_dirs() {
            let key = format!("{dir}/");
            if !self.is_allowed_root_dir(dir) && !seen.contains(&key) {
                if let Some(v) = self.classify(&format!("{dir}/.")).violation() {
                    seen.insert(key);
                    violations.push(v);
                }
            }
        }

        violations.sort_by(|a, b| a.file.cmp(&b.file));
        violations
    }

    /// Validates staged files, considering only those at the root.
    #[must_use]
    pub fn validate_staged(&self, staged: &[String]) -> Vec<Violation> {
        let mut violations: Vec<Violation> = staged
            .iter()
            .filter(|f| !f.contains('/') && !f.contains('\\'))
            .filter_map(|f| self.classify(f).violation())
            .collect();
        violations.sort_by(|a, b| a.file.cmp(&b.file));
        violations.dedup();
        violations
    }
}
