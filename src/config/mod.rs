//! Configuration handling for agent-gate.
//!
//! Every threshold, pattern and path the gate uses lives here. A [`Config`]
//! is loaded once at process start (from `agent-gate.toml` or defaults),
//! validated up front, and passed by reference into each component.

use crate::core::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "agent-gate.toml";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File placement policy.
    pub location: LocationConfig,
    /// Evidence recording and freshness.
    pub evidence: EvidenceConfig,
    /// Duplicate documentation detection.
    pub similarity: SimilarityConfig,
    /// Content maturity heuristics.
    pub maturity: MaturityConfig,
    /// Phase detection and deliverables.
    pub phase: PhaseConfig,
}

impl Config {
    /// Loads configuration from the default location.
    pub fn load() -> Result<Self> {
        let path = Self::find_config_file()?;
        Self::load_from(&path)
    }

    /// Loads configuration or returns defaults if not found.
    pub fn load_or_default() -> Result<Self> {
        match Self::find_config_file() {
            Ok(path) => Self::load_from(&path),
            Err(Error::ConfigNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io("read config", e))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::config_parse_with_source("Failed to parse TOML", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Finds the configuration file by searching up from the current directory.
    pub fn find_config_file() -> Result<PathBuf> {
        let cwd = std::env::current_dir().map_err(|e| Error::io("get current dir", e))?;
        Self::find_config_file_from(&cwd)
    }

    /// Finds the configuration file by searching up from `start`.
    pub fn find_config_file_from(start: &Path) -> Result<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| Error::ConfigNotFound {
                path: start.join(CONFIG_FILE_NAME),
            })
    }

    /// Validates the configuration.
    ///
    /// Compiles every pattern and parses every duration so that a bad value
    /// is reported before any check runs.
    pub fn validate(&self) -> Result<()> {
        for (i, rule) in self.location.forbidden.iter().enumerate() {
            compile("location.forbidden", &rule.pattern)?;
            if rule.keyword.trim().is_empty() {
                return Err(Error::config_invalid(
                    format!("location.forbidden[{i}].keyword"),
                    "keyword must not be empty",
                ));
            }
            if rule.template.trim().is_empty() {
                return Err(Error::config_invalid(
                    format!("location.forbidden[{i}].template"),
                    "template directory must not be empty",
                ));
            }
        }

        if self.evidence.max_age_minutes == 0 {
            return Err(Error::config_invalid(
                "evidence.max_age_minutes",
                "freshness window must be at least one minute",
            ));
        }
        duration("evidence.run_timeout", &self.evidence.run_timeout)?;

        unit_interval("similarity.threshold", self.similarity.threshold)?;
        unit_interval("similarity.title_signal", self.similarity.title_signal)?;
        unit_interval("similarity.heading_signal", self.similarity.heading_signal)?;
        for pattern in self
            .similarity
            .include
            .iter()
            .chain(&self.similarity.exclude)
        {
            glob::Pattern::new(pattern).map_err(|e| {
                Error::config_invalid("similarity.include", format!("{pattern}: {e}"))
            })?;
        }

        compile(
            "maturity.placeholder_pattern",
            &self.maturity.placeholder_pattern,
        )?;
        duration("maturity.health_timeout", &self.maturity.health_timeout)?;

        let marker = compile("phase.marker_pattern", &self.phase.marker_pattern)?;
        if marker.captures_len() < 2 {
            return Err(Error::config_invalid(
                "phase.marker_pattern",
                "pattern needs a capture group for the phase id",
            ));
        }
        if !self.phase.description_file.contains("{id}") {
            return Err(Error::config_invalid(
                "phase.description_file",
                "file name template must contain {id}",
            ));
        }

        Ok(())
    }

    /// Generates default configuration as a string.
    #[must_use]
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

fn compile(field: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::config_invalid(field, e.to_string()))
}

fn duration(field: &str, value: &str) -> Result<std::time::Duration> {
    humantime::parse_duration(value)
        .map_err(|_| Error::config_invalid(field, format!("Invalid duration: {value}")))
}

fn unit_interval(field: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::config_invalid(
            field,
            format!("{value} must be within [0, 1]"),
        ))
    }
}

/// Where files may live in the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// File names allowed at the repository root.
    pub allowed_root_files: Vec<String>,
    /// Directory names allowed at the repository root.
    pub allowed_root_dirs: Vec<String>,
    /// Directories never scanned.
    pub ignore_dirs: Vec<String>,
    /// File-name patterns that must not appear at the root.
    pub forbidden: Vec<ForbiddenRule>,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            allowed_root_files: strings(&[
                "README.md",
                "CHANGELOG.md",
                "CONTRIBUTING.md",
                "CODE_OF_CONDUCT.md",
                "SECURITY.md",
                "AGENTS.md",
                "LICENSE",
                "LICENSE.md",
                "Cargo.toml",
                "Cargo.lock",
                "package.json",
                "package-lock.json",
                "pyproject.toml",
                "Makefile",
                "Dockerfile",
                "rustfmt.toml",
                ".gitignore",
                ".gitattributes",
                ".editorconfig",
                CONFIG_FILE_NAME,
            ]),
            allowed_root_dirs: strings(&[
                "src",
                "tests",
                "benches",
                "docs",
                "content",
                "scripts",
                "crates",
                "templates",
                ".github",
                ".evidence",
            ]),
            ignore_dirs: strings(&[".git", "target", "node_modules"]),
            forbidden: vec![
                ForbiddenRule::new("SESSION", "docs/sessions"),
                ForbiddenRule::new("DRAFT", "docs/drafts"),
                ForbiddenRule::new("PROGRESS", "docs/progress"),
                ForbiddenRule::new("WIP", "docs/drafts"),
                ForbiddenRule {
                    keyword: "TEMP".to_string(),
                    pattern: r"(?:^|[-_.])(?:temp|tmp)(?:[-_.]|$)".to_string(),
                    template: "docs/scratch".to_string(),
                },
            ],
        }
    }
}

/// A forbidden root file-name pattern and where such files belong instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForbiddenRule {
    /// Short name of the marker (e.g. `SESSION`).
    pub keyword: String,
    /// Regex matched case-insensitively against the file's base name.
    pub pattern: String,
    /// Directory a matching file should be moved to.
    pub template: String,
}

impl ForbiddenRule {
    /// Creates a rule matching `keyword` as a delimited word in the file name.
    #[must_use]
    pub fn new(keyword: &str, template: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            pattern: format!(
                r"(?:^|[-_.]){}(?:[-_.]|$)",
                regex::escape(&keyword.to_lowercase())
            ),
            template: template.to_string(),
        }
    }
}

/// Evidence recording and verification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceConfig {
    /// Directory (relative to the root) holding evidence artifacts.
    pub dir: String,
    /// Freshness window in minutes.
    pub max_age_minutes: u64,
    /// Well-known test-result files probed when none is given explicitly.
    pub result_probes: Vec<String>,
    /// Timeout for `record --run` commands.
    pub run_timeout: String,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            dir: ".evidence".to_string(),
            max_age_minutes: 10,
            result_probes: strings(&[
                "test-results.json",
                ".test-results.json",
                "target/test-results.json",
                "coverage/test-results.json",
            ]),
            run_timeout: "30m".to_string(),
        }
    }
}

impl EvidenceConfig {
    /// Parsed timeout for `record --run`.
    pub fn run_timeout_duration(&self) -> Result<std::time::Duration> {
        duration("evidence.run_timeout", &self.run_timeout)
    }
}

/// Duplicate documentation detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Combined score at or above which a pair is reported.
    pub threshold: f64,
    /// Title similarity above which the title is named as a reason.
    pub title_signal: f64,
    /// Heading overlap above which the headings are named as a reason.
    pub heading_signal: f64,
    /// Number of keywords kept per document.
    pub keyword_count: usize,
    /// Glob patterns selecting the corpus.
    pub include: Vec<String>,
    /// Glob patterns removed from the corpus.
    pub exclude: Vec<String>,
    /// Corpus size beyond which a performance warning is logged.
    pub max_corpus: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            threshold: 0.70,
            title_signal: 0.6,
            heading_signal: 0.4,
            keyword_count: 20,
            include: strings(&["*.md", "docs/**/*.md"]),
            exclude: strings(&["CHANGELOG.md"]),
            max_corpus: 500,
        }
    }
}

/// Content maturity heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaturityConfig {
    /// Directories holding content units.
    pub content_dirs: Vec<String>,
    /// Word count below which a unit is a stub.
    pub min_words: usize,
    /// Days after which a unit counts as stale.
    pub stale_after_days: i64,
    /// Regex for placeholder text that marks a unit as a stub.
    pub placeholder_pattern: String,
    /// External content-health validator command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_command: Option<String>,
    /// Timeout for the health command.
    pub health_timeout: String,
}

impl Default for MaturityConfig {
    fn default() -> Self {
        Self {
            content_dirs: strings(&["content"]),
            min_words: 150,
            stale_after_days: 90,
            placeholder_pattern: r"(?i)\b(?:TODO|TBD|coming soon|placeholder|lorem ipsum)\b"
                .to_string(),
            health_command: None,
            health_timeout: "2m".to_string(),
        }
    }
}

impl MaturityConfig {
    /// Parsed timeout for the health command.
    pub fn health_timeout_duration(&self) -> Result<std::time::Duration> {
        duration("maturity.health_timeout", &self.health_timeout)
    }
}

/// Phase detection and deliverable settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    /// Regex whose first capture group is the phase id.
    pub marker_pattern: String,
    /// Directory holding phase description documents.
    pub description_dir: String,
    /// Description file name; `{id}` is replaced by the phase id.
    pub description_file: String,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            marker_pattern: r"(?i)\bphase[-_ ]?(\d+(?:\.\d+)+)\b".to_string(),
            description_dir: "docs/phases".to_string(),
            description_file: "phase-{id}.md".to_string(),
        }
    }
}

impl PhaseConfig {
    /// Path of the description document for `phase`, relative to the root.
    #[must_use]
    pub fn description_path(&self, phase: &str) -> PathBuf {
        Path::new(&self.description_dir).join(self.description_file.replace("{id}", phase))
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}
