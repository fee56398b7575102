//! Content maturity classification.
//!
//! A content unit is a Markdown file under one of the configured content
//! directories, optionally starting with TOML front matter:
//!
//! ```text
//! +++
//! title = "Getting started"
//! status = "published"
//! phase = "1.2"
//! last_updated = 2024-03-01
//! +++
//! ```
//!
//! Each heuristic is a separate predicate on [`MaturityClassifier`]; the
//! rules in [`MaturityClassifier::findings`] combine them.

use crate::config::MaturityConfig;
use crate::core::error::{Error, Result};
use crate::core::executor::{CommandOutput, ExecuteOptions, Executor};
use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const FRONT_MATTER_FENCE: &str = "+++";

/// Number of output lines itemized for a failing health command.
pub const HEALTH_OUTPUT_LINES: usize = 20;

/// Declared or inferred maturity of a content unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    /// Incomplete content.
    Stub,
    /// Content presented as finished.
    Published,
}

impl ContentStatus {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stub" | "draft" => Some(Self::Stub),
            "published" | "complete" => Some(Self::Published),
            _ => None,
        }
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stub => write!(f, "stub"),
            Self::Published => write!(f, "published"),
        }
    }
}

/// Metadata of one content unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentMeta {
    /// Front-matter title, first `# ` heading, or file stem.
    pub title: String,
    /// Status declared in front matter, if any.
    pub status: Option<ContentStatus>,
    /// Words in the body.
    pub word_count: usize,
    /// Phase the unit belongs to.
    pub phase_id: Option<String>,
    /// Date of the last substantive update.
    pub last_updated: Option<NaiveDate>,
}

/// A parsed content unit.
#[derive(Debug, Clone)]
pub struct ContentUnit {
    /// Path relative to the repository root.
    pub path: PathBuf,
    /// Parsed metadata.
    pub meta: ContentMeta,
    /// Body text after the front matter.
    pub body: String,
}

impl ContentUnit {
    /// Parses a unit; malformed front matter is an error.
    pub fn parse(path: impl Into<PathBuf>, text: &str) -> Result<Self> {
        let path = path.into();
        let (front, body) = split_front_matter(text);

        let table = match front {
            Some(front) => front.parse::<toml::Table>().map_err(|e| {
                Error::config_parse_with_source(
                    format!("front matter in {}", path.display()),
                    e,
                )
            })?,
            None => toml::Table::new(),
        };

        let status = match table.get("status").and_then(toml::Value::as_str) {
            Some(raw) => Some(ContentStatus::parse(raw).ok_or_else(|| {
                Error::config_parse(format!(
                    "front matter in {}: unknown status '{raw}'",
                    path.display()
                ))
            })?),
            None => None,
        };

        let last_updated = match table.get("last_updated") {
            Some(value) => Some(parse_date(value).ok_or_else(|| {
                Error::config_parse(format!(
                    "front matter in {}: last_updated is not a date",
                    path.display()
                ))
            })?),
            None => None,
        };

        let phase_id = table.get("phase").and_then(|v| match v {
            toml::Value::String(s) => Some(s.trim().to_string()),
            toml::Value::Float(f) => Some(f.to_string()),
            toml::Value::Integer(i) => Some(i.to_string()),
            _ => None,
        });

        let title = table
            .get("title")
            .and_then(toml::Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                body.lines()
                    .find_map(|l| l.trim_start().strip_prefix("# "))
                    .map(|t| t.trim().to_string())
            })
            .unwrap_or_else(|| {
                path.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });

        Ok(Self {
            meta: ContentMeta {
                title,
                status,
                word_count: count_words(body),
                phase_id,
                last_updated,
            },
            body: body.to_string(),
            path,
        })
    }
}

fn split_front_matter(text: &str) -> (Option<&str>, &str) {
    let trimmed = text.trim_start_matches('\u{feff}');
    let Some(rest) = trimmed.strip_prefix(FRONT_MATTER_FENCE) else {
        return (None, text);
    };
    let Some(rest) = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n")) else {
        return (None, text);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FRONT_MATTER_FENCE {
            return (Some(&rest[..offset]), &rest[offset + line.len()..]);
        }
        offset += line.len();
    }
    (None, text)
}

fn parse_date(value: &toml::Value) -> Option<NaiveDate> {
    match value {
        toml::Value::Datetime(dt) => {
            let date = dt.date?;
            NaiveDate::from_ymd_opt(
                i32::from(date.year),
                u32::from(date.month),
                u32::from(date.day),
            )
        },
        toml::Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
        _ => None,
    }
}

fn count_words(body: &str) -> usize {
    let mut in_fence = false;
    body.lines()
        .filter(|line| {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                return false;
            }
            !in_fence
        })
        .flat_map(str::split_whitespace)
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .count()
}

/// A unit with its classification.
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    /// Unit path, relative to the root.
    pub path: PathBuf,
    /// Parsed metadata.
    pub meta: ContentMeta,
    /// Whether the unit is a stub.
    pub stub: bool,
    /// Whether the unit is stale.
    pub stale: bool,
    /// Why the unit counts as a stub.
    pub signals: Vec<String>,
}

impl Classification {
    /// Effective status after classification.
    #[must_use]
    pub fn status(&self) -> ContentStatus {
        if self.stub {
            ContentStatus::Stub
        } else {
            ContentStatus::Published
        }
    }
}

/// Maturity rule a unit broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaturityRule {
    /// Declared published but classifies as a stub.
    PublishedStub,
    /// A stub that has not been updated in too long.
    StaleStub,
    /// Belongs to the active phase but is still a stub.
    PhaseStub,
    /// Front matter could not be read.
    InvalidMetadata,
}

/// A maturity rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaturityFinding {
    /// Unit path.
    pub path: PathBuf,
    /// Rule broken.
    pub rule: MaturityRule,
    /// Human-readable explanation.
    pub message: String,
}

impl fmt::Display for MaturityFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Result of classifying every content unit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MaturityReport {
    /// Every unit that could be parsed, in path order.
    pub units: Vec<Classification>,
    /// Rule violations.
    pub findings: Vec<MaturityFinding>,
}

impl MaturityReport {
    /// Whether no rule was broken.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Heuristic stub/staleness classifier.
#[derive(Debug, Clone)]
pub struct MaturityClassifier {
    config: MaturityConfig,
    placeholder: Regex,
}

impl MaturityClassifier {
    /// Compiles the classifier from configuration.
    pub fn new(config: &MaturityConfig) -> Result<Self> {
        let placeholder = Regex::new(&config.placeholder_pattern)
            .map_err(|e| Error::config_invalid("maturity.placeholder_pattern", e.to_string()))?;
        Ok(Self {
            config: config.clone(),
            placeholder,
        })
    }

    /// Fewer words than the configured minimum.
    #[must_use]
    pub fn below_word_minimum(&self, meta: &ContentMeta) -> bool {
        meta.word_count < self.config.min_words
    }

    /// Body contains placeholder text such as TODO or "coming soon".
    #[must_use]
    pub fn has_placeholder_markers(&self, body: &str) -> bool {
        self.placeholder.is_match(body)
    }

    /// Declared a stub, too short, or carrying placeholders.
    #[must_use]
    pub fn is_stub(&self, unit: &ContentUnit) -> bool {
        unit.meta.status == Some(ContentStatus::Stub)
            || self.below_word_minimum(&unit.meta)
            || self.has_placeholder_markers(&unit.body)
    }

    /// Last updated more than `stale_after_days` before `today`.
    /// Units without a date are never stale.
    #[must_use]
    pub fn is_stale(&self, meta: &ContentMeta, today: NaiveDate) -> bool {
        meta.last_updated
            .is_some_and(|updated| (today - updated).num_days() > self.config.stale_after_days)
    }

    /// Classifies one unit.
    #[must_use]
    pub fn classify(&self, unit: &ContentUnit, today: NaiveDate) -> Classification {
        let mut signals = Vec::new();
        if unit.meta.status == Some(ContentStatus::Stub) {
            signals.push("declared stub".to_string());
        }
        if self.below_word_minimum(&unit.meta) {
            signals.push(format!(
                "{} words, below the {} word minimum",
                unit.meta.word_count, self.config.min_words
            ));
        }
        if self.has_placeholder_markers(&unit.body) {
            signals.push("contains placeholder text".to_string());
        }

        Classification {
            path: unit.path.clone(),
            meta: unit.meta.clone(),
            stub: self.is_stub(unit),
            stale: self.is_stale(&unit.meta, today),
            signals,
        }
    }

    /// Applies the maturity rules to a classified unit.
    #[must_use]
    pub fn findings(
        &self,
        unit: &Classification,
        active_phase: Option<&str>,
    ) -> Vec<MaturityFinding> {
        let mut findings = Vec::new();
        if !unit.stub {
            return findings;
        }
        let why = unit.signals.join("; ");

        if unit.meta.status == Some(ContentStatus::Published) {
            findings.push(MaturityFinding {
                path: unit.path.clone(),
                rule: MaturityRule::PublishedStub,
                message: format!("marked published but reads as a stub ({why})"),
            });
        }
        if unit.stale {
            let since = unit
                .meta
                .last_updated
                .map(|d| d.to_string())
                .unwrap_or_default();
            findings.push(MaturityFinding {
                path: unit.path.clone(),
                rule: MaturityRule::StaleStub,
                message: format!(
                    "stub not updated since {since} (limit {} days)",
                    self.config.stale_after_days
                ),
            });
        }
        if let Some(phase) = active_phase {
            if unit.meta.phase_id.as_deref() == Some(phase) {
                findings.push(MaturityFinding {
                    path: unit.path.clone(),
                    rule: MaturityRule::PhaseStub,
                    message: format!("belongs to phase {phase} but is still a stub ({why})"),
                });
            }
        }
        findings
    }

    /// Lists content files under the configured directories, relative to `root`.
    #[must_use]
    pub fn discover(&self, root: &Path) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for dir in &self.config.content_dirs {
            let base = root.join(dir);
            if !base.is_dir() {
                tracing::debug!(dir = %base.display(), "content directory absent");
                continue;
            }
            for entry in WalkDir::new(&base).sort_by_file_name() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping unreadable content entry");
                        continue;
                    },
                };
                let path = entry.path();
                let is_markdown = path.extension().is_some_and(|ext| ext == "md");
                if entry.file_type().is_file() && is_markdown {
                    if let Ok(relative) = path.strip_prefix(root) {
                        paths.push(relative.to_path_buf());
                    }
                }
            }
        }
        paths
    }

    /// Classifies every content unit under `root` and applies the rules.
    pub fn check(
        &self,
        root: &Path,
        active_phase: Option<&str>,
        today: NaiveDate,
    ) -> Result<MaturityReport> {
        let mut report = MaturityReport::default();

        for relative in self.discover(root) {
            let full = root.join(&relative);
            let text = std::fs::read_to_string(&full)
                .map_err(|e| Error::io(format!("read {}", full.display()), e))?;

            let unit = match ContentUnit::parse(&relative, &text) {
                Ok(unit) => unit,
                Err(e) => {
                    report.findings.push(MaturityFinding {
                        path: relative,
                        rule: MaturityRule::InvalidMetadata,
                        message: e.to_string(),
                    });
                    continue;
                },
            };

            let classified = self.classify(&unit, today);
            report.findings.extend(self.findings(&classified, active_phase));
            report.units.push(classified);
        }

        tracing::debug!(
            units = report.units.len(),
            findings = report.findings.len(),
            "classified content"
        );
        Ok(report)
    }

    /// Runs the external content-health command, if one is configured.
    pub async fn run_health(
        &self,
        root: &Path,
        executor: &Executor,
    ) -> Result<Option<CommandOutput>> {
        let Some(ref command) = self.config.health_command else {
            return Ok(None);
        };
        let timeout = self.config.health_timeout_duration()?;
        let output = executor
            .execute(command, ExecuteOptions::default().cwd(root).timeout(timeout))
            .await?;
        if !output.success() {
            tracing::warn!(command, exit_code = output.exit_code, "content health check failed");
        }
        Ok(Some(output))
    }
}

/// Formats a date as `YYYY-MM-DD` for tables.
#[must_use]
pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map_or_else(|| "-".to_string(), |d| d.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    fn classifier() -> MaturityClassifier {
        MaturityClassifier::new(&MaturityConfig::default()).expect("classifier")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn words(n: usize) -> String {
        vec!["content"; n].join(" ")
    }

    fn unit(front: &str, body: &str) -> ContentUnit {
        let text = if front.is_empty() {
            body.to_string()
        } else {
            format!("+++\n{front}\n+++\n{body}")
        };
        ContentUnit::parse("content/guide.md", &text).expect("parse")
    }

    #[test]
    fn test_parse_front_matter() {
        let unit = unit(
            "title = \"Guide\"\nstatus = \"published\"\nphase = \"1.2\"\nlast_updated = 2024-03-01",
            "# Ignored heading\n\nSome words here.\n",
        );
        assert_eq!(unit.meta.title, "Guide");
        assert_eq!(unit.meta.status, Some(ContentStatus::Published));
        assert_eq!(unit.meta.phase_id.as_deref(), Some("1.2"));
        assert_eq!(unit.meta.last_updated, Some(date(2024, 3, 1)));
        assert_eq!(unit.meta.word_count, 5);
    }

    #[test]
    fn test_parse_string_date_and_heading_title() {
        let unit = unit("last_updated = \"2023-12-31\"", "# From Heading\nbody\n");
        assert_eq!(unit.meta.title, "From Heading");
        assert_eq!(unit.meta.last_updated, Some(date(2023, 12, 31)));
        assert_eq!(unit.meta.status, None);
    }

    #[test]
    fn test_parse_without_front_matter_uses_stem() {
        let unit = unit("", "just text");
        assert_eq!(unit.meta.title, "guide");
        assert_eq!(unit.meta.word_count, 2);
    }

    #[rstest]
    #[case("status = \"finished-ish\"")]
    #[case("last_updated = \"yesterday\"")]
    #[case("title = ")]
    fn test_invalid_front_matter(#[case] front: &str) {
        let text = format!("+++\n{front}\n+++\nbody");
        assert!(ContentUnit::parse("content/x.md", &text).is_err());
    }

    #[test]
    fn test_code_blocks_do_not_count_as_words() {
        let unit = unit("", "one two\n```\nlet three = four;\n```\nfive\n");
        assert_eq!(unit.meta.word_count, 3);
    }

    #[test]
    fn test_below_word_minimum() {
        let c = classifier();
        assert!(c.below_word_minimum(&unit("", &words(149)).meta));
        assert!(!c.below_word_minimum(&unit("", &words(150)).meta));
    }

    #[rstest]
    #[case("This section is TODO.", true)]
    #[case("Coming soon: more examples", true)]
    #[case("tbd", true)]
    #[case("A todolist app", false)]
    #[case("Finished prose.", false)]
    fn test_has_placeholder_markers(#[case] body: &str, #[case] expected: bool) {
        assert_eq!(classifier().has_placeholder_markers(body), expected);
    }

    #[test]
    fn test_is_stub() {
        let c = classifier();
        assert!(c.is_stub(&unit("status = \"stub\"", &words(500))));
        assert!(c.is_stub(&unit("", &words(10))));
        assert!(c.is_stub(&unit("", &format!("{} TODO", words(300)))));
        assert!(!c.is_stub(&unit("", &words(300))));
    }

    #[test]
    fn test_is_stale() {
        let c = classifier();
        let today = date(2024, 6, 1);
        assert!(c.is_stale(&unit("last_updated = 2024-01-01", "").meta, today));
        assert!(!c.is_stale(&unit("last_updated = 2024-05-01", "").meta, today));
        assert!(!c.is_stale(&unit("", "").meta, today));
        assert!(!c.is_stale(&unit("last_updated = 2024-07-01", "").meta, today));
    }

    #[test]
    fn test_published_stub_is_a_finding() {
        let c = classifier();
        let classified = c.classify(&unit("status = \"published\"", &words(20)), date(2024, 6, 1));
        let findings = c.findings(&classified, None);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, MaturityRule::PublishedStub);
    }

    #[test]
    fn test_stale_stub_is_a_finding() {
        let c = classifier();
        let classified = c.classify(
            &unit("status = \"stub\"\nlast_updated = 2023-01-01", ""),
            date(2024, 6, 1),
        );
        let rules: Vec<_> = c.findings(&classified, None).iter().map(|f| f.rule).collect();
        assert_eq!(rules, vec![MaturityRule::StaleStub]);
    }

    #[test]
    fn test_phase_stub_only_for_active_phase() {
        let c = classifier();
        let classified = c.classify(&unit("phase = \"1.2\"", &words(5)), date(2024, 6, 1));
        assert!(c.findings(&classified, None).is_empty());
        assert!(c.findings(&classified, Some("2.0")).is_empty());
        let findings = c.findings(&classified, Some("1.2"));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, MaturityRule::PhaseStub);
    }

    #[test]
    fn test_mature_unit_has_no_findings() {
        let c = classifier();
        let classified = c.classify(
            &unit("status = \"published\"\nphase = \"1.2\"", &words(400)),
            date(2024, 6, 1),
        );
        assert_eq!(classified.status(), ContentStatus::Published);
        assert!(c.findings(&classified, Some("1.2")).is_empty());
    }

    #[test]
    fn test_check_walks_content_dirs() {
        let temp = TempDir::new().expect("temp");
        let content = temp.path().join("content/guides");
        std::fs::create_dir_all(&content).expect("mkdir");
        std::fs::write(
            content.join("intro.md"),
            format!("+++\nstatus = \"published\"\n+++\n{}", words(200)),
        )
        .expect("write");
        std::fs::write(
            content.join("advanced.md"),
            "+++\nstatus = \"published\"\n+++\nComing soon.",
        )
        .expect("write");
        std::fs::write(content.join("broken.md"), "+++\nstatus = 3 =\n+++\n").expect("write");
        std::fs::write(content.join("notes.txt"), "ignored").expect("write");

        let report = classifier()
            .check(temp.path(), None, date(2024, 6, 1))
            .expect("check");
        assert_eq!(report.units.len(), 2);
        assert!(!report.passed());

        let rules: Vec<_> = report.findings.iter().map(|f| f.rule).collect();
        assert_eq!(
            rules,
            vec![MaturityRule::PublishedStub, MaturityRule::InvalidMetadata]
        );
        assert_eq!(
            report.findings[0].path,
            PathBuf::from("content/guides/advanced.md")
        );
    }

    #[test]
    fn test_check_without_content_dir_passes() {
        let temp = TempDir::new().expect("temp");
        let report = classifier()
            .check(temp.path(), Some("1.0"), date(2024, 6, 1))
            .expect("check");
        assert!(report.passed());
        assert!(report.units.is_empty());
    }

    #[tokio::test]
    async fn test_health_command_not_configured() {
        let temp = TempDir::new().expect("temp");
        let output = classifier()
            .run_health(temp.path(), &Executor::new())
            .await
            .expect("health");
        assert!(output.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_health_command_failure_is_reported() {
        let temp = TempDir::new().expect("temp");
        let config = MaturityConfig {
            health_command: Some("echo 'broken link in intro.md'; exit 3".to_string()),
            ..MaturityConfig::default()
        };
        let output = MaturityClassifier::new(&config)
            .expect("classifier")
            .run_health(temp.path(), &Executor::new())
            .await
            .expect("health")
            .expect("configured");
        assert!(!output.success());
        assert_eq!(output.tail_lines(HEALTH_OUTPUT_LINES), vec!["broken link in intro.md"]);
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(Some(date(2024, 3, 1))), "2024-03-01");
        assert_eq!(format_date(None), "-");
    }
}
