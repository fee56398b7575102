//! Markdown documents as seen by the similarity detector.

use crate::core::error::{Error, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Words too common to say anything about a document's topic.
const STOP_WORDS: &[&str] = &[
    "about", "after", "also", "been", "before", "being", "both", "but", "can", "could", "does",
    "each", "from", "have", "here", "into", "just", "like", "make", "many", "more", "most",
    "much", "must", "only", "other", "over", "same", "should", "some", "such", "than", "that",
    "their", "them", "then", "there", "these", "they", "this", "those", "through", "under",
    "used", "using", "very", "were", "what", "when", "where", "which", "while", "will", "with",
    "without", "would", "your",
];

static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`[^`]*`").expect("static regex"));
static LINK_TARGET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\]\([^)]*\)").expect("static regex"));
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("static regex"));
static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("static regex"));

/// A parsed Markdown document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    /// Path relative to the corpus root.
    pub path: PathBuf,
    /// First `# ` heading, or the file stem.
    pub title: String,
    /// `##` and `###` heading text, case-folded.
    pub headings: BTreeSet<String>,
    /// Most frequent content words, case-folded.
    pub keywords: BTreeSet<String>,
    /// Number of lines in the file.
    pub line_count: usize,
    /// Last modification time, when the filesystem reports one.
    pub modified_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Parses `text` as the document at `path`, keeping `keyword_count` keywords.
    #[must_use]
    pub fn parse(path: impl Into<PathBuf>, text: &str, keyword_count: usize) -> Self {
        let path = path.into();
        let mut title = None;
        let mut headings = BTreeSet::new();
        let mut prose = String::with_capacity(text.len());
        let mut in_fence = false;

        for line in text.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }

            if let Some(rest) = trimmed.strip_prefix("# ") {
                if title.is_none() {
                    title = Some(clean_heading(rest));
                }
            } else if let Some(rest) = trimmed
                .strip_prefix("### ")
                .or_else(|| trimmed.strip_prefix("## "))
            {
                let heading = clean_heading(rest).to_lowercase();
                if !heading.is_empty() {
                    headings.insert(heading);
                }
            }

            prose.push_str(line);
            prose.push('\n');
        }

        let title = title.unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        Self {
            keywords: top_keywords(&prose, keyword_count),
            line_count: text.lines().count(),
            modified_at: None,
            path,
            title,
            headings,
        }
    }

    /// Reads and parses `relative` under `root`.
    pub fn load(root: &Path, relative: &Path, keyword_count: usize) -> Result<Self> {
        let full = root.join(relative);
        let text = std::fs::read_to_string(&full)
            .map_err(|e| Error::io(format!("read {}", full.display()), e))?;
        let mut doc = Self::parse(relative, &text, keyword_count);
        doc.modified_at = std::fs::metadata(&full)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        Ok(doc)
    }
}

fn clean_heading(text: &str) -> String {
    text.trim().trim_end_matches('#').trim().to_string()
}

/// Extracts the `limit` most frequent words of four or more characters,
/// ignoring inline code, link targets, HTML tags and stop words.
fn top_keywords(prose: &str, limit: usize) -> BTreeSet<String> {
    let stripped = INLINE_CODE.replace_all(prose, " ");
    let stripped = LINK_TARGET.replace_all(&stripped, "]");
    let stripped = HTML_TAG.replace_all(&stripped, " ");

    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in WORD.find_iter(&stripped) {
        let word = word.as_str().to_lowercase();
        if word.chars().count() < 4 || STOP_WORDS.contains(&word.as_str()) {
            continue;
        }
        *counts.entry(word).or_default() += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(w, _)| w).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const GUIDE: &str = "\
# Testing Strategy

Testing keeps regressions away. Testing early matters.

## Setup

Install the `cargo-nextest` runner, then read [the docs](https://example.com/testing-docs).

```sh
cargo nextest run --workspace
```

### Execution ###

<details>Run every suite nightly.</details>
";

    #[test]
    fn test_title_and_headings() {
        let doc = Document::parse("docs/testing.md", GUIDE, 20);
        assert_eq!(doc.title, "Testing Strategy");
        assert_eq!(
            doc.headings.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["execution", "setup"]
        );
        assert_eq!(doc.line_count, GUIDE.lines().count());
    }

    #[test]
    fn test_title_falls_back_to_stem() {
        let doc = Document::parse("docs/release-notes.md", "Just prose here.", 20);
        assert_eq!(doc.title, "release-notes");
    }

    #[test]
    fn test_keywords_skip_code_links_and_markup() {
        let doc = Document::parse("docs/testing.md", GUIDE, 20);
        assert!(doc.keywords.contains("testing"));
        assert!(doc.keywords.contains("suite"));
        assert!(!doc.keywords.contains("nextest"));
        assert!(!doc.keywords.contains("workspace"));
        assert!(!doc.keywords.contains("example"));
        assert!(!doc.keywords.contains("details"));
        assert!(!doc.keywords.contains("then"));
    }

    #[test]
    fn test_keyword_limit_prefers_frequent_words() {
        let doc = Document::parse("a.md", "alpha alpha alpha beta beta gamma", 2);
        assert_eq!(
            doc.keywords.into_iter().collect::<Vec<_>>(),
            vec!["alpha".to_string(), "beta".to_string()]
        );
    }

    #[test]
    fn test_headings_inside_fences_are_ignored() {
        let doc = Document::parse("a.md", "# Real\n```\n## Fake\n```\n## Kept\n", 20);
        assert_eq!(doc.headings.len(), 1);
        assert!(doc.headings.contains("kept"));
    }

    #[test]
    fn test_load_sets_modified_at() {
        let temp = tempfile::TempDir::new().expect("temp");
        std::fs::write(temp.path().join("a.md"), "# A\n").expect("write");
        let doc = Document::load(temp.path(), Path::new("a.md"), 20).expect("load");
        assert_eq!(doc.path, PathBuf::from("a.md"));
        assert!(doc.modified_at.is_some());
    }
}
