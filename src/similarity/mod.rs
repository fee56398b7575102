//! Advisory duplicate-documentation detection.
//!
//! Every pair of documents in the corpus is scored as
//!
//! ```text
//! similarity = 0.5 * title + 0.3 * heading overlap + 0.2 * keyword overlap
//! ```
//!
//! where the title score is a normalized Levenshtein similarity and both
//! overlaps are Jaccard indices. Pairs at or above the threshold are reported
//! with a consolidation suggestion. Nothing here ever fails a gate.
//!
//! Scoring is O(n²·L) in corpus size and title length; a warning is logged
//! for corpora larger than `similarity.max_corpus`.

mod document;

pub use document::Document;

use crate::config::SimilarityConfig;
use crate::core::error::{Error, Result};
use glob::Pattern;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Weight of the title score.
pub const TITLE_WEIGHT: f64 = 0.5;
/// Weight of the heading overlap.
pub const HEADING_WEIGHT: f64 = 0.3;
/// Weight of the keyword overlap.
pub const KEYWORD_WEIGHT: f64 = 0.2;

/// Levenshtein edit distance between two strings, counted in characters.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Title similarity in `[0, 1]`: one minus the edit distance over the
/// longer title's length. Titles are compared case-insensitively.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / longest as f64
}

/// Jaccard index of two sets; zero when both are empty.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn set_overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Sub-scores and combined score of one document pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Scores {
    /// Title similarity.
    pub title: f64,
    /// Heading overlap.
    pub headings: f64,
    /// Keyword overlap.
    pub keywords: f64,
    /// Weighted combination, in `[0, 1]`.
    pub combined: f64,
}

/// Scores two documents. Symmetric in its arguments.
#[must_use]
pub fn similarity(a: &Document, b: &Document) -> Scores {
    let title = title_similarity(&a.title, &b.title);
    let headings = set_overlap(&a.headings, &b.headings);
    let keywords = set_overlap(&a.keywords, &b.keywords);

    // Identical content is a perfect match even when both sets are empty.
    let identical = a.title.trim().to_lowercase() == b.title.trim().to_lowercase()
        && a.headings == b.headings
        && a.keywords == b.keywords;
    let combined = if identical {
        1.0
    } else {
        (TITLE_WEIGHT * title + HEADING_WEIGHT * headings + KEYWORD_WEIGHT * keywords)
            .clamp(0.0, 1.0)
    };

    Scores {
        title,
        headings,
        keywords,
        combined,
    }
}

/// Proposed merge of two overlapping documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Consolidation {
    /// Document to keep.
    pub keep: PathBuf,
    /// Document to merge into `keep` and then delete.
    pub merge_from: PathBuf,
    /// Manual steps, in order.
    pub steps: Vec<String>,
}

impl Consolidation {
    /// Keeps the longer document; equal lengths keep the first path.
    #[must_use]
    pub fn between(a: &Document, b: &Document) -> Self {
        let keep_a = match a.line_count.cmp(&b.line_count) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => a.path <= b.path,
        };
        let (keep, merge) = if keep_a { (a, b) } else { (b, a) };
        let (keep_path, merge_path) = (keep.path.display(), merge.path.display());

        Self {
            steps: vec![
                format!("Review content in {merge_path} that is not covered by {keep_path}"),
                format!("Merge that content into {keep_path}"),
                format!("Delete {merge_path}"),
                format!("Update links that point to {merge_path}"),
            ],
            keep: keep.path.clone(),
            merge_from: merge.path.clone(),
        }
    }
}

/// A flagged pair of documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlap {
    /// First document, in path order.
    pub first: PathBuf,
    /// Second document, in path order.
    pub second: PathBuf,
    /// How similar they are.
    pub scores: Scores,
    /// Which signals drove the match.
    pub reason: String,
    /// What to do about it.
    pub suggestion: Consolidation,
}

impl Overlap {
    /// Combined similarity of the pair.
    #[must_use]
    pub fn similarity(&self) -> f64 {
        self.scores.combined
    }
}

/// Finds overlapping documents under a repository root.
#[derive(Debug, Clone)]
pub struct SimilarityDetector {
    config: SimilarityConfig,
    exclude: Vec<Pattern>,
}

impl SimilarityDetector {
    /// Creates a detector, compiling the exclude patterns.
    pub fn new(config: &SimilarityConfig) -> Result<Self> {
        let exclude = config
            .exclude
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| Error::config_invalid("similarity.exclude", e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            config: config.clone(),
            exclude,
        })
    }

    /// Overrides the reporting threshold, which must lie in `[0, 1]`.
    pub fn with_threshold(mut self, threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::config_invalid(
                "threshold",
                format!("{threshold} is outside [0, 1]"),
            ));
        }
        self.config.threshold = threshold;
        Ok(self)
    }

    /// Threshold in effect.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.config.threshold
    }

    /// Lists corpus files relative to `root`, sorted and de-duplicated.
    pub fn discover(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let base = Pattern::escape(&root.to_string_lossy());
        let mut found = BTreeSet::new();

        for include in &self.config.include {
            let pattern = format!("{base}/{include}");
            let entries = glob::glob(&pattern)
                .map_err(|e| Error::config_invalid("similarity.include", e.to_string()))?;
            for entry in entries {
                let path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping unreadable corpus entry");
                        continue;
                    },
                };
                let Ok(relative) = path.strip_prefix(root) else {
                    continue;
                };
                if path.is_file() && !self.is_excluded(relative) {
                    found.insert(relative.to_path_buf());
                }
            }
        }

        Ok(found.into_iter().collect())
    }

    fn is_excluded(&self, relative: &Path) -> bool {
        let name = relative
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.exclude
            .iter()
            .any(|p| p.matches_path(relative) || p.matches(&name))
    }

    /// Discovers and parses the corpus. Unreadable files are skipped.
    pub fn load_corpus(&self, root: &Path) -> Result<Vec<Document>> {
        let paths = self.discover(root)?;
        if paths.len() > self.config.max_corpus {
            tracing::warn!(
                documents = paths.len(),
                limit = self.config.max_corpus,
                "corpus is large; pairwise comparison grows quadratically"
            );
        }

        let docs = paths
            .iter()
            .filter_map(
                |path| match Document::load(root, path, self.config.keyword_count) {
                    Ok(doc) => Some(doc),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping document");
                        None
                    },
                },
            )
            .collect();
        Ok(docs)
    }

    /// Every pair scoring at or above the threshold, most similar first.
    #[must_use]
    pub fn find_overlaps(&self, docs: &[Document]) -> Vec<Overlap> {
        let mut overlaps = Vec::new();
        for (i, a) in docs.iter().enumerate() {
            for b in &docs[i + 1..] {
                let scores = similarity(a, b);
                if scores.combined < self.config.threshold {
                    continue;
                }
                let (first, second) = if a.path <= b.path { (a, b) } else { (b, a) };
                tracing::debug!(
                    first = %first.path.display(),
                    second = %second.path.display(),
                    similarity = scores.combined,
                    "overlapping documents"
                );
                overlaps.push(Overlap {
                    first: first.path.clone(),
                    second: second.path.clone(),
                    reason: self.reason(&scores),
                    suggestion: Consolidation::between(a, b),
                    scores,
                });
            }
        }

        overlaps.sort_by(|x, y| {
            y.scores
                .combined
                .total_cmp(&x.scores.combined)
                .then_with(|| x.first.cmp(&y.first))
                .then_with(|| x.second.cmp(&y.second))
        });
        overlaps
    }

    /// Names each sub-signal that crossed its own threshold.
    fn reason(&self, scores: &Scores) -> String {
        let mut signals = Vec::new();
        if scores.title > self.config.title_signal {
            signals.push(format!("similar titles ({:.0}%)", scores.title * 100.0));
        }
        if scores.headings > self.config.heading_signal {
            signals.push(format!("shared headings ({:.0}%)", scores.headings * 100.0));
        }
        if signals.is_empty() {
            format!("combined similarity ({:.0}%)", scores.combined * 100.0)
        } else {
            signals.join(", ")
        }
    }
}
