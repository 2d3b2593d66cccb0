//! Cross-article duplicate detection.
//!
//! An article is a duplicate when
//! 1. its URL or its content fingerprint was already seen this run, or
//! 2. its title is more than 85% similar to an accepted article's title, or
//! 3. its title is 50-85% similar *and* the first 500 chars of both bodies are
//!    more than 85% similar.
//!
//! Paths 2 and 3 are independent: a near-identical title is enough on its
//! own, while a loosely similar title only counts when the bodies agree.
//!
//! Every candidate is compared with every accepted article, which is
//! quadratic. Group caps keep the accepted set to a few dozen per run.

use crate::config::DedupThresholds;
use crate::models::Article;
use crate::similarity::ratio;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s\u{AC00}-\u{D7A3}]").unwrap());

/// Per-run memory of what has been accepted.
///
/// Build one per run and hand it to [`ArticleDeduplicator::new`]. Seed it with
/// [`DeduplicationIndex::with_seen_urls`] to skip stories sent in earlier runs.
#[derive(Debug, Clone, Default)]
pub struct DeduplicationIndex {
    fingerprints: HashSet<String>,
    urls: HashSet<String>,
}

impl DeduplicationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seen_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fingerprints: HashSet::new(),
            urls: urls.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains_fingerprint(&self, fingerprint: &str) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    /// URLs known to the index, including seeded ones.
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }

    fn record(&mut self, fingerprint: String, url: &str) {
        self.fingerprints.insert(fingerprint);
        if !url.is_empty() {
            self.urls.insert(url.to_string());
        }
    }
}

/// Why an article was judged a duplicate.
#[derive(Debug, Clone, PartialEq)]
pub enum DuplicateReason {
    SeenUrl,
    Fingerprint,
    TitleSimilarity {
        title: f64,
        of: String,
    },
    ContentSimilarity {
        title: f64,
        content: f64,
        of: String,
    },
}

impl DuplicateReason {
    /// Short stable name, used as a counter key.
    pub fn kind(&self) -> &'static str {
        match self {
            DuplicateReason::SeenUrl => "seen_url",
            DuplicateReason::Fingerprint => "fingerprint",
            DuplicateReason::TitleSimilarity { .. } => "title_similarity",
            DuplicateReason::ContentSimilarity { .. } => "content_similarity",
        }
    }
}

impl fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateReason::SeenUrl => write!(f, "url already seen"),
            DuplicateReason::Fingerprint => write!(f, "content fingerprint already seen"),
            DuplicateReason::TitleSimilarity { title, of } => {
                write!(f, "title {title:.2} similar to {of}")
            }
            DuplicateReason::ContentSimilarity { title, content, of } => {
                write!(f, "title {title:.2} / content {content:.2} similar to {of}")
            }
        }
    }
}

/// Fingerprint and similarity based duplicate filter.
#[derive(Debug, Clone)]
pub struct ArticleDeduplicator {
    index: DeduplicationIndex,
    thresholds: DedupThresholds,
}

impl Default for ArticleDeduplicator {
    fn default() -> Self {
        Self::new(DeduplicationIndex::new(), DedupThresholds::default())
    }
}

impl ArticleDeduplicator {
    pub fn new(index: DeduplicationIndex, thresholds: DedupThresholds) -> Self {
        Self { index, thresholds }
    }

    pub fn index(&self) -> &DeduplicationIndex {
        &self.index
    }

    pub fn into_index(self) -> DeduplicationIndex {
        self.index
    }

    /// md5 of the normalised title plus content prefix.
    pub fn fingerprint(&self, article: &Article) -> String {
        let prefix = prefix(&article.content, self.thresholds.prefix_chars);
        let key = normalize_for_match(&format!("{} {}", article.title, prefix));
        format!("{:x}", md5::compute(key.as_bytes()))
    }

    /// `true` when `article` duplicates the index or any of `existing`.
    pub fn is_duplicate(&self, article: &Article, existing: &[Article]) -> bool {
        self.check(article, existing).is_some()
    }

    /// Like [`is_duplicate`](Self::is_duplicate) but says which rule fired.
    pub fn check(&self, article: &Article, existing: &[Article]) -> Option<DuplicateReason> {
        if !article.url.is_empty() && self.index.contains_url(&article.url) {
            return Some(DuplicateReason::SeenUrl);
        }
        if self.index.contains_fingerprint(&self.fingerprint(article)) {
            return Some(DuplicateReason::Fingerprint);
        }

        let t = &self.thresholds;
        let title = normalize_for_match(&article.title);
        let mut body: Option<String> = None;

        for other in existing {
            let title_ratio = ratio(&title, &normalize_for_match(&other.title));
            if title_ratio > t.title_similarity {
                return Some(DuplicateReason::TitleSimilarity {
                    title: title_ratio,
                    of: other.url.clone(),
                });
            }
            if title_ratio > t.title_body_gate {
                let body = body.get_or_insert_with(|| {
                    normalize_for_match(&prefix(&article.content, t.prefix_chars))
                });
                let other_body = normalize_for_match(&prefix(&other.content, t.prefix_chars));
                let content_ratio = ratio(body, &other_body);
                if content_ratio > t.content_similarity {
                    return Some(DuplicateReason::ContentSimilarity {
                        title: title_ratio,
                        content: content_ratio,
                        of: other.url.clone(),
                    });
                }
            }
        }
        None
    }

    /// Check `article` and, when unique, record it in the index.
    ///
    /// The check and the insert happen under one `&mut self`, so a single
    /// deduplicator can never admit the same story twice.
    pub fn admit(&mut self, article: &Article, existing: &[Article]) -> Result<(), DuplicateReason> {
        if let Some(reason) = self.check(article, existing) {
            debug!(url = %article.url, %reason, "Duplicate article");
            return Err(reason);
        }
        let fingerprint = self.fingerprint(article);
        self.index.record(fingerprint, &article.url);
        Ok(())
    }

    /// Drop duplicates from `articles`, keeping the first of each story in order.
    pub fn deduplicate(&mut self, articles: Vec<Article>) -> Vec<Article> {
        let mut kept: Vec<Article> = Vec::with_capacity(articles.len());
        for article in articles {
            if self.admit(&article, &kept).is_ok() {
                kept.push(article);
            }
        }
        kept
    }
}

/// Lowercase, drop punctuation and symbols, collapse whitespace.
pub fn normalize_for_match(text: &str) -> String {
    let lower = text.to_lowercase();
    let stripped = NON_WORD.replace_all(&lower, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn prefix(text: &str, chars: usize) -> String {
    text.chars().take(chars).collect()
}
