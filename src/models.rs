//! Data models passed between the pipeline stages.
//!
//! - [`RawPage`]: fetched HTML, borrowed by the extractor
//! - [`CandidateArticle`]: extracted but not yet validated
//! - [`Article`]: validated, deduplicated, ready for delivery
//! - [`GroupBucket`] and [`Digest`]: the grouped output of one run
//!
//! Output types serialise with camelCase field names, the shape the
//! downstream WhatsApp/email senders read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// An HTML document as delivered by the fetcher.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub url: String,
    pub html: String,
    pub fetched_at: DateTime<Utc>,
}

impl RawPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            fetched_at: Utc::now(),
        }
    }
}

/// Which producer yielded an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractedBy {
    /// Selector tables plus heuristics.
    Traditional,
    /// Precomputed output of an AI extraction call.
    Ai,
    /// An RSS item.
    Rss,
    /// AI title with traditionally extracted body, or the reverse.
    Hybrid,
    /// Whole-document paragraph scan after every selector missed.
    Fallback,
}

impl fmt::Display for ExtractedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtractedBy::Traditional => "traditional",
            ExtractedBy::Ai => "ai",
            ExtractedBy::Rss => "rss",
            ExtractedBy::Hybrid => "hybrid",
            ExtractedBy::Fallback => "fallback",
        };
        f.write_str(name)
    }
}

/// An extracted title/content pair awaiting validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateArticle {
    pub title: String,
    pub content: String,
    /// Deduplicated text before merging and truncation, when available.
    pub raw_content: Option<String>,
    pub url: String,
    /// RFC 3339 when the source date could be parsed, raw otherwise.
    pub publish_date: Option<String>,
}

/// A validated, unique article.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub title: String,
    pub url: String,
    pub content: String,
    pub summary: String,
    pub site: String,
    pub group: String,
    pub publish_date: Option<String>,
    pub extracted_by: ExtractedBy,
}

impl Article {
    /// Host of the article URL without a leading `www.`.
    ///
    /// For example: `"https://www.straitstimes.com/singapore/x"` -> `"straitstimes.com"`
    pub fn host(&self) -> Option<String> {
        let parsed = url::Url::parse(&self.url).ok()?;
        let host = parsed.host_str()?;
        Some(host.trim_start_matches("www.").to_string())
    }
}

/// Articles of one group, in discovery order.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupBucket {
    pub group: String,
    pub articles: Vec<Article>,
    pub sites: BTreeSet<String>,
}

impl GroupBucket {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            articles: Vec::new(),
            sites: BTreeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub(crate) fn push(&mut self, article: Article) {
        self.sites.insert(article.site.clone());
        self.articles.push(article);
    }
}

/// Counters collected over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub pages: usize,
    pub extraction_failures: usize,
    /// Rejection count per reason kind.
    pub rejections: BTreeMap<String, usize>,
    pub keyword_filtered: usize,
    pub duplicates: usize,
    pub over_cap: usize,
    pub accepted: usize,
}

/// Grouped output of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Digest {
    /// Buckets in the order their group was first seen.
    pub groups: Vec<GroupBucket>,
    pub stats: RunStats,
}

impl Digest {
    pub fn group(&self, name: &str) -> Option<&GroupBucket> {
        self.groups.iter().find(|b| b.group == name)
    }

    pub fn article_count(&self) -> usize {
        self.groups.iter().map(GroupBucket::len).sum()
    }

    pub fn articles(&self) -> impl Iterator<Item = &Article> {
        self.groups.iter().flat_map(|b| b.articles.iter())
    }

    /// Group name to articles, the plain mapping view of the digest.
    pub fn to_map(&self) -> BTreeMap<String, Vec<Article>> {
        self.groups
            .iter()
            .map(|b| (b.group.clone(), b.articles.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(url: &str, site: &str) -> Article {
        Article {
            title: "Test Article".to_string(),
            url: url.to_string(),
            content: "Content.".to_string(),
            summary: "Summary.".to_string(),
            site: site.to_string(),
            group: "News".to_string(),
            publish_date: None,
            extracted_by: ExtractedBy::Traditional,
        }
    }

    #[test]
    fn test_article_serializes_camel_case() {
        let json = serde_json::to_string(&article("https://example.com/a", "example")).unwrap();
        assert!(json.contains("\"extractedBy\":\"traditional\""));
        assert!(json.contains("\"publishDate\":null"));
    }

    #[test]
    fn test_extracted_by_round_trips_lowercase() {
        let parsed: ExtractedBy = serde_json::from_str("\"rss\"").unwrap();
        assert_eq!(parsed, ExtractedBy::Rss);
        assert_eq!(ExtractedBy::Fallback.to_string(), "fallback");
    }

    #[test]
    fn test_host_strips_www() {
        let a = article("https://www.straitstimes.com/singapore/story", "st");
        assert_eq!(a.host(), Some("straitstimes.com".to_string()));
        assert_eq!(article("not a url", "x").host(), None);
    }

    #[test]
    fn test_bucket_tracks_sites() {
        let mut bucket = GroupBucket::new("News");
        bucket.push(article("https://a.sg/1", "a"));
        bucket.push(article("https://b.sg/1", "b"));
        bucket.push(article("https://a.sg/2", "a"));
        assert_eq!(bucket.len(), 3);
        assert_eq!(bucket.sites.len(), 2);
    }

    #[test]
    fn test_digest_map_view() {
        let mut bucket = GroupBucket::new("Economy");
        bucket.push(article("https://a.sg/1", "a"));
        let digest = Digest {
            groups: vec![bucket],
            stats: RunStats::default(),
        };
        let map = digest.to_map();
        assert_eq!(map["Economy"].len(), 1);
        assert_eq!(digest.article_count(), 1);
        assert!(digest.group("News").is_none());
    }
}
