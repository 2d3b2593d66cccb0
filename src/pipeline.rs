//! Page to digest orchestration.
//!
//! The work is split in two halves:
//!
//! - [`Pipeline`] is immutable and `Send + Sync`. [`Pipeline::process_page`]
//!   resolves the site, runs the candidate sources in order, validates and
//!   keyword-filters. Call it from as many threads as you like.
//! - [`DigestBuilder`] owns the [`DeduplicationIndex`] and the group buckets.
//!   Every outcome goes through [`DigestBuilder::record`] one at a time, so
//!   the duplicate check and the insert can never interleave.
//!
//! [`Pipeline::run`] wires both halves together for the single-threaded case.

use crate::classify::MenuTextClassifier;
use crate::config::{KeywordMiss, PipelineConfig};
use crate::dedup::{ArticleDeduplicator, DeduplicationIndex, DuplicateReason};
use crate::error::ConfigError;
use crate::extract::{ContentExtractor, SiteProfile};
use crate::models::{Article, CandidateArticle, Digest, ExtractedBy, GroupBucket, RawPage, RunStats};
use crate::text::{normalize_whitespace, safe_truncate};
use crate::validate::{ArticleValidator, Rejection, Verdict};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Site name used for pages whose host matches no configured site.
const UNKNOWN_SITE: &str = "unknown";

/// A candidate together with the producer that made it.
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced {
    pub candidate: CandidateArticle,
    pub extracted_by: ExtractedBy,
}

/// One way of turning a page into a candidate.
///
/// Sources are tried in order; the first candidate that passes validation
/// wins, so cheaper or more trusted sources go first.
pub trait CandidateSource: Send + Sync {
    /// Label used in logs.
    fn name(&self) -> &str;

    fn produce(&self, page: &RawPage, profile: &SiteProfile) -> Option<Sourced>;
}

/// Selector tables with the paragraph-scan fallback.
#[derive(Debug, Clone, Default)]
pub struct TraditionalSource {
    extractor: ContentExtractor,
}

impl TraditionalSource {
    pub fn new(extractor: ContentExtractor) -> Self {
        Self { extractor }
    }
}

impl CandidateSource for TraditionalSource {
    fn name(&self) -> &str {
        "traditional"
    }

    fn produce(&self, page: &RawPage, profile: &SiteProfile) -> Option<Sourced> {
        let extraction = self.extractor.extract_html(&page.url, &page.html, profile)?;
        Some(Sourced {
            candidate: extraction.candidate,
            extracted_by: extraction.method,
        })
    }
}

/// Title and body produced by an external AI extraction call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AiExtraction {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub publish_date: Option<String>,
}

/// AI results computed ahead of time, looked up by page URL.
///
/// Their output is not trusted any more than the extractor's: it goes
/// through the same validator, keyword filter and deduplicator.
#[derive(Debug, Clone, Default)]
pub struct PrecomputedSource {
    results: HashMap<String, AiExtraction>,
    content_max_len: usize,
}

impl PrecomputedSource {
    pub fn new(results: HashMap<String, AiExtraction>, content_max_len: usize) -> Self {
        Self {
            results,
            content_max_len,
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl CandidateSource for PrecomputedSource {
    fn name(&self) -> &str {
        "precomputed-ai"
    }

    fn produce(&self, page: &RawPage, _profile: &SiteProfile) -> Option<Sourced> {
        let result = self.results.get(&page.url)?;
        let content = normalize_whitespace(&result.content);
        Some(Sourced {
            candidate: CandidateArticle {
                title: normalize_whitespace(&result.title),
                content: safe_truncate(&content, self.content_max_len),
                raw_content: Some(content),
                url: page.url.clone(),
                publish_date: result.publish_date.clone(),
            },
            extracted_by: ExtractedBy::Ai,
        })
    }
}

/// Produces the short summary stored on each [`Article`].
pub trait Summarizer: Send + Sync {
    fn summarize(&self, title: &str, content: &str) -> String;
}

/// Lead-paragraph summary: the content cut to `max_len` chars.
#[derive(Debug, Clone, Copy)]
pub struct LeadSummarizer {
    max_len: usize,
}

impl LeadSummarizer {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }
}

impl Default for LeadSummarizer {
    fn default() -> Self {
        Self::new(300)
    }
}

impl Summarizer for LeadSummarizer {
    fn summarize(&self, _title: &str, content: &str) -> String {
        safe_truncate(content, self.max_len)
    }
}

/// What [`Pipeline::process_page`] made of one input.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// Validated and filtered; ready for deduplication.
    Ready(Article),
    /// No source produced a candidate (blank or unparseable page).
    NoCandidate,
    /// Every candidate failed validation; carries the last reason.
    Rejected(Rejection),
    Filtered(KeywordMiss),
}

/// What [`DigestBuilder`] did with a ready article.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Accepted,
    Duplicate(DuplicateReason),
    GroupFull,
}

pub struct Pipeline {
    config: PipelineConfig,
    profiles: Vec<SiteProfile>,
    default_profile: SiteProfile,
    validator: ArticleValidator,
    sources: Vec<Box<dyn CandidateSource>>,
    summarizer: Box<dyn Summarizer>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("profiles", &self.profiles.len())
            .field(
                "sources",
                &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Pipeline {
    /// Validate `config` and compile every site table.
    ///
    /// The only source installed is the selector extractor; add more with
    /// [`with_source`](Self::with_source).
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let profiles = config
            .sites
            .iter()
            .map(|site| {
                if let Some(pattern) = &site.link_pattern {
                    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                        site: site.name.clone(),
                        pattern: pattern.clone(),
                        source,
                    })?;
                }
                SiteProfile::from_site(site, &config.default_group)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let default_profile = SiteProfile::compile(
            UNKNOWN_SITE,
            &[],
            &config.default_group,
            &config.default_selectors,
        )?;

        let classifier = MenuTextClassifier::new(&config.vocabulary, config.classifier.clone());
        let validator =
            ArticleValidator::new(classifier.clone(), &config.vocabulary, config.validator.clone());
        let extractor = ContentExtractor::new(classifier, config.extractor.clone());
        let summarizer = LeadSummarizer::new(config.extractor.summary_max_len);

        info!(sites = profiles.len(), "Pipeline ready");
        Ok(Self {
            config,
            profiles,
            default_profile,
            validator,
            sources: vec![Box::new(TraditionalSource::new(extractor))],
            summarizer: Box::new(summarizer),
        })
    }

    /// Append a source after the existing ones.
    pub fn with_source(mut self, source: impl CandidateSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn with_summarizer(mut self, summarizer: impl Summarizer + 'static) -> Self {
        self.summarizer = Box::new(summarizer);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn profiles(&self) -> &[SiteProfile] {
        &self.profiles
    }

    /// Profile whose domains cover the URL's host, or the default profile.
    pub fn profile_for(&self, url: &str) -> &SiteProfile {
        url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .and_then(|host| self.profiles.iter().find(|p| p.matches_host(&host)))
            .unwrap_or(&self.default_profile)
    }

    /// Fresh builder seeded with `index`, using this pipeline's cap and
    /// dedup thresholds.
    pub fn builder(&self, index: DeduplicationIndex) -> DigestBuilder {
        DigestBuilder::new(
            ArticleDeduplicator::new(index, self.config.dedup.clone()),
            self.config.max_articles_per_group,
        )
    }

    /// Process every page in order and return the digest.
    pub fn run<'a, I>(&self, pages: I) -> Digest
    where
        I: IntoIterator<Item = &'a RawPage>,
    {
        let mut builder = self.builder(DeduplicationIndex::new());
        for page in pages {
            builder.record(self.process_page(page));
        }
        builder.finish()
    }

    /// Extract, validate and keyword-filter one page.
    #[instrument(level = "debug", skip_all, fields(url = %page.url))]
    pub fn process_page(&self, page: &RawPage) -> PageOutcome {
        let profile = self.profile_for(&page.url);
        let mut last_rejection = None;

        for source in &self.sources {
            let Some(sourced) = source.produce(page, profile) else {
                debug!(source = source.name(), "No candidate");
                continue;
            };
            match self.validator.validate(&sourced.candidate) {
                Verdict::Accepted => return self.finish(sourced, profile),
                Verdict::Rejected(reason) => {
                    debug!(source = source.name(), %reason, "Candidate rejected");
                    last_rejection = Some(reason);
                }
            }
        }

        match last_rejection {
            Some(reason) => PageOutcome::Rejected(reason),
            None => PageOutcome::NoCandidate,
        }
    }

    /// Validate and filter a candidate that did not come from a page, such
    /// as a feed item.
    pub fn screen_candidate(&self, candidate: CandidateArticle, extracted_by: ExtractedBy) -> PageOutcome {
        match self.validator.validate(&candidate) {
            Verdict::Accepted => {
                let profile = self.profile_for(&candidate.url);
                self.finish(
                    Sourced {
                        candidate,
                        extracted_by,
                    },
                    profile,
                )
            }
            Verdict::Rejected(reason) => PageOutcome::Rejected(reason),
        }
    }

    /// Screen a candidate and hand the result straight to `builder`.
    pub fn offer_candidate(
        &self,
        builder: &mut DigestBuilder,
        candidate: CandidateArticle,
        extracted_by: ExtractedBy,
    ) -> Option<Admission> {
        builder.record(self.screen_candidate(candidate, extracted_by))
    }

    fn finish(&self, sourced: Sourced, profile: &SiteProfile) -> PageOutcome {
        let Sourced {
            candidate,
            extracted_by,
        } = sourced;

        if let Err(miss) = self.config.keywords.check(&candidate.title, &candidate.content) {
            debug!(url = %candidate.url, ?miss, "Keyword filter");
            return PageOutcome::Filtered(miss);
        }

        let site = if profile.name == UNKNOWN_SITE {
            url::Url::parse(&candidate.url)
                .ok()
                .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
                .unwrap_or_else(|| UNKNOWN_SITE.to_string())
        } else {
            profile.name.clone()
        };
        let summary = self.summarizer.summarize(&candidate.title, &candidate.content);

        PageOutcome::Ready(Article {
            title: candidate.title.trim().to_string(),
            url: candidate.url,
            content: candidate.content,
            summary,
            site,
            group: profile.group.clone(),
            publish_date: candidate.publish_date,
            extracted_by,
        })
    }
}

/// Serialized half of a run: group caps, deduplication and counters.
#[derive(Debug)]
pub struct DigestBuilder {
    deduplicator: ArticleDeduplicator,
    max_per_group: usize,
    /// Accepted articles in acceptance order, across all groups.
    accepted: Vec<Article>,
    group_counts: HashMap<String, usize>,
    stats: RunStats,
}

impl DigestBuilder {
    pub fn new(deduplicator: ArticleDeduplicator, max_per_group: usize) -> Self {
        Self {
            deduplicator,
            max_per_group,
            accepted: Vec::new(),
            group_counts: HashMap::new(),
            stats: RunStats::default(),
        }
    }

    /// Count an outcome and, when it carries an article, offer it.
    pub fn record(&mut self, outcome: PageOutcome) -> Option<Admission> {
        self.stats.pages += 1;
        match outcome {
            PageOutcome::Ready(article) => Some(self.offer(article)),
            PageOutcome::NoCandidate => {
                self.stats.extraction_failures += 1;
                None
            }
            PageOutcome::Rejected(reason) => {
                *self.stats.rejections.entry(reason.kind().to_string()).or_default() += 1;
                None
            }
            PageOutcome::Filtered(_) => {
                self.stats.keyword_filtered += 1;
                None
            }
        }
    }

    /// Cap check, then dedup against everything accepted so far, then append.
    pub fn offer(&mut self, article: Article) -> Admission {
        let in_group = self.group_counts.get(&article.group).copied().unwrap_or(0);
        if in_group >= self.max_per_group {
            debug!(url = %article.url, group = %article.group, "Group full");
            self.stats.over_cap += 1;
            return Admission::GroupFull;
        }

        if let Err(reason) = self.deduplicator.admit(&article, &self.accepted) {
            self.stats.duplicates += 1;
            return Admission::Duplicate(reason);
        }

        debug!(url = %article.url, group = %article.group, by = %article.extracted_by, "Accepted");
        *self.group_counts.entry(article.group.clone()).or_default() += 1;
        self.stats.accepted += 1;
        self.accepted.push(article);
        Admission::Accepted
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn accepted(&self) -> &[Article] {
        &self.accepted
    }

    /// Bucket accepted articles by group, groups in first-seen order.
    pub fn finish(self) -> Digest {
        let mut groups: Vec<GroupBucket> = Vec::new();
        for article in self.accepted {
            match groups.iter_mut().find(|b| b.group == article.group) {
                Some(bucket) => bucket.push(article),
                None => {
                    let mut bucket = GroupBucket::new(article.group.clone());
                    bucket.push(article);
                    groups.push(bucket);
                }
            }
        }
        info!(
            groups = groups.len(),
            accepted = self.stats.accepted,
            duplicates = self.stats.duplicates,
            "Digest built"
        );
        Digest {
            groups,
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KeywordFilter, SiteConfig};

    const STORY: &str = "The Land Transport Authority said on Friday that three new \
        stations will open along the Thomson-East Coast Line next year.";

    fn page(url: &str, title: &str, body: &str) -> RawPage {
        RawPage::new(
            url,
            format!("<html><body><article><h1>{title}</h1><p>{body}</p></article></body></html>"),
        )
    }

    fn config_with_sites() -> PipelineConfig {
        PipelineConfig {
            sites: vec![
                SiteConfig {
                    name: "straitstimes".to_string(),
                    domains: vec!["straitstimes.com".to_string()],
                    group: Some("Singapore".to_string()),
                    ..SiteConfig::default()
                },
                SiteConfig {
                    name: "businesstimes".to_string(),
                    domains: vec!["businesstimes.com.sg".to_string()],
                    group: Some("Economy".to_string()),
                    ..SiteConfig::default()
                },
            ],
            ..PipelineConfig::default()
        }
    }

    fn ready(outcome: PageOutcome) -> Article {
        match outcome {
            PageOutcome::Ready(article) => article,
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn test_pipeline_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Pipeline>();
    }

    #[test]
    fn test_profile_for_matches_host() {
        let pipeline = Pipeline::new(config_with_sites()).unwrap();
        assert_eq!(pipeline.profile_for("https://www.straitstimes.com/singapore/x").name, "straitstimes");
        assert_eq!(pipeline.profile_for("https://www.businesstimes.com.sg/a").group, "Economy");
        assert_eq!(pipeline.profile_for("https://other.sg/a").name, UNKNOWN_SITE);
        assert_eq!(pipeline.profile_for("not a url").name, UNKNOWN_SITE);
    }

    #[test]
    fn test_process_page_builds_article() {
        let pipeline = Pipeline::new(config_with_sites()).unwrap();
        let article = ready(pipeline.process_page(&page(
            "https://www.straitstimes.com/singapore/tel",
            "Three new TEL stations to open next year",
            STORY,
        )));
        assert_eq!(article.site, "straitstimes");
        assert_eq!(article.group, "Singapore");
        assert_eq!(article.extracted_by, ExtractedBy::Traditional);
        assert_eq!(article.content, STORY);
        assert_eq!(article.summary, STORY);
    }

    #[test]
    fn test_unknown_site_uses_host_and_default_group() {
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let article = ready(pipeline.process_page(&page(
            "https://www.mothership.sg/2025/03/tel",
            "Three new TEL stations to open next year",
            STORY,
        )));
        assert_eq!(article.site, "mothership.sg");
        assert_eq!(article.group, "News");
    }

    #[test]
    fn test_blank_page_is_no_candidate() {
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        assert_eq!(
            pipeline.process_page(&RawPage::new("https://a.sg/x", "")),
            PageOutcome::NoCandidate
        );
    }

    #[test]
    fn test_keyword_filter() {
        let config = PipelineConfig {
            keywords: KeywordFilter {
                include: vec![],
                exclude: vec!["horoscope".to_string()],
            },
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::new(config).unwrap();
        let outcome = pipeline.process_page(&page(
            "https://a.sg/x",
            "Your weekly horoscope for the Year of the Snake",
            STORY,
        ));
        assert_eq!(
            outcome,
            PageOutcome::Filtered(KeywordMiss::Excluded("horoscope".to_string()))
        );
    }

    #[test]
    fn test_precomputed_source_rescues_failed_extraction() {
        let mut results = HashMap::new();
        results.insert(
            "https://a.sg/spa".to_string(),
            AiExtraction {
                title: "Three new TEL stations to open next year".to_string(),
                content: STORY.to_string(),
                publish_date: None,
            },
        );
        let pipeline = Pipeline::new(PipelineConfig::default())
            .unwrap()
            .with_source(PrecomputedSource::new(results, 1000));

        // script-rendered shell: nothing for the selector extractor
        let shell = RawPage::new("https://a.sg/spa", "<html><body><div id=\"app\"></div></body></html>");
        let article = ready(pipeline.process_page(&shell));
        assert_eq!(article.extracted_by, ExtractedBy::Ai);
    }

    #[test]
    fn test_precomputed_output_is_validated() {
        let mut results = HashMap::new();
        results.insert(
            "https://a.sg/spa".to_string(),
            AiExtraction {
                title: "Sign Up".to_string(),
                content: STORY.to_string(),
                publish_date: None,
            },
        );
        let pipeline = Pipeline::new(PipelineConfig::default())
            .unwrap()
            .with_source(PrecomputedSource::new(results, 1000));
        let shell = RawPage::new("https://a.sg/spa", "<html><body></body></html>");
        assert_eq!(
            pipeline.process_page(&shell),
            PageOutcome::Rejected(Rejection::BlockedTitle("Sign Up".to_string()))
        );
    }

    #[test]
    fn test_builder_counts_and_caps() {
        let config = PipelineConfig {
            max_articles_per_group: 1,
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::new(config).unwrap();
        let mut builder = pipeline.builder(DeduplicationIndex::new());

        let first = page("https://a.sg/1", "Three new TEL stations to open next year", STORY);
        let second = page(
            "https://a.sg/2",
            "Hawker centres in Tengah to open in 2026",
            "The National Environment Agency said two hawker centres will open in Tengah next year.",
        );
        assert_eq!(builder.record(pipeline.process_page(&first)), Some(Admission::Accepted));
        assert_eq!(builder.record(pipeline.process_page(&second)), Some(Admission::GroupFull));
        assert_eq!(builder.record(PageOutcome::NoCandidate), None);
        assert_eq!(builder.record(PageOutcome::Rejected(Rejection::LandingPage)), None);

        let stats = builder.stats().clone();
        assert_eq!(stats.pages, 4);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.over_cap, 1);
        assert_eq!(stats.extraction_failures, 1);
        assert_eq!(stats.rejections.get("landing_page"), Some(&1));
    }

    #[test]
    fn test_invalid_link_pattern_is_config_error() {
        let config = PipelineConfig {
            sites: vec![SiteConfig {
                name: "broken".to_string(),
                link_pattern: Some("(".to_string()),
                ..SiteConfig::default()
            }],
            ..PipelineConfig::default()
        };
        assert!(matches!(
            Pipeline::new(config),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_lead_summarizer() {
        let s = LeadSummarizer::new(20);
        assert_eq!(s.summarize("t", "Fares rise. Buses slow down today"), "Fares rise.");
    }
}
