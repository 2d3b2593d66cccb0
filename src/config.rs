//! Pipeline configuration.
//!
//! Everything that was tuned by hand against live sites lives here rather
//! than in the extraction code: vocabularies, ratio thresholds, per-site
//! selector tables and keyword filters. The whole tree deserialises from YAML
//! and every field has a default, so a config file only needs to list what it
//! overrides.
//!
//! ```yaml
//! max_articles_per_group: 3
//! keywords:
//!   exclude: ["horoscope"]
//! sites:
//!   - name: straitstimes
//!     domains: ["straitstimes.com"]
//!     group: News
//!     selectors:
//!       title: ["h1.headline"]
//!       content: ["div.article-content"]
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, instrument};

/// Root configuration for one pipeline run.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Cap on accepted articles per group bucket.
    pub max_articles_per_group: usize,
    /// Group used for sites that do not name one.
    pub default_group: String,
    pub keywords: KeywordFilter,
    pub vocabulary: Vocabulary,
    pub classifier: ClassifierThresholds,
    pub validator: ValidatorThresholds,
    pub dedup: DedupThresholds,
    pub extractor: ExtractorSettings,
    /// Selectors used for pages whose host matches no configured site.
    pub default_selectors: SelectorConfig,
    pub sites: Vec<SiteConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_articles_per_group: 5,
            default_group: "News".to_string(),
            keywords: KeywordFilter::default(),
            vocabulary: Vocabulary::default(),
            classifier: ClassifierThresholds::default(),
            validator: ValidatorThresholds::default(),
            dedup: DedupThresholds::default(),
            extractor: ExtractorSettings::default(),
            default_selectors: SelectorConfig::default(),
            sites: Vec::new(),
        }
    }
}

impl PipelineConfig {
    /// Read and validate a YAML configuration file.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        debug!(sites = config.sites.len(), "Loaded pipeline config");
        Ok(config)
    }

    /// Reject values that would make the heuristics meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ratios = [
            ("classifier.sentence_menu_ratio", self.classifier.sentence_menu_ratio),
            ("classifier.document_menu_ratio", self.classifier.document_menu_ratio),
            ("classifier.landing_menu_ratio", self.classifier.landing_menu_ratio),
            ("classifier.short_token_ratio", self.classifier.short_token_ratio),
            ("classifier.uppercase_ratio", self.classifier.uppercase_ratio),
            ("dedup.title_similarity", self.dedup.title_similarity),
            ("dedup.title_body_gate", self.dedup.title_body_gate),
            ("dedup.content_similarity", self.dedup.content_similarity),
        ];
        for (name, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        if self.dedup.title_body_gate > self.dedup.title_similarity {
            return Err(ConfigError::InvalidThreshold {
                name: "dedup.title_body_gate",
                value: self.dedup.title_body_gate,
            });
        }
        if self.max_articles_per_group == 0 {
            return Err(ConfigError::InvalidThreshold {
                name: "max_articles_per_group",
                value: 0.0,
            });
        }
        if self.extractor.content_max_len == 0 {
            return Err(ConfigError::InvalidThreshold {
                name: "extractor.content_max_len",
                value: 0.0,
            });
        }
        Ok(())
    }
}

/// One news site: where to find it and how to read it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Short site name attached to every article (`Article::site`).
    pub name: String,
    /// Hosts served by this site; subdomains match too.
    pub domains: Vec<String>,
    /// Group bucket for this site's articles, `default_group` when absent.
    pub group: Option<String>,
    /// Section pages scanned for article links by the fetcher.
    pub listing_urls: Vec<String>,
    /// RSS feeds read in addition to listing pages.
    pub feeds: Vec<String>,
    /// Only links matching this regex are followed from listing pages.
    pub link_pattern: Option<String>,
    /// Maximum article links taken per listing page.
    pub max_links: usize,
    pub selectors: SelectorConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            domains: Vec::new(),
            group: None,
            listing_urls: Vec::new(),
            feeds: Vec::new(),
            link_pattern: None,
            max_links: 10,
            selectors: SelectorConfig::default(),
        }
    }
}

/// Ordered CSS selector lists handed to the extractor.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Title candidates, tried in order.
    pub title: Vec<String>,
    /// Content containers, tried in order.
    pub content: Vec<String>,
    /// Subtrees ignored everywhere (navigation, ads, share bars...).
    pub remove: Vec<String>,
    /// Paragraph-like children walked inside a content container.
    pub paragraph: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            title: strings(&["h1.headline", "h1[itemprop=headline]", "article h1", "h1"]),
            content: strings(&[
                "[itemprop=articleBody]",
                "div.article-content",
                "div.story-content",
                "article",
                "main",
            ]),
            remove: strings(&[
                "nav",
                "header",
                "footer",
                "aside",
                "script",
                "style",
                "noscript",
                "form",
                "iframe",
                "[class*=social-share]",
                "[class*=share-bar]",
                "[class*=advert]",
                "[id*=advert]",
                "[class*=comments]",
                "[class*=related]",
                "[class*=newsletter]",
            ]),
            paragraph: "p".to_string(),
        }
    }
}

/// Word lists used by the menu classifier and the validator.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Vocabulary {
    /// Substrings that mark navigation or boilerplate (case-insensitive).
    pub boilerplate_phrases: Vec<String>,
    /// Tokens typical of section menus.
    pub menu_words: Vec<String>,
    /// Reporting verbs and institutional nouns typical of news prose.
    pub news_words: Vec<String>,
    /// Titles that name a section rather than a story.
    pub blocked_titles: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            boilerplate_phrases: strings(&[
                "sign in",
                "sign up",
                "log in",
                "my feed",
                "edition menu",
                "top stories",
                "breadcrumb",
                "subscribe",
                "newsletter",
                "skip to content",
                "skip to main",
                "all rights reserved",
                "privacy policy",
                "terms of use",
                "cookie policy",
                "follow us on",
                "download our app",
                "share this article",
                "most popular",
                "trending now",
                "로그인",
                "구독",
                "登录",
                "订阅",
            ]),
            menu_words: strings(&[
                "feed",
                "edition",
                "menu",
                "account",
                "sign",
                "login",
                "search",
                "home",
                "latest",
                "trending",
                "lifestyle",
                "singapore",
                "asia",
                "indonesia",
                "malaysia",
                "world",
                "sport",
                "sports",
                "opinion",
                "video",
                "videos",
                "podcasts",
                "watch",
                "listen",
                "more",
                "my",
                "in",
                "subscribe",
                "newsletters",
                "commentary",
                "entertainment",
            ]),
            news_words: strings(&[
                "said",
                "says",
                "announced",
                "announce",
                "government",
                "minister",
                "ministry",
                "policy",
                "court",
                "business",
                "economic",
                "economy",
                "police",
                "parliament",
                "president",
                "officials",
                "authorities",
                "according",
                "reported",
                "statement",
                "spokesperson",
                "investigation",
                "residents",
                "company",
                "million",
                "billion",
                "percent",
                "election",
                "budget",
                "market",
            ]),
            blocked_titles: strings(&[
                "newsletters",
                "newsletter",
                "breaking news",
                "latest news",
                "top stories",
                "sign up",
                "sign in",
                "log in",
                "menu",
                "search",
                "edition",
                "home",
                "singapore",
                "asia",
                "world",
                "business",
                "sport",
                "lifestyle",
                "opinion",
                "videos",
                "podcasts",
            ]),
        }
    }
}

/// Thresholds of the menu classifier.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    /// Menu-word share above which a sentence is menu text.
    pub sentence_menu_ratio: f64,
    /// Menu-word share above which a whole block is menu text.
    pub document_menu_ratio: f64,
    /// Menu-word share above which content with no news signal is a landing page.
    pub landing_menu_ratio: f64,
    /// Short-token flooding only applies above this many tokens.
    pub short_token_min_tokens: usize,
    /// Tokens shorter than this many chars count as short.
    pub short_token_len: usize,
    pub short_token_ratio: f64,
    pub max_colons: usize,
    pub max_pipes: usize,
    /// Uppercase scarcity only applies to text longer than this.
    pub uppercase_min_len: usize,
    pub uppercase_ratio: f64,
    pub max_single_char_tokens: usize,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            sentence_menu_ratio: 0.6,
            document_menu_ratio: 0.7,
            landing_menu_ratio: 0.5,
            short_token_min_tokens: 10,
            short_token_len: 4,
            short_token_ratio: 0.5,
            max_colons: 3,
            max_pipes: 2,
            uppercase_min_len: 100,
            uppercase_ratio: 0.1,
            max_single_char_tokens: 5,
        }
    }
}

/// Minimum structure an article must have.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidatorThresholds {
    /// A `.`-separated fragment counts only if longer than this.
    pub min_fragment_len: usize,
    pub min_fragments: usize,
    pub min_tokens: usize,
}

impl Default for ValidatorThresholds {
    fn default() -> Self {
        Self {
            min_fragment_len: 5,
            min_fragments: 1,
            min_tokens: 10,
        }
    }
}

/// Similarity thresholds of the deduplicator.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DedupThresholds {
    /// Titles more similar than this are duplicates outright.
    pub title_similarity: f64,
    /// Titles more similar than this trigger a body comparison.
    pub title_body_gate: f64,
    pub content_similarity: f64,
    /// Content chars used for fingerprints and body comparison.
    pub prefix_chars: usize,
}

impl Default for DedupThresholds {
    fn default() -> Self {
        Self {
            title_similarity: 0.85,
            title_body_gate: 0.5,
            content_similarity: 0.85,
            prefix_chars: 500,
        }
    }
}

/// Length limits used while extracting.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractorSettings {
    /// Titles must be longer than this many chars to be taken from a selector.
    pub min_title_len: usize,
    pub content_max_len: usize,
    pub min_sentence_len: usize,
    pub summary_max_len: usize,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            min_title_len: 10,
            content_max_len: 1000,
            min_sentence_len: 15,
            summary_max_len: 300,
        }
    }
}

/// Keyword include/exclude filter applied to `title + content`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct KeywordFilter {
    /// When non-empty, at least one of these must appear.
    pub include: Vec<String>,
    /// None of these may appear.
    pub exclude: Vec<String>,
}

/// Why the keyword filter turned an article away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordMiss {
    Excluded(String),
    NoIncludedKeyword,
}

impl KeywordFilter {
    /// Check `title` and `content` against both lists, case-insensitively.
    pub fn check(&self, title: &str, content: &str) -> Result<(), KeywordMiss> {
        let haystack = format!("{title} {content}").to_lowercase();

        if let Some(word) = self
            .exclude
            .iter()
            .find(|w| !w.trim().is_empty() && haystack.contains(&w.to_lowercase()))
        {
            return Err(KeywordMiss::Excluded(word.clone()));
        }

        let includes: Vec<&String> = self.include.iter().filter(|w| !w.trim().is_empty()).collect();
        if !includes.is_empty() && !includes.iter().any(|w| haystack.contains(&w.to_lowercase())) {
            return Err(KeywordMiss::NoIncludedKeyword);
        }
        Ok(())
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
