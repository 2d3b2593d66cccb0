//! Final accept/reject gate for extracted articles.
//!
//! The checks are deliberately lenient: a weak article that slips through
//! costs less than a real story that is silently dropped. Every threshold is
//! configurable through [`ValidatorThresholds`] and [`Vocabulary`].

use crate::classify::MenuTextClassifier;
use crate::config::{ValidatorThresholds, Vocabulary};
use crate::models::CandidateArticle;
use crate::text::tokenize;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Why a candidate was turned away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    EmptyTitle,
    EmptyContent,
    BlockedTitle(String),
    LandingPage,
    TooFewSentences { found: usize },
    TooFewTokens { found: usize },
    MenuContent,
}

impl Rejection {
    /// Short stable name, used as a counter key.
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::EmptyTitle => "empty_title",
            Rejection::EmptyContent => "empty_content",
            Rejection::BlockedTitle(_) => "blocked_title",
            Rejection::LandingPage => "landing_page",
            Rejection::TooFewSentences { .. } => "too_few_sentences",
            Rejection::TooFewTokens { .. } => "too_few_tokens",
            Rejection::MenuContent => "menu_content",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::EmptyTitle => write!(f, "title is empty"),
            Rejection::EmptyContent => write!(f, "content is empty"),
            Rejection::BlockedTitle(t) => write!(f, "title '{t}' names a section, not a story"),
            Rejection::LandingPage => write!(f, "content looks like a landing page"),
            Rejection::TooFewSentences { found } => write!(f, "only {found} sentence fragments"),
            Rejection::TooFewTokens { found } => write!(f, "only {found} words"),
            Rejection::MenuContent => write!(f, "content looks like menu text"),
        }
    }
}

/// Outcome of [`ArticleValidator::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    pub fn reason(&self) -> Option<&Rejection> {
        match self {
            Verdict::Accepted => None,
            Verdict::Rejected(r) => Some(r),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArticleValidator {
    classifier: MenuTextClassifier,
    blocked_titles: HashSet<String>,
    thresholds: ValidatorThresholds,
}

impl Default for ArticleValidator {
    fn default() -> Self {
        Self::new(
            MenuTextClassifier::default(),
            &Vocabulary::default(),
            ValidatorThresholds::default(),
        )
    }
}

impl ArticleValidator {
    pub fn new(
        classifier: MenuTextClassifier,
        vocabulary: &Vocabulary,
        thresholds: ValidatorThresholds,
    ) -> Self {
        Self {
            classifier,
            blocked_titles: vocabulary
                .blocked_titles
                .iter()
                .map(|t| t.trim().to_lowercase())
                .collect(),
            thresholds,
        }
    }

    /// Run every check in order and report the first failure.
    pub fn validate(&self, candidate: &CandidateArticle) -> Verdict {
        match self.first_failure(candidate) {
            None => Verdict::Accepted,
            Some(reason) => {
                debug!(url = %candidate.url, %reason, "Candidate rejected");
                Verdict::Rejected(reason)
            }
        }
    }

    fn first_failure(&self, candidate: &CandidateArticle) -> Option<Rejection> {
        let title = candidate.title.trim();
        let content = candidate.content.trim();

        if title.is_empty() {
            return Some(Rejection::EmptyTitle);
        }
        if content.is_empty() {
            return Some(Rejection::EmptyContent);
        }

        if self.blocked_titles.contains(&title.to_lowercase()) {
            return Some(Rejection::BlockedTitle(title.to_string()));
        }

        let news_signal = self.classifier.news_signal(content);
        if news_signal == 0 && self.classifier.is_landing_page_content(content) {
            return Some(Rejection::LandingPage);
        }

        let t = &self.thresholds;
        let fragments = content
            .split('.')
            .filter(|f| f.trim().chars().count() > t.min_fragment_len)
            .count();
        if fragments < t.min_fragments {
            return Some(Rejection::TooFewSentences { found: fragments });
        }
        let tokens = tokenize(content).len();
        if tokens < t.min_tokens {
            return Some(Rejection::TooFewTokens { found: tokens });
        }

        if news_signal == 0 && self.classifier.is_menu_text(content) {
            return Some(Rejection::MenuContent);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "The Land Transport Authority said on Friday that the new \
        Thomson-East Coast Line stations will open in stages from next year. The \
        minister added that commuters in the east will save up to 20 minutes on \
        their daily journeys, and that feeder bus services will be adjusted to \
        match the new stations. More details will be announced after public \
        consultation ends in March.";

    fn candidate(title: &str, content: &str) -> CandidateArticle {
        CandidateArticle {
            title: title.to_string(),
            content: content.to_string(),
            url: "https://example.sg/story".to_string(),
            ..CandidateArticle::default()
        }
    }

    #[test]
    fn test_accepts_real_article() {
        let v = ArticleValidator::default();
        assert_eq!(v.validate(&candidate("New MRT stations open next year", BODY)), Verdict::Accepted);
    }

    #[test]
    fn test_rejects_blocked_title() {
        let v = ArticleValidator::default();
        assert!(BODY.split_whitespace().count() >= 50);
        let verdict = v.validate(&candidate("Sign Up", BODY));
        assert_eq!(verdict, Verdict::Rejected(Rejection::BlockedTitle("Sign Up".to_string())));
        assert!(!verdict.is_accepted());
    }

    #[test]
    fn test_rejects_empty_parts() {
        let v = ArticleValidator::default();
        assert_eq!(v.validate(&candidate("  ", BODY)).reason(), Some(&Rejection::EmptyTitle));
        assert_eq!(
            v.validate(&candidate("A perfectly fine title", "\n ")).reason(),
            Some(&Rejection::EmptyContent)
        );
    }

    #[test]
    fn test_rejects_landing_page() {
        let v = ArticleValidator::default();
        let content = "Singapore Asia World Lifestyle Sport Opinion Videos Podcasts Commentary Entertainment";
        assert_eq!(
            v.validate(&candidate("Straits Times front page", content)).reason(),
            Some(&Rejection::LandingPage)
        );
    }

    #[test]
    fn test_rejects_thin_content() {
        let v = ArticleValidator::default();
        assert_eq!(
            v.validate(&candidate("Weather update for the week", "Rain expected. Hot later.")).reason(),
            Some(&Rejection::TooFewTokens { found: 4 })
        );
        assert_eq!(
            v.validate(&candidate("Weather update for the week", "Rain. Sun. Wind. Hot.")).reason(),
            Some(&Rejection::TooFewSentences { found: 0 })
        );
    }

    #[test]
    fn test_menu_content_without_news_signal_is_landing_page() {
        let v = ArticleValidator::default();
        // low menu-word share, but breadcrumb pipes make it menu text
        let content = "Photos | Videos | Graphics | Puzzles and crosswords for everyone to enjoy today";
        assert_eq!(
            v.validate(&candidate("Interactive collection page", content)).reason(),
            Some(&Rejection::LandingPage)
        );
    }

    #[test]
    fn test_news_signal_overrides_menu_heuristics() {
        let v = ArticleValidator::default();
        let content = "Photos | Videos | Graphics: the ministry said the exhibition \
                       will run until June at the National Museum for all visitors.";
        assert_eq!(
            v.validate(&candidate("National Museum exhibition extended", content)),
            Verdict::Accepted
        );
    }
}
