//! Menu and landing-page detection.
//!
//! Navigation text and article prose are told apart by a chain of weak,
//! independent signals. The first signal that fires wins:
//!
//! 1. a known boilerplate phrase ("sign in", "my feed", ...)
//! 2. a CMS identifier such as `id 42` or `type rich_text`
//! 3. a high share of menu vocabulary
//! 4. flooding by very short tokens
//! 5. breadcrumb punctuation (`:` and `|`)
//! 6. long text that is almost all lowercase and full of one-letter tokens
//!
//! Landing pages are judged on the whole document: any reporting verb or
//! institutional noun ("said", "minister", "court", ...) means the text is not
//! a landing page, whatever its menu-word share. Without one, a menu-word
//! share above `landing_menu_ratio` or any block-level signal above marks it.

use crate::config::{ClassifierThresholds, Vocabulary};
use crate::text::tokenize;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;

static CMS_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:id|type)\s+(?:\d+|\w+_\w+)\b").unwrap());

/// The rule that classified a block as menu text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuSignal {
    Phrase,
    CmsIdentifier,
    MenuWords,
    ShortTokens,
    Punctuation,
    UppercaseScarcity,
}

impl fmt::Display for MenuSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MenuSignal::Phrase => "boilerplate phrase",
            MenuSignal::CmsIdentifier => "cms identifier",
            MenuSignal::MenuWords => "menu vocabulary",
            MenuSignal::ShortTokens => "short token flood",
            MenuSignal::Punctuation => "breadcrumb punctuation",
            MenuSignal::UppercaseScarcity => "uppercase scarcity",
        };
        f.write_str(name)
    }
}

/// Heuristic classifier for navigation and boilerplate text.
#[derive(Debug, Clone)]
pub struct MenuTextClassifier {
    phrases: Vec<String>,
    menu_words: HashSet<String>,
    news_words: HashSet<String>,
    thresholds: ClassifierThresholds,
}

impl Default for MenuTextClassifier {
    fn default() -> Self {
        Self::new(&Vocabulary::default(), ClassifierThresholds::default())
    }
}

impl MenuTextClassifier {
    pub fn new(vocabulary: &Vocabulary, thresholds: ClassifierThresholds) -> Self {
        let lower_set = |words: &[String]| -> HashSet<String> {
            words.iter().map(|w| w.trim().to_lowercase()).filter(|w| !w.is_empty()).collect()
        };
        Self {
            phrases: vocabulary
                .boilerplate_phrases
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            menu_words: lower_set(&vocabulary.menu_words),
            news_words: lower_set(&vocabulary.news_words),
            thresholds,
        }
    }

    /// Block-level check, used on whole content strings.
    pub fn is_menu_text(&self, text: &str) -> bool {
        self.menu_signal(text, self.thresholds.document_menu_ratio).is_some()
    }

    /// Sentence-level check with the stricter menu-word ratio.
    pub fn is_menu_sentence(&self, sentence: &str) -> bool {
        self.menu_signal(sentence, self.thresholds.sentence_menu_ratio).is_some()
    }

    /// Whole-document check: is this an index or section page rather than a story?
    ///
    /// Any news vocabulary rules it out. Without it, the page is a landing
    /// page when menu words make up more than `landing_menu_ratio` of it, or
    /// when [`is_menu_text`](Self::is_menu_text) holds for it.
    pub fn is_landing_page_content(&self, content: &str) -> bool {
        if self.news_signal(content) > 0 {
            return false;
        }
        self.menu_word_ratio(content) > self.thresholds.landing_menu_ratio
            || self.is_menu_text(content)
    }

    /// Which rule, if any, marks `text` as menu text at block granularity.
    pub fn classify_text(&self, text: &str) -> Option<MenuSignal> {
        self.menu_signal(text, self.thresholds.document_menu_ratio)
    }

    /// Which rule, if any, marks `sentence` as menu text.
    pub fn classify_sentence(&self, sentence: &str) -> Option<MenuSignal> {
        self.menu_signal(sentence, self.thresholds.sentence_menu_ratio)
    }

    /// Number of news-vocabulary tokens in `text`.
    pub fn news_signal(&self, text: &str) -> usize {
        tokenize(text)
            .into_iter()
            .filter(|t| self.news_words.contains(&token_key(t)))
            .count()
    }

    /// Share of whitespace tokens that belong to the menu vocabulary, `0.0`
    /// for empty text. Separators such as `|` count as tokens.
    pub fn menu_word_ratio(&self, text: &str) -> f64 {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return 0.0;
        }
        let menu = tokens
            .iter()
            .filter(|t| self.menu_words.contains(&token_key(t)))
            .count();
        menu as f64 / tokens.len() as f64
    }

    fn menu_signal(&self, text: &str, menu_ratio: f64) -> Option<MenuSignal> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let t = &self.thresholds;

        let lower = text.to_lowercase();
        if self.phrases.iter().any(|p| lower.contains(p.as_str())) {
            return Some(MenuSignal::Phrase);
        }

        if CMS_IDENTIFIER.is_match(text) {
            return Some(MenuSignal::CmsIdentifier);
        }

        if self.menu_word_ratio(text) > menu_ratio {
            return Some(MenuSignal::MenuWords);
        }

        let tokens = tokenize(text);
        if tokens.len() > t.short_token_min_tokens {
            let short = tokens
                .iter()
                .filter(|tok| tok.chars().count() < t.short_token_len)
                .count();
            if short as f64 / tokens.len() as f64 > t.short_token_ratio {
                return Some(MenuSignal::ShortTokens);
            }
        }

        let colons = text.matches(':').count();
        let pipes = text.matches('|').count();
        if colons > t.max_colons || pipes > t.max_pipes {
            return Some(MenuSignal::Punctuation);
        }

        if text.chars().count() > t.uppercase_min_len {
            let letters = text.chars().filter(|c| c.is_alphabetic()).count();
            let upper = text.chars().filter(|c| c.is_uppercase()).count();
            let upper_ratio = if letters == 0 { 0.0 } else { upper as f64 / letters as f64 };
            let single_char = tokens.iter().filter(|tok| tok.chars().count() == 1).count();
            if upper_ratio < t.uppercase_ratio && single_char > t.max_single_char_tokens {
                return Some(MenuSignal::UppercaseScarcity);
            }
        }

        None
    }
}

/// Lowercased token with surrounding punctuation removed.
fn token_key(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE_PARAGRAPH: &str = "Minister announced the policy on Tuesday, saying \
        that families would receive additional support through community centres. The \
        government expects the scheme to benefit thousands of households across the \
        island, and officials said applications would open next month after \
        consultations with grassroots leaders.";

    fn classifier() -> MenuTextClassifier {
        MenuTextClassifier::default()
    }

    #[test]
    fn test_concatenated_menu_phrases_are_menu() {
        let text = "Sign In My Feed Edition Menu Top Stories Subscribe Newsletter \
                    Breadcrumb Skip to content Privacy Policy Follow us on";
        assert!(classifier().is_menu_text(text));
        assert_eq!(classifier().classify_text(text), Some(MenuSignal::Phrase));
    }

    #[test]
    fn test_article_paragraph_is_not_menu() {
        assert!(ARTICLE_PARAGRAPH.len() > 300);
        let c = classifier();
        assert_eq!(c.classify_text(ARTICLE_PARAGRAPH), None);
        assert!(!c.is_menu_sentence(ARTICLE_PARAGRAPH));
        assert!(!c.is_landing_page_content(ARTICLE_PARAGRAPH));
    }

    #[test]
    fn test_cms_identifier() {
        let c = classifier();
        assert_eq!(
            c.classify_sentence("Component id 4412 rendered in slot"),
            Some(MenuSignal::CmsIdentifier)
        );
        assert_eq!(
            c.classify_sentence("Block type rich_text placeholder for layout"),
            Some(MenuSignal::CmsIdentifier)
        );
    }

    #[test]
    fn test_menu_word_density_sentence_vs_document() {
        let c = classifier();
        // 2 of 3 tokens are menu words: above 0.6, below 0.7
        let text = "Lifestyle Asia Hawkers";
        assert_eq!(c.classify_sentence(text), Some(MenuSignal::MenuWords));
        assert_eq!(c.classify_text(text), None);
    }

    #[test]
    fn test_short_token_flood() {
        let c = classifier();
        let text = "a b c d e f g h i j k l";
        assert_eq!(c.classify_text(text), Some(MenuSignal::ShortTokens));
    }

    #[test]
    fn test_breadcrumb_punctuation() {
        let c = classifier();
        assert_eq!(
            c.classify_text("Transport | Housing | Health | Education"),
            Some(MenuSignal::Punctuation)
        );
        assert_eq!(
            c.classify_text("Category: Local Section: Transport Topic: Buses Tag: Fares"),
            Some(MenuSignal::Punctuation)
        );
    }

    #[test]
    fn test_uppercase_scarcity() {
        let c = classifier();
        let text = "x photos x videos x podcasts x graphics x archives x puzzles \
                    x crosswords x obituaries x classifieds x recipes x horoscopes";
        assert!(text.chars().count() > 100);
        assert_eq!(c.classify_text(text), Some(MenuSignal::UppercaseScarcity));
    }

    #[test]
    fn test_landing_page_needs_no_news_signal() {
        let c = classifier();
        let landing = "Singapore Asia World Lifestyle Sport Opinion Videos Podcasts";
        assert!(c.is_landing_page_content(landing));

        let with_news = "Singapore Asia World minister said Lifestyle Sport";
        assert!(c.news_signal(with_news) >= 2);
        assert!(!c.is_landing_page_content(with_news));
    }

    #[test]
    fn test_landing_page_falls_back_to_block_policy() {
        let c = classifier();
        let collection = "Photos | Videos | Graphics | Puzzles and crosswords for everyone to enjoy today";
        assert_eq!(c.news_signal(collection), 0);
        assert!(c.menu_word_ratio(collection) <= 0.5);
        assert!(c.is_menu_text(collection));
        assert!(c.is_landing_page_content(collection));
    }

    #[test]
    fn test_menu_word_ratio_counts_separators() {
        let c = classifier();
        assert!((c.menu_word_ratio("Singapore | Asia | World") - 0.6).abs() < 1e-9);
        assert_eq!(c.menu_word_ratio("Singapore Asia World"), 1.0);
    }

    #[test]
    fn test_empty_is_not_menu() {
        let c = classifier();
        assert!(!c.is_menu_text(""));
        assert_eq!(c.menu_word_ratio(""), 0.0);
        assert_eq!(c.news_signal(""), 0);
    }

    #[test]
    fn test_custom_vocabulary() {
        let vocabulary = Vocabulary {
            boilerplate_phrases: vec!["baca juga".to_string()],
            ..Vocabulary::default()
        };
        let c = MenuTextClassifier::new(&vocabulary, ClassifierThresholds::default());
        assert_eq!(c.classify_sentence("Baca juga: berita lain"), Some(MenuSignal::Phrase));
        // default phrases are replaced, not merged
        assert_eq!(c.classify_sentence("Please sign in to continue reading this"), None);
    }
}
