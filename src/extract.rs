//! Title and body extraction from a parsed news page.
//!
//! Site markup changes without notice, so extraction works from ordered
//! selector lists supplied per site (see [`SiteProfile`]) and falls back to a
//! whole-document paragraph scan when none of them match.
//!
//! # Steps
//!
//! 1. Detach every subtree matched by the profile's `remove` selectors.
//! 2. Title: first `title` selector match longer than 10 chars that is not
//!    menu text, else the `<title>` element with the site name cut off, else
//!    `og:title`.
//! 3. Content: first `content` selector that matches; its paragraphs are
//!    filtered through the menu classifier, split into sentences,
//!    deduplicated and merged up to 1000 chars.
//! 4. If that yields nothing, the paragraph container with the most prose
//!    wins.

use crate::classify::MenuTextClassifier;
use crate::config::{ExtractorSettings, SelectorConfig, SiteConfig};
use crate::error::ConfigError;
use crate::models::{CandidateArticle, ExtractedBy};
use crate::text::{dedupe_sentences, extract_sentences, merge_paragraphs, normalize_whitespace};
use chrono::DateTime;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

static TITLE_ELEMENT: Lazy<Selector> = Lazy::new(|| Selector::parse("head title, title").unwrap());
static OG_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:title"]"#).unwrap());

/// Where a publish date may hide, with the attribute holding it.
static PUBLISH_DATE: Lazy<Vec<(Selector, &'static str)>> = Lazy::new(|| {
    [
        (r#"meta[property="article:published_time"]"#, "content"),
        (r#"meta[itemprop="datePublished"]"#, "content"),
        (r#"meta[name="pubdate"]"#, "content"),
        (r#"meta[name="publish-date"]"#, "content"),
        ("time[datetime]", "datetime"),
    ]
    .into_iter()
    .map(|(css, attr)| (Selector::parse(css).unwrap(), attr))
    .collect()
});

/// Compiled selector tables for one site.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub name: String,
    pub domains: Vec<String>,
    pub group: String,
    title: Vec<Selector>,
    content: Vec<Selector>,
    remove: Vec<Selector>,
    paragraph: Selector,
}

impl SiteProfile {
    /// Compile a site's selector tables, failing on the first bad selector.
    pub fn compile(
        name: &str,
        domains: &[String],
        group: &str,
        selectors: &SelectorConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            name: name.to_string(),
            domains: domains.iter().map(|d| d.trim().to_lowercase()).collect(),
            group: group.to_string(),
            title: compile_all(name, &selectors.title)?,
            content: compile_all(name, &selectors.content)?,
            remove: compile_all(name, &selectors.remove)?,
            paragraph: compile_one(name, &selectors.paragraph)?,
        })
    }

    pub fn from_site(site: &SiteConfig, default_group: &str) -> Result<Self, ConfigError> {
        let group = site.group.as_deref().unwrap_or(default_group);
        Self::compile(&site.name, &site.domains, group, &site.selectors)
    }

    /// `true` for the site's own domains and their subdomains.
    pub fn matches_host(&self, host: &str) -> bool {
        let host = host.trim_start_matches("www.").to_lowercase();
        self.domains
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{d}")))
    }
}

fn compile_all(site: &str, selectors: &[String]) -> Result<Vec<Selector>, ConfigError> {
    selectors.iter().map(|s| compile_one(site, s)).collect()
}

fn compile_one(site: &str, selector: &str) -> Result<Selector, ConfigError> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(ConfigError::InvalidSelector {
            site: site.to_string(),
            selector: String::new(),
            reason: "empty selector".to_string(),
        });
    }
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        site: site.to_string(),
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// A piece of text and the element it came from. Lives only while the
/// document it borrows from is alive.
#[derive(Debug, Clone)]
pub struct TextBlock<'a> {
    pub text: String,
    pub source: ElementRef<'a>,
}

impl<'a> TextBlock<'a> {
    fn of(element: ElementRef<'a>) -> Self {
        Self {
            text: element_text(element),
            source: element,
        }
    }
}

/// A candidate plus the path that produced its body.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub candidate: CandidateArticle,
    /// `Traditional` when a content selector matched, `Fallback` after a
    /// whole-document scan.
    pub method: ExtractedBy,
}

#[derive(Debug, Clone)]
pub struct ContentExtractor {
    classifier: MenuTextClassifier,
    settings: ExtractorSettings,
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new(MenuTextClassifier::default(), ExtractorSettings::default())
    }
}

impl ContentExtractor {
    pub fn new(classifier: MenuTextClassifier, settings: ExtractorSettings) -> Self {
        Self {
            classifier,
            settings,
        }
    }

    /// Parse `html` and extract a candidate. `None` when the page yields
    /// neither a title nor a body, including blank input.
    #[instrument(level = "debug", skip_all, fields(%url, site = %profile.name))]
    pub fn extract_html(&self, url: &str, html: &str, profile: &SiteProfile) -> Option<Extraction> {
        if html.trim().is_empty() {
            debug!("Empty HTML");
            return None;
        }
        self.extract_document(Html::parse_document(html), url, profile)
    }

    /// Extract from an already parsed document. The document is consumed
    /// because the removal step detaches nodes from it.
    pub fn extract_document(
        &self,
        mut document: Html,
        url: &str,
        profile: &SiteProfile,
    ) -> Option<Extraction> {
        let publish_date = publish_date(&document);
        prune(&mut document, &profile.remove);
        // Html::select walks the whole node arena, detached subtrees included.
        let root = document.root_element();

        let title = self.title(root, profile);
        let body = self
            .content_from_selectors(root, profile)
            .map(|b| (b, ExtractedBy::Traditional))
            .or_else(|| {
                self.content_from_scan(root, profile)
                    .map(|b| (b, ExtractedBy::Fallback))
            });

        if title.is_none() && body.is_none() {
            debug!("No title and no content");
            return None;
        }

        let (content, raw_content, method) = match body {
            Some((Body { merged, raw }, method)) => (merged, Some(raw), method),
            None => (String::new(), None, ExtractedBy::Traditional),
        };
        debug!(
            title_found = title.is_some(),
            content_chars = content.chars().count(),
            %method,
            "Extracted candidate"
        );

        Some(Extraction {
            candidate: CandidateArticle {
                title: title.unwrap_or_default(),
                content,
                raw_content,
                url: url.to_string(),
                publish_date,
            },
            method,
        })
    }

    /// Convenience wrapper returning only the candidate.
    pub fn extract(&self, url: &str, html: &str, profile: &SiteProfile) -> Option<CandidateArticle> {
        self.extract_html(url, html, profile).map(|e| e.candidate)
    }

    fn title(&self, root: ElementRef, profile: &SiteProfile) -> Option<String> {
        for selector in &profile.title {
            for element in root.select(selector) {
                let text = element_text(element);
                if text.chars().count() > self.settings.min_title_len
                    && !self.classifier.is_menu_text(&text)
                {
                    return Some(text);
                }
            }
        }

        if let Some(element) = root.select(&TITLE_ELEMENT).next() {
            let title = strip_site_name(&element_text(element));
            if !title.is_empty() {
                return Some(title);
            }
        }

        root.select(&OG_TITLE)
            .filter_map(|m| m.value().attr("content"))
            .map(|c| strip_site_name(&normalize_whitespace(c)))
            .find(|t| !t.is_empty())
    }

    fn content_from_selectors(&self, root: ElementRef, profile: &SiteProfile) -> Option<Body> {
        let container = profile
            .content
            .iter()
            .find_map(|selector| root.select(selector).next())?;

        let mut blocks: Vec<TextBlock> = container
            .select(&profile.paragraph)
            .map(TextBlock::of)
            .collect();
        if blocks.is_empty() {
            blocks.push(TextBlock::of(container));
        }
        self.assemble(&blocks)
    }

    /// Score paragraph containers by prose length, menu text counting against.
    fn content_from_scan(&self, root: ElementRef, profile: &SiteProfile) -> Option<Body> {
        let mut containers: Vec<(ElementRef, i64, Vec<TextBlock>)> = Vec::new();

        for paragraph in root.select(&profile.paragraph) {
            let block = TextBlock::of(paragraph);
            if block.text.is_empty() {
                continue;
            }
            let Some(parent) = paragraph.parent().and_then(ElementRef::wrap) else {
                continue;
            };
            let len = block.text.chars().count() as i64;
            let score = if self.classifier.is_menu_sentence(&block.text) {
                -len
            } else {
                len
            };

            match containers.iter_mut().find(|(c, _, _)| *c == parent) {
                Some((_, total, blocks)) => {
                    *total += score;
                    blocks.push(block);
                }
                None => containers.push((parent, score, vec![block])),
            }
        }

        let mut best: Option<&(ElementRef, i64, Vec<TextBlock>)> = None;
        for entry in &containers {
            if best.is_none_or(|b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        let (_, score, blocks) = best?;
        debug!(candidates = containers.len(), best_score = score, "Paragraph scan");
        if *score <= 0 {
            return None;
        }
        self.assemble(blocks)
    }

    fn assemble(&self, blocks: &[TextBlock]) -> Option<Body> {
        let sentences = blocks
            .iter()
            .filter(|b| !b.text.is_empty() && !self.classifier.is_menu_sentence(&b.text))
            .flat_map(|b| extract_sentences(&b.text, self.settings.min_sentence_len));
        let unique = dedupe_sentences(sentences);
        if unique.is_empty() {
            return None;
        }

        let merged = merge_paragraphs(&unique, self.settings.content_max_len);
        if merged.is_empty() {
            return None;
        }
        Some(Body {
            merged,
            raw: unique.join(" "),
        })
    }
}

struct Body {
    merged: String,
    raw: String,
}

/// Detach every element matched by `remove`, together with its subtree.
///
/// The `<html>` element itself is never detached.
fn prune(document: &mut Html, remove: &[Selector]) {
    let root = document.root_element().id();
    let ids: Vec<_> = remove
        .iter()
        .flat_map(|selector| document.select(selector).map(|el| el.id()))
        .filter(|id| *id != root)
        .collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn element_text(element: ElementRef) -> String {
    normalize_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// `"Taxi fares rise - The Straits Times"` -> `"Taxi fares rise"`.
fn strip_site_name(title: &str) -> String {
    let cut = [" - ", " | "]
        .iter()
        .filter_map(|sep| title.find(sep))
        .min()
        .unwrap_or(title.len());
    title[..cut].trim().to_string()
}

fn publish_date(document: &Html) -> Option<String> {
    PUBLISH_DATE.iter().find_map(|(selector, attr)| {
        document
            .select(selector)
            .filter_map(|el| el.value().attr(attr))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map(|d| d.to_rfc3339())
                    .unwrap_or_else(|_| raw.to_string())
            })
    })
}
