//! RSS 2.0 and Atom feed reading.
//!
//! Feeds give a cheap second path to candidates: the item description is
//! usually the article's lead paragraph, which is enough for a digest entry
//! when the article page itself is paywalled or script-rendered.

use crate::error::FeedError;
use crate::models::CandidateArticle;
use crate::text::{normalize_whitespace, safe_truncate};
use chrono::DateTime;
use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use scraper::Html;
use tracing::debug;

/// One `<item>` (RSS) or `<entry>` (Atom).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    /// Raw description; may contain markup.
    pub description: String,
    /// RFC 3339 when the feed date parsed, verbatim otherwise.
    pub pub_date: Option<String>,
}

impl FeedItem {
    /// Turn the item into a candidate, stripping markup from the description
    /// and capping it at `max_len` chars.
    pub fn into_candidate(self, max_len: usize) -> CandidateArticle {
        let text = strip_markup(&self.description);
        CandidateArticle {
            title: normalize_whitespace(&self.title),
            content: safe_truncate(&text, max_len),
            raw_content: Some(text),
            url: self.link.trim().to_string(),
            publish_date: self.pub_date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
    Guid,
    Description,
    Date,
}

impl Field {
    fn from_tag(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"link" => Some(Field::Link),
            b"description" | b"summary" | b"content" | b"content:encoded" => {
                Some(Field::Description)
            }
            b"pubDate" | b"published" | b"updated" | b"dc:date" => Some(Field::Date),
            _ => None,
        }
    }
}

/// Parse an RSS or Atom document into its items, in document order.
///
/// Items without a link are skipped. A well-formed document without any item
/// is [`FeedError::Empty`].
pub fn parse_rss(xml: &str) -> Result<Vec<FeedItem>, FeedError> {
    // Untrimmed: text around an entity reference arrives as separate events.
    let mut reader = Reader::from_str(xml);

    let mut items = Vec::new();
    let mut current: Option<FeedItem> = None;
    let mut field: Option<Field> = None;
    let mut guid = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"item" | b"entry" => {
                    current = Some(FeedItem::default());
                    guid.clear();
                }
                name if current.is_some() => {
                    field = Field::from_tag(name);
                    // only permalink guids stand in for a missing <link>
                    if name == b"guid" && is_permalink(&e) {
                        field = Some(Field::Guid);
                    }
                    if name == b"link" {
                        apply_atom_link(&e, current.as_mut());
                    }
                }
                _ => {}
            },
            Event::Empty(e) if e.name().as_ref() == b"link" => {
                apply_atom_link(&e, current.as_mut());
            }
            Event::Text(t) => {
                append(current.as_mut(), field, &String::from_utf8_lossy(&t), &mut guid);
            }
            Event::GeneralRef(r) => {
                let text = match r.resolve_char_ref() {
                    Ok(Some(c)) => c.to_string(),
                    _ => {
                        let name = String::from_utf8_lossy(&r);
                        match resolve_predefined_entity(&name) {
                            Some(resolved) => resolved.to_string(),
                            None => format!("&{name};"),
                        }
                    }
                };
                append(current.as_mut(), field, &text, &mut guid);
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                append(current.as_mut(), field, &text, &mut guid);
            }
            Event::End(e) => match e.name().as_ref() {
                b"item" | b"entry" => {
                    if let Some(mut item) = current.take() {
                        item.title = normalize_whitespace(&item.title);
                        item.link = item.link.trim().to_string();
                        if item.link.is_empty() {
                            item.link = guid.trim().to_string();
                        }
                        item.description = item.description.trim().to_string();
                        item.pub_date = item.pub_date.map(|d| normalize_date(&d));
                        if item.link.is_empty() {
                            debug!(title = %item.title, "Feed item without link skipped");
                        } else {
                            items.push(item);
                        }
                    }
                    field = None;
                }
                _ => field = None,
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if items.is_empty() {
        return Err(FeedError::Empty);
    }
    Ok(items)
}

fn append(item: Option<&mut FeedItem>, field: Option<Field>, text: &str, guid: &mut String) {
    let (Some(item), Some(field)) = (item, field) else {
        return;
    };
    let target = match field {
        Field::Title => &mut item.title,
        Field::Link => &mut item.link,
        Field::Guid => guid,
        Field::Description => &mut item.description,
        Field::Date => item.pub_date.get_or_insert_with(String::new),
    };
    target.push_str(text);
}

/// Atom `<link href="..." rel="alternate"/>`. Other `rel` values are ignored.
fn apply_atom_link(e: &BytesStart, item: Option<&mut FeedItem>) {
    let Some(item) = item else { return };
    let mut href = None;
    let mut rel = None;
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).into_owned();
        match attr.key.as_ref() {
            b"href" => href = Some(value),
            b"rel" => rel = Some(value),
            _ => {}
        }
    }
    if let Some(href) = href {
        if item.link.is_empty() && rel.as_deref().is_none_or(|r| r == "alternate") {
            item.link = href;
        }
    }
}

fn is_permalink(e: &BytesStart) -> bool {
    !e.attributes()
        .flatten()
        .any(|a| a.key.as_ref() == b"isPermaLink" && &*a.value == b"false")
}

/// RFC 2822 (`pubDate`) or RFC 3339 (`updated`) to RFC 3339.
fn normalize_date(raw: &str) -> String {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|d| d.to_rfc3339())
        .unwrap_or_else(|_| raw.to_string())
}

fn strip_markup(fragment: &str) -> String {
    if !fragment.contains('<') {
        return normalize_whitespace(fragment);
    }
    let html = Html::parse_fragment(fragment);
    normalize_whitespace(&html.root_element().text().collect::<Vec<_>>().join(" "))
}
