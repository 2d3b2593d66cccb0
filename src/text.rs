//! Text segmentation and merging primitives.
//!
//! Every other stage of the pipeline leans on these helpers:
//! - [`extract_sentences`] splits prose while protecting common abbreviations
//! - [`safe_truncate`] shortens text without leaving a partial word behind
//! - [`merge_paragraphs`] joins sentences up to a length budget
//!
//! All lengths are counted in `char`s so that CJK and Malay text with
//! diacritics is never split inside a code point.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashSet;

/// Marker appended when text had to be cut at a word boundary or hard-cut.
pub const ELLIPSIS: &str = "...";

/// Default minimum sentence length kept by [`extract_sentences`].
pub const DEFAULT_MIN_SENTENCE_LEN: usize = 15;

/// A tail sentence is only truncated into the merge if more than this many
/// chars of budget are left.
const MERGE_TAIL_BUDGET: usize = 50;

/// Private-use code point standing in for an abbreviation's period.
const ABBREVIATION_MASK: char = '\u{E000}';

static ABBREVIATIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(Dr|Mr|Mrs|Ms|Prof|Sr|Jr|Ltd|Inc|Co)\.").unwrap());

static SENTENCE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[.!?]+["'”’)]*\s+|[。！？]+\s*"#).unwrap());

/// Returns `true` for ASCII and full-width sentence terminators.
pub fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '。' | '！' | '？')
}

fn is_fullwidth_terminator(c: char) -> bool {
    matches!(c, '。' | '！' | '？')
}

/// Collapse every run of whitespace into a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace tokens of `text`.
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// Key used to compare sentences for equality: lowercased, whitespace-collapsed.
pub fn normalize_key(sentence: &str) -> String {
    normalize_whitespace(&sentence.to_lowercase())
}

/// Split `text` into sentences, dropping fragments shorter than `min_length` chars.
///
/// Sentences keep their terminal punctuation. Abbreviations such as `Dr.` or
/// `Ltd.` are masked before splitting and restored afterwards, so
/// `"Dr. Tan spoke."` stays one sentence.
///
/// # Examples
///
/// ```
/// use sg_news_digest::text::extract_sentences;
///
/// let s = extract_sentences("Dr. Tan opened the clinic. It serves Bedok residents.", 5);
/// assert_eq!(s, vec!["Dr. Tan opened the clinic.", "It serves Bedok residents."]);
/// ```
pub fn extract_sentences(text: &str, min_length: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let masked = ABBREVIATIONS.replace_all(text, |caps: &Captures| {
        format!("{}{}", &caps[1], ABBREVIATION_MASK)
    });

    let mut sentences = Vec::new();
    let mut start = 0;
    for boundary in SENTENCE_BOUNDARY.find_iter(&masked) {
        push_sentence(&mut sentences, &masked[start..boundary.end()], min_length);
        start = boundary.end();
    }
    push_sentence(&mut sentences, &masked[start..], min_length);
    sentences
}

fn push_sentence(out: &mut Vec<String>, piece: &str, min_length: usize) {
    let restored = normalize_whitespace(&piece.replace(ABBREVIATION_MASK, "."));
    if !restored.is_empty() && restored.chars().count() >= min_length {
        out.push(restored);
    }
}

/// Drop repeated sentences, keeping the first occurrence and the original order.
pub fn dedupe_sentences<I, S>(sentences: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    sentences
        .into_iter()
        .map(Into::into)
        .filter(|s| seen.insert(normalize_key(s)))
        .collect()
}

/// Shorten `text` to at most `max_length` chars without cutting a word in half.
///
/// Preference order:
/// 1. the last sentence terminator inside the window (punctuation kept),
/// 2. the last space, followed by [`ELLIPSIS`],
/// 3. a hard cut followed by [`ELLIPSIS`] when the window holds a single word.
///
/// The marker is counted against `max_length`, so applying the function twice
/// gives the same result as applying it once. A limit too small for the
/// marker and without a sentence boundary gives an empty string.
///
/// # Examples
///
/// ```
/// use sg_news_digest::text::safe_truncate;
///
/// assert_eq!(safe_truncate("Short.", 100), "Short.");
/// assert_eq!(safe_truncate("Fares rise. Buses slow down today", 20), "Fares rise.");
/// assert_eq!(safe_truncate("no punctuation in this line", 12), "no...");
/// ```
pub fn safe_truncate(text: &str, max_length: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_length {
        return text.to_string();
    }

    // chars.len() > max_length, so chars[end] is always in bounds here.
    let sentence_end = (1..=max_length).rev().find(|&end| {
        let last = chars[end - 1];
        is_fullwidth_terminator(last) || (is_terminator(last) && chars[end].is_whitespace())
    });
    if let Some(end) = sentence_end {
        let cut: String = chars[..end].iter().collect();
        let cut = cut.trim();
        if cut.chars().any(char::is_alphanumeric) {
            return cut.to_string();
        }
    }

    let marker_len = ELLIPSIS.chars().count();
    if max_length <= marker_len {
        return String::new();
    }
    let budget = max_length - marker_len;

    let space = (1..=budget).rev().find(|&i| chars[i].is_whitespace());
    if let Some(i) = space {
        let cut: String = chars[..i].iter().collect();
        let cut = cut.trim_end();
        if !cut.trim_start().is_empty() {
            return format!("{cut}{ELLIPSIS}");
        }
    }

    let cut: String = chars[..budget].iter().collect();
    format!("{cut}{ELLIPSIS}")
}

/// Greedily join `sentences` while the result stays within `max_length` chars.
///
/// Sentences are joined with a space when the previous one already ends with
/// a terminator and with `". "` otherwise. When the next sentence does not fit
/// but more than 50 chars of budget remain, a [`safe_truncate`]d copy of it is
/// appended and merging stops.
pub fn merge_paragraphs<S: AsRef<str>>(sentences: &[S], max_length: usize) -> String {
    let mut merged = String::new();
    let mut merged_len = 0usize;

    for sentence in sentences {
        let sentence = sentence.as_ref().trim();
        if sentence.is_empty() {
            continue;
        }

        let separator = match merged.chars().last() {
            None => "",
            Some(c) if is_terminator(c) => " ",
            Some(_) => ". ",
        };
        let separator_len = separator.chars().count();
        let sentence_len = sentence.chars().count();

        if merged_len + separator_len + sentence_len <= max_length {
            merged.push_str(separator);
            merged.push_str(sentence);
            merged_len += separator_len + sentence_len;
            continue;
        }

        let remaining = max_length.saturating_sub(merged_len + separator_len);
        if remaining > MERGE_TAIL_BUDGET {
            merged.push_str(separator);
            merged.push_str(&safe_truncate(sentence, remaining));
        }
        break;
    }

    merged
}
