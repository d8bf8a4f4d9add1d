//! Hashtag extraction.
//!
//! # Invariants
//! - Pure and deterministic: same markup, same set.
//! - A token is `#` + `[A-Za-z0-9_]+` not followed by another word character.
//!   Punctuation, `#`, whitespace and end of text all terminate a token, so
//!   `#tag.` yields `tag` and `#tag#tag2` yields both `tag` and `tag2`.
//! - Results are lowercase and deduplicated.

use crate::markup::to_plain_text;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static HASHTAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#([A-Za-z0-9_]+)").expect("valid hashtag regex"));
static TAG_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid tag name regex"));

/// Extracts the canonical tag set from markup.
pub fn extract(markup: &str) -> BTreeSet<String> {
    let text = to_plain_text(markup);
    let mut tags = BTreeSet::new();
    for caps in HASHTAG_RE.captures_iter(&text) {
        let Some(name) = caps.get(1) else {
            continue;
        };
        if text[name.end()..].chars().next().is_some_and(is_word_char) {
            continue;
        }
        tags.insert(name.as_str().to_lowercase());
    }
    tags
}

/// Tags of a whole note: content and title combined.
pub fn extract_note_tags(title: &str, content: &str) -> BTreeSet<String> {
    let mut tags = extract(content);
    tags.extend(extract(title));
    tags
}

/// Returns whether `name` can be used as an explicit tag name.
pub fn is_valid_tag_name(name: &str) -> bool {
    TAG_NAME_RE.is_match(name)
}

pub(crate) fn is_word_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}
