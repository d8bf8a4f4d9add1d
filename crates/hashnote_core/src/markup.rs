//! Plain-text projection of note markup.
//!
//! Note content is an HTML fragment produced by the editor. Core never renders
//! it; it only needs a text view for tag extraction and search.

use once_cell::sync::Lazy;
use regex::Regex;

static BLOCK_BOUNDARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</?(?:div|p|h[1-6])(?:\s[^>]*)?>").expect("valid block regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid markup tag regex"));
static DATA_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)data:[^"'\s)>]*"#).expect("valid data url regex"));

/// Converts markup to text, turning block boundaries into whitespace so words
/// on adjacent lines never merge.
pub fn to_plain_text(markup: &str) -> String {
    let spaced = BLOCK_BOUNDARY_RE.replace_all(markup, " ");
    let stripped = TAG_RE.replace_all(&spaced, "");
    decode_entities(&stripped)
}

/// Removes embedded `data:` payloads (inline images) before text matching.
pub fn strip_embedded_data(markup: &str) -> String {
    DATA_URL_RE.replace_all(markup, "").into_owned()
}

/// Whether a single markup tag breaks the line (`<br>`, `<div>`, `<p>`, headings).
pub fn is_block_boundary(tag: &str) -> bool {
    BLOCK_BOUNDARY_RE
        .find(tag)
        .is_some_and(|found| found.start() == 0 && found.end() == tag.len())
}

/// Splits markup into `(is_markup, segment)` pieces in document order.
pub fn segments(markup: &str) -> Vec<(bool, &str)> {
    let mut pieces = Vec::new();
    let mut cursor = 0;
    for found in TAG_RE.find_iter(markup) {
        if found.start() > cursor {
            pieces.push((false, &markup[cursor..found.start()]));
        }
        pieces.push((true, found.as_str()));
        cursor = found.end();
    }
    if cursor < markup.len() {
        pieces.push((false, &markup[cursor..]));
    }
    pieces
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
