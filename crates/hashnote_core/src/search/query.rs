//! Search query parsing and matching.
//!
//! # Invariants
//! - `date:YYYY-MM-DD` and `created:YYYY-MM-DD` match notes created on that
//!   local calendar day; every other input is a case-insensitive substring
//!   match over title and plain-text content.
//! - Embedded `data:` payloads never participate in text matching.
//! - An empty query matches everything in scope.

use crate::markup::{strip_embedded_data, to_plain_text};
use crate::model::note::Note;
use crate::model::tag::normalize_tag;
use chrono::{Local, NaiveDate, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;

static DATE_QUERY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:date|created):(\d{4})-(\d{1,2})-(\d{1,2})$").expect("valid date query regex")
});

/// What a single search box input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchPredicate {
    /// Empty input.
    All,
    /// Lowercased substring.
    Text(String),
    /// Created on this local day.
    CreatedOn(NaiveDate),
    /// Date syntax with an impossible calendar date.
    Unsatisfiable,
}

impl SearchPredicate {
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::All;
        }

        let lowered = trimmed.to_lowercase();
        if let Some(caps) = DATE_QUERY_RE.captures(&lowered) {
            let year = caps[1].parse::<i32>().ok();
            let month = caps[2].parse::<u32>().ok();
            let day = caps[3].parse::<u32>().ok();
            return match (year, month, day) {
                (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y, m, d)
                    .map(Self::CreatedOn)
                    .unwrap_or(Self::Unsatisfiable),
                _ => Self::Unsatisfiable,
            };
        }
        Self::Text(lowered)
    }

    pub fn matches(&self, note: &Note) -> bool {
        match self {
            Self::All => true,
            Self::Unsatisfiable => false,
            Self::CreatedOn(day) => note.created_at.and_then(local_day) == Some(*day),
            Self::Text(term) => searchable_text(note).contains(term.as_str()),
        }
    }
}

/// A search request: predicate text, archive scope and required tags.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchQuery {
    pub text: String,
    /// Searches archived notes instead of active ones.
    pub archived: bool,
    /// Every listed tag must be present on a match.
    pub tags: Vec<String>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn in_archive(mut self) -> Self {
        self.archived = true;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = tags
            .into_iter()
            .filter_map(|tag| normalize_tag(tag.as_ref()))
            .collect();
        self
    }

    pub fn predicate(&self) -> SearchPredicate {
        SearchPredicate::parse(&self.text)
    }
}

/// Returns true when the note carries every required tag.
pub fn has_all_tags(note: &Note, required: &[String]) -> bool {
    if required.is_empty() {
        return true;
    }
    let present = note.tag_set();
    required
        .iter()
        .filter_map(|tag| normalize_tag(tag))
        .all(|tag| present.contains(&tag))
}

fn searchable_text(note: &Note) -> String {
    let content = to_plain_text(&strip_embedded_data(&note.content));
    format!("{} {}", note.title, content).to_lowercase()
}

fn local_day(millis: i64) -> Option<NaiveDate> {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|moment| moment.date_naive())
}
