//! Note domain model.
//!
//! # Responsibility
//! - Define the canonical note record shared by storage, UI and backups.
//! - Provide identity and validation helpers.
//!
//! # Invariants
//! - `id` is stable and never reused for another note.
//! - `tags` equals the canonical extraction of `title` + `content` at last save.
//! - `created_at` is written once; `None` only for legacy/corrupt rows.

use super::tag::normalize_tags;
use super::time::parse_timestamp_json;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable note identifier.
///
/// New notes get a UUID v4; ids from legacy backups are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Generates a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NoteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Validation error for note records coming from untrusted sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteValidationError {
    EmptyId,
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "note id must not be empty"),
        }
    }
}

impl Error for NoteValidationError {}

/// Canonical note record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    #[serde(default)]
    pub title: String,
    /// Rich text markup; opaque to core beyond tag extraction and search.
    #[serde(default)]
    pub content: String,
    /// Tag names as stored. Canonical after any save or repair.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Epoch milliseconds.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<i64>,
    /// Epoch milliseconds of the last save.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub modified_at: Option<i64>,
    #[serde(default)]
    pub archived: bool,
}

impl Note {
    /// Returns true when title and content are both blank after trimming.
    pub fn is_blank(title: &str, content: &str) -> bool {
        title.trim().is_empty() && content.trim().is_empty()
    }

    /// Canonical tag set of the stored tag list.
    pub fn tag_set(&self) -> BTreeSet<String> {
        normalize_tags(&self.tags).into_iter().collect()
    }

    pub fn validate(&self) -> Result<(), NoteValidationError> {
        if self.id.as_str().trim().is_empty() {
            return Err(NoteValidationError::EmptyId);
        }
        Ok(())
    }

    /// Ordering key used by list views: last save, then creation.
    pub fn sort_timestamp(&self) -> i64 {
        self.modified_at.or(self.created_at).unwrap_or(0)
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_timestamp_json))
}
