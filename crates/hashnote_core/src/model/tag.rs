//! Tag domain model and canonicalization rules.
//!
//! # Invariants
//! - `name` is canonical (trimmed, lowercase) and unique.
//! - `count` equals the number of notes whose `tags` contain `name`.
//! - A tag with `count == 0` is a valid steady state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tag catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub count: u32,
    /// `#rrggbb`, `None` when no color was ever assigned.
    #[serde(default)]
    pub color: Option<String>,
}

impl Tag {
    /// Unused tag without color.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: 0,
            color: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    /// Returns whether a usable color is assigned.
    pub fn has_color(&self) -> bool {
        self.color
            .as_deref()
            .is_some_and(|color| !color.trim().is_empty())
    }
}

/// Difference between a note's previous and new tag sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagDelta {
    /// Tags to decrement.
    pub removed: BTreeSet<String>,
    /// Tags to increment or create.
    pub added: BTreeSet<String>,
}

impl TagDelta {
    pub fn between(old: &BTreeSet<String>, new: &BTreeSet<String>) -> Self {
        Self {
            removed: old.difference(new).cloned().collect(),
            added: new.difference(old).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// Normalizes one tag value.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalizes, deduplicates and sorts tag values.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut unique = BTreeSet::new();
    for tag in tags {
        if let Some(value) = normalize_tag(tag) {
            unique.insert(value);
        }
    }
    unique.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::{normalize_tags, TagDelta};
    use std::collections::BTreeSet;

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn delta_splits_removed_and_added() {
        let delta = TagDelta::between(&set(&["a", "b"]), &set(&["b", "c"]));
        assert_eq!(delta.removed, set(&["a"]));
        assert_eq!(delta.added, set(&["c"]));
        assert!(TagDelta::between(&set(&["x"]), &set(&["x"])).is_empty());
    }

    #[test]
    fn normalize_lowercases_and_dedups() {
        let raw = vec![
            "Work".to_string(),
            " work ".to_string(),
            "".to_string(),
            "Alpha".to_string(),
        ];
        assert_eq!(normalize_tags(&raw), vec!["alpha", "work"]);
    }
}
