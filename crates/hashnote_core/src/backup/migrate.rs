//! Backup schema migrations.
//!
//! # Invariants
//! - Steps run in ascending version order.
//! - A step runs when the backup's `appVersion` is older than the step's
//!   version; a missing version counts as `0.0.0`.
//! - Steps only fill absent fields, so applying one twice changes nothing.

use super::version::AppVersion;
use super::BackupDocument;
use crate::tags::unique_color;
use log::info;
use rand::RngCore;
use serde_json::{Map, Value};

struct MigrationStep {
    version: AppVersion,
    name: &'static str,
    apply: fn(&mut BackupDocument, &mut dyn RngCore) -> usize,
}

const STEPS: &[MigrationStep] = &[
    MigrationStep {
        version: AppVersion::new(1, 0, 0),
        name: "tag_colors",
        apply: assign_missing_tag_colors,
    },
    MigrationStep {
        version: AppVersion::new(1, 2, 0),
        name: "legacy_note_fields",
        apply: rename_legacy_note_fields,
    },
];

/// Brings an older backup document up to the current shape.
///
/// Returns the names of the steps that ran.
pub fn migrate(doc: &mut BackupDocument) -> Vec<&'static str> {
    migrate_with_rng(doc, &mut rand::thread_rng())
}

pub fn migrate_with_rng(doc: &mut BackupDocument, rng: &mut dyn RngCore) -> Vec<&'static str> {
    let source = doc
        .app_version
        .as_deref()
        .map(AppVersion::parse)
        .unwrap_or_default();

    let mut applied = Vec::new();
    for step in STEPS.iter().filter(|step| source < step.version) {
        let touched = (step.apply)(doc, rng);
        info!(
            "event=backup_migrate module=backup status=ok step={} from={} records={}",
            step.name, source, touched
        );
        applied.push(step.name);
    }
    applied
}

fn assign_missing_tag_colors(doc: &mut BackupDocument, rng: &mut dyn RngCore) -> usize {
    let Some(tags) = doc.tags.as_mut() else {
        return 0;
    };

    let mut in_use: Vec<String> = tags
        .iter()
        .filter_map(|tag| tag.get("color").and_then(Value::as_str))
        .filter(|color| !color.trim().is_empty())
        .map(str::to_string)
        .collect();

    let mut touched = 0;
    for tag in tags.iter_mut().filter_map(Value::as_object_mut) {
        let has_color = tag
            .get("color")
            .and_then(Value::as_str)
            .is_some_and(|color| !color.trim().is_empty());
        if has_color {
            continue;
        }
        let color = unique_color(&in_use, rng);
        in_use.push(color.clone());
        tag.insert("color".to_string(), Value::String(color));
        touched += 1;
    }
    touched
}

fn rename_legacy_note_fields(doc: &mut BackupDocument, _rng: &mut dyn RngCore) -> usize {
    let mut touched = 0;
    for note in doc.notes.iter_mut().filter_map(Value::as_object_mut) {
        let mut changed = false;
        changed |= fill_from(note, "createdAt", &["created"]);
        changed |= fill_from(note, "modifiedAt", &["modified", "timestamp"]);
        changed |= fill_from(note, "archived", &["isArchived"]);
        if let Some(Value::Number(id)) = note.get("id") {
            let id = id.to_string();
            note.insert("id".to_string(), Value::String(id));
            changed = true;
        }
        if changed {
            touched += 1;
        }
    }
    touched
}

/// Copies the first present legacy key into `target` when `target` is absent.
fn fill_from(note: &mut Map<String, Value>, target: &str, legacy: &[&str]) -> bool {
    if note.get(target).is_some_and(|value| !value.is_null()) {
        return false;
    }
    let found = legacy
        .iter()
        .filter_map(|key| note.get(*key))
        .find(|value| !value.is_null())
        .cloned();
    match found {
        Some(value) => {
            note.insert(target.to_string(), value);
            true
        }
        None => false,
    }
}
