//! Domain model for notes and tags.
//!
//! # Responsibility
//! - Define the records persisted by core and exchanged with UI/backup callers.
//! - Keep tag canonicalization rules in one place.
//!
//! # Invariants
//! - Every note is identified by a stable `NoteId`.
//! - Tag names are canonical: trimmed, lowercase, deduplicated.

pub mod note;
pub mod tag;
pub mod time;
