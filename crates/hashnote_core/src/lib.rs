//! Core of Hashnote: notes, hashtags and backups on a local SQLite store.
//! This crate is the single source of truth for note and tag invariants.

pub mod backup;
pub mod config;
pub mod db;
pub mod logging;
pub mod markup;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;
pub mod tags;

pub use backup::{
    BackupCodec, BackupDocument, BackupError, ImportOutcome, ImportReport, ImportSession,
    NewerVersionWarning, APP_VERSION, IMPORT_BATCH_SIZE,
};
pub use config::CoreConfig;
pub use db::{DbError, Store};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::note::{Note, NoteId};
pub use model::tag::{Tag, TagDelta};
pub use repo::{RepoError, RepoResult};
pub use search::{SearchPredicate, SearchQuery};
pub use service::note_service::{NoteFilter, NoteService, NoteServiceError, SavedNote};
pub use service::tag_service::{CreatedTag, RepairReport, TagService, TagServiceError};
pub use tags::{extract, extract_note_tags};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
