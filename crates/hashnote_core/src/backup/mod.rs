//! Backup export and import.
//!
//! # Responsibility
//! - Serialize every note and catalog row into one JSON document.
//! - Import documents from older versions through ordered migrations.
//! - Leave the catalog consistent with the imported notes.
//!
//! # Invariants
//! - Import upserts by note id and never deletes existing notes.
//! - Each batch commits its notes and their tag deltas together.
//! - A malformed record is counted and skipped; the rest still import.

pub mod codec;
pub mod document;
pub mod migrate;
pub mod version;

pub use codec::{BackupCodec, BatchProgress, ImportOutcome, ImportReport, ImportSession};
pub use document::BackupDocument;
pub use version::{check_compatibility, AppVersion, NewerVersionWarning, APP_VERSION};

use crate::db::DbError;
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Notes written per import transaction.
pub const IMPORT_BATCH_SIZE: usize = 25;

#[derive(Debug)]
pub enum BackupError {
    /// Not a JSON object with a `notes` array.
    InvalidBackupFormat(String),
    StoreUnavailable,
    Repo(RepoError),
    Json(serde_json::Error),
}

impl BackupError {
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable)
    }
}

impl Display for BackupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBackupFormat(details) => write!(f, "invalid backup format: {details}"),
            Self::StoreUnavailable => write!(f, "note store is not open"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "backup serialization failed: {err}"),
        }
    }
}

impl Error for BackupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for BackupError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Db(DbError::StoreUnavailable) => Self::StoreUnavailable,
            other => Self::Repo(other),
        }
    }
}

impl From<DbError> for BackupError {
    fn from(value: DbError) -> Self {
        RepoError::from(value).into()
    }
}

impl From<rusqlite::Error> for BackupError {
    fn from(value: rusqlite::Error) -> Self {
        RepoError::from(value).into()
    }
}
