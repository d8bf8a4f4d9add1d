//! Process configuration resolved from the environment.
//!
//! | variable                     | default                         |
//! |------------------------------|---------------------------------|
//! | `HASHNOTE_DB_PATH`           | `<temp dir>/hashnote.sqlite3`   |
//! | `HASHNOTE_LOG_LEVEL`         | `debug` (debug) / `info`        |
//! | `HASHNOTE_LOG_DIR`           | unset: file logging disabled    |
//! | `HASHNOTE_IMPORT_BATCH_SIZE` | `25`, minimum `1`               |
//!
//! Blank values count as unset. Unparseable batch sizes fall back to the
//! default with a warning.

use crate::backup::IMPORT_BATCH_SIZE;
use crate::logging::default_log_level;
use log::warn;
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "HASHNOTE_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "HASHNOTE_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "HASHNOTE_LOG_DIR";
pub const IMPORT_BATCH_SIZE_ENV: &str = "HASHNOTE_IMPORT_BATCH_SIZE";

const DEFAULT_DB_FILE_NAME: &str = "hashnote.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    pub import_batch_size: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            log_level: default_log_level().to_string(),
            log_dir: None,
            import_batch_size: IMPORT_BATCH_SIZE,
        }
    }
}

impl CoreConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through an arbitrary lookup; used by tests.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(path) = read(DB_PATH_ENV) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(level) = read(LOG_LEVEL_ENV) {
            config.log_level = level;
        }
        config.log_dir = read(LOG_DIR_ENV).map(PathBuf::from);
        if let Some(raw) = read(IMPORT_BATCH_SIZE_ENV) {
            match raw.parse::<usize>() {
                Ok(size) => config.import_batch_size = size.max(1),
                Err(_) => warn!(
                    "event=config_load module=config status=fallback key={IMPORT_BATCH_SIZE_ENV}"
                ),
            }
        }
        config
    }
}
