//! Explicit store handle injected into every service.
//!
//! # Responsibility
//! - Own the process' SQLite connection for one notes profile.
//! - Make open/close an explicit lifecycle instead of global state.
//!
//! # Invariants
//! - After `close()` every accessor fails with `DbError::StoreUnavailable`.
//! - `reset()` removes all notes and tags but keeps the schema.

use super::migrations::current_user_version;
use super::{open_db, open_db_in_memory, DbError, DbResult};
use log::{info, warn};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// Handle over the embedded notes database.
pub struct Store {
    conn: Option<Connection>,
    location: Option<PathBuf>,
}

impl Store {
    /// Opens (creating if needed) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let location = path.as_ref().to_path_buf();
        let conn = open_db(&location)?;
        Ok(Self {
            conn: Some(conn),
            location: Some(location),
        })
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self {
            conn: Some(open_db_in_memory()?),
            location: None,
        })
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Some(conn),
            location: None,
        }
    }

    /// File location, `None` for in-memory stores.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Borrows the live connection.
    pub fn connection(&self) -> DbResult<&Connection> {
        self.conn.as_ref().ok_or(DbError::StoreUnavailable)
    }

    /// Mutably borrows the live connection (needed to start transactions).
    pub fn connection_mut(&mut self) -> DbResult<&mut Connection> {
        self.conn.as_mut().ok_or(DbError::StoreUnavailable)
    }

    /// Schema version of the open database.
    pub fn schema_version(&self) -> DbResult<u32> {
        current_user_version(self.connection()?)
    }

    /// Closes the connection. Closing an already closed store is a no-op.
    pub fn close(&mut self) -> DbResult<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        match conn.close() {
            Ok(()) => {
                info!("event=db_close module=db status=ok");
                Ok(())
            }
            Err((conn, err)) => {
                warn!("event=db_close module=db status=error error={err}");
                self.conn = Some(conn);
                Err(err.into())
            }
        }
    }

    /// Deletes every note and tag in one transaction.
    pub fn reset(&mut self) -> DbResult<()> {
        let tx = self.connection_mut()?.transaction()?;
        let notes = tx.execute("DELETE FROM notes;", [])?;
        let tags = tx.execute("DELETE FROM tags;", [])?;
        tx.commit()?;
        info!("event=db_reset module=db status=ok notes_removed={notes} tags_removed={tags}");
        Ok(())
    }
}
