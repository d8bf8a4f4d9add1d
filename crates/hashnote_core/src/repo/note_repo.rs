//! Note repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist the canonical `Note` record in the `notes` table.
//! - Keep JSON encoding of the tag list and timestamp decoding in one place.
//!
//! # Invariants
//! - List order is `COALESCE(modified_at, created_at, 0) DESC, id ASC`.
//! - `update_note`/`delete_note`/`set_archived` report `NotFound` instead of
//!   silently touching zero rows.

use crate::model::note::{Note, NoteId};
use crate::model::time::parse_timestamp_text;
use crate::repo::{ensure_table_columns, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    title,
    content,
    tags,
    created_at,
    modified_at,
    archived
FROM notes";

const NOTE_COLUMNS: &[&str] = &[
    "id",
    "title",
    "content",
    "tags",
    "created_at",
    "modified_at",
    "archived",
];

/// Query options for note list use-cases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoteListQuery {
    /// `Some(flag)` restricts to active/archived notes, `None` returns all.
    pub archived: Option<bool>,
}

impl NoteListQuery {
    pub fn all() -> Self {
        Self { archived: None }
    }

    pub fn active() -> Self {
        Self {
            archived: Some(false),
        }
    }

    pub fn archived() -> Self {
        Self {
            archived: Some(true),
        }
    }
}

/// Repository interface for note persistence.
pub trait NoteRepository {
    /// Inserts a new note; fails if the id already exists.
    fn insert_note(&self, note: &Note) -> RepoResult<()>;
    /// Inserts or overwrites by id.
    fn upsert_note(&self, note: &Note) -> RepoResult<()>;
    /// Overwrites an existing note.
    fn update_note(&self, note: &Note) -> RepoResult<()>;
    fn get_note(&self, id: &NoteId) -> RepoResult<Option<Note>>;
    fn delete_note(&self, id: &NoteId) -> RepoResult<()>;
    /// Changes only the archived flag.
    fn set_archived(&self, id: &NoteId, archived: bool) -> RepoResult<()>;
    /// Replaces only the stored tag list.
    fn set_note_tags(&self, id: &NoteId, tags: &[String]) -> RepoResult<()>;
    fn list_notes(&self, query: &NoteListQuery) -> RepoResult<Vec<Note>>;
}

/// SQLite-backed note repository.
///
/// Works on a plain connection or on an open transaction (via deref).
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Constructs a repository after verifying the notes schema.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_table_columns(conn, "notes", NOTE_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn insert_note(&self, note: &Note) -> RepoResult<()> {
        note.validate()
            .map_err(|err| RepoError::InvalidData(err.to_string()))?;
        self.conn.execute(
            "INSERT INTO notes (
                id,
                title,
                content,
                tags,
                created_at,
                modified_at,
                archived
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                note.id.as_str(),
                note.title.as_str(),
                note.content.as_str(),
                encode_tags(&note.tags)?,
                note.created_at,
                note.modified_at,
                note.archived,
            ],
        )?;
        Ok(())
    }

    fn upsert_note(&self, note: &Note) -> RepoResult<()> {
        note.validate()
            .map_err(|err| RepoError::InvalidData(err.to_string()))?;
        self.conn.execute(
            "INSERT INTO notes (
                id,
                title,
                content,
                tags,
                created_at,
                modified_at,
                archived
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                content = excluded.content,
                tags = excluded.tags,
                created_at = excluded.created_at,
                modified_at = excluded.modified_at,
                archived = excluded.archived;",
            params![
                note.id.as_str(),
                note.title.as_str(),
                note.content.as_str(),
                encode_tags(&note.tags)?,
                note.created_at,
                note.modified_at,
                note.archived,
            ],
        )?;
        Ok(())
    }

    fn update_note(&self, note: &Note) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notes
             SET
                title = ?2,
                content = ?3,
                tags = ?4,
                created_at = ?5,
                modified_at = ?6,
                archived = ?7
             WHERE id = ?1;",
            params![
                note.id.as_str(),
                note.title.as_str(),
                note.content.as_str(),
                encode_tags(&note.tags)?,
                note.created_at,
                note.modified_at,
                note.archived,
            ],
        )?;
        ensure_changed(changed, &note.id)
    }

    fn get_note(&self, id: &NoteId) -> RepoResult<Option<Note>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.as_str()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_note_row(row)?));
        }
        Ok(None)
    }

    fn delete_note(&self, id: &NoteId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM notes WHERE id = ?1;", [id.as_str()])?;
        ensure_changed(changed, id)
    }

    fn set_archived(&self, id: &NoteId, archived: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notes SET archived = ?2 WHERE id = ?1;",
            params![id.as_str(), archived],
        )?;
        ensure_changed(changed, id)
    }

    fn set_note_tags(&self, id: &NoteId, tags: &[String]) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notes SET tags = ?2 WHERE id = ?1;",
            params![id.as_str(), encode_tags(tags)?],
        )?;
        ensure_changed(changed, id)
    }

    fn list_notes(&self, query: &NoteListQuery) -> RepoResult<Vec<Note>> {
        let mut sql = format!("{NOTE_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(archived) = query.archived {
            sql.push_str(" AND archived = ?");
            bind_values.push(Value::Integer(i64::from(archived)));
        }

        sql.push_str(" ORDER BY COALESCE(modified_at, created_at, 0) DESC, id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
    }
}

fn ensure_changed(changed: usize, id: &NoteId) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound(id.to_string()));
    }
    Ok(())
}

fn encode_tags(tags: &[String]) -> RepoResult<String> {
    serde_json::to_string(tags)
        .map_err(|err| RepoError::InvalidData(format!("unencodable tag list: {err}")))
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let id: String = row.get("id")?;
    let tags_text: String = row.get("tags")?;
    let tags: Vec<String> = serde_json::from_str(&tags_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid tag list `{tags_text}` for note `{id}`"))
    })?;

    let archived = match row.get::<_, i64>("archived")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid archived value `{other}` for note `{id}`"
            )));
        }
    };

    Ok(Note {
        id: NoteId::from(id),
        title: row.get("title")?,
        content: row.get("content")?,
        tags,
        created_at: timestamp_column(row.get("created_at")?),
        modified_at: timestamp_column(row.get("modified_at")?),
        archived,
    })
}

/// Decodes a timestamp column that may hold legacy text or garbage.
fn timestamp_column(value: Value) -> Option<i64> {
    match value {
        Value::Integer(millis) => Some(millis),
        Value::Real(millis) if millis.is_finite() => Some(millis as i64),
        Value::Text(text) => parse_timestamp_text(&text),
        _ => None,
    }
}
