//! Tag catalog repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Plain CRUD over the `tags` table.
//!
//! # Invariants
//! - `put_tag` writes exactly the given name/count/color; count bookkeeping
//!   and read-modify-write of colors belong to the tag service.
//! - Catalog listing is sorted by name.

use crate::model::tag::Tag;
use crate::repo::{ensure_table_columns, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const TAG_COLUMNS: &[&str] = &["name", "count", "color"];

/// Repository interface for tag catalog operations.
pub trait TagRepository {
    fn get_tag(&self, name: &str) -> RepoResult<Option<Tag>>;
    fn list_tags(&self) -> RepoResult<Vec<Tag>>;
    /// Inserts or replaces one row.
    fn put_tag(&self, tag: &Tag) -> RepoResult<()>;
    /// Returns whether a row was removed.
    fn delete_tag(&self, name: &str) -> RepoResult<bool>;
    /// Removes every row, returning how many were deleted.
    fn clear_tags(&self) -> RepoResult<usize>;
    /// All assigned colors, used for uniqueness checks.
    fn list_colors(&self) -> RepoResult<Vec<String>>;
}

/// SQLite-backed tag repository.
pub struct SqliteTagRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTagRepository<'conn> {
    /// Constructs a repository after verifying the tags schema.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_table_columns(conn, "tags", TAG_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl TagRepository for SqliteTagRepository<'_> {
    fn get_tag(&self, name: &str) -> RepoResult<Option<Tag>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, count, color FROM tags WHERE name = ?1;")?;
        let mut rows = stmt.query([name])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_tag_row(row)?));
        }
        Ok(None)
    }

    fn list_tags(&self) -> RepoResult<Vec<Tag>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, count, color FROM tags ORDER BY name ASC;")?;
        let mut rows = stmt.query([])?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            tags.push(parse_tag_row(row)?);
        }
        Ok(tags)
    }

    fn put_tag(&self, tag: &Tag) -> RepoResult<()> {
        if tag.name.trim().is_empty() {
            return Err(RepoError::InvalidData("tag name must not be empty".to_string()));
        }
        self.conn.execute(
            "INSERT INTO tags (name, count, color) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET
                count = excluded.count,
                color = excluded.color;",
            params![tag.name.as_str(), tag.count, tag.color.as_deref()],
        )?;
        Ok(())
    }

    fn delete_tag(&self, name: &str) -> RepoResult<bool> {
        let changed = self.conn.execute("DELETE FROM tags WHERE name = ?1;", [name])?;
        Ok(changed > 0)
    }

    fn clear_tags(&self) -> RepoResult<usize> {
        Ok(self.conn.execute("DELETE FROM tags;", [])?)
    }

    fn list_colors(&self) -> RepoResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT color FROM tags WHERE color IS NOT NULL AND color <> '' ORDER BY name ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut colors = Vec::new();
        while let Some(row) = rows.next()? {
            colors.push(row.get(0)?);
        }
        Ok(colors)
    }
}

fn parse_tag_row(row: &Row<'_>) -> RepoResult<Tag> {
    let name: String = row.get("name")?;
    let raw_count: i64 = row.get("count")?;
    let count = u32::try_from(raw_count).map_err(|_| {
        RepoError::InvalidData(format!("invalid count `{raw_count}` for tag `{name}`"))
    })?;
    let color: Option<String> = row.get("color")?;
    Ok(Tag {
        name,
        count,
        color: color.filter(|value| !value.trim().is_empty()),
    })
}
