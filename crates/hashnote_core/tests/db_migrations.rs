use hashnote_core::db::migrations::latest_version;
use hashnote_core::db::{open_db, open_db_in_memory, DbError, Store};
use hashnote_core::{NoteService, NoteServiceError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "notes");
    assert_table_exists(&conn, "tags");
    assert!(column_exists(&conn, "tags", "color"));
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hashnote.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "notes");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn upgrading_from_first_schema_assigns_colors_to_existing_tags() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v1.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(include_str!("../src/db/migrations/0001_init.sql"))
        .unwrap();
    conn.execute_batch(
        "INSERT INTO tags (name, count) VALUES ('work', 2), ('home', 0);
         PRAGMA user_version = 1;",
    )
    .unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    let mut stmt = conn
        .prepare("SELECT name, count, color FROM tags ORDER BY name;")
        .unwrap();
    let rows: Vec<(String, i64, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].0, "work");
    assert_eq!(rows[1].1, 2);
    for (_, _, color) in &rows {
        assert_eq!(color.len(), 7);
        assert!(color.starts_with('#'));
    }
}

#[test]
fn closed_store_reports_unavailable() {
    let mut store = Store::open_in_memory().unwrap();
    assert!(store.is_open());
    store.close().unwrap();
    store.close().unwrap();
    assert!(!store.is_open());
    assert!(matches!(
        store.connection(),
        Err(DbError::StoreUnavailable)
    ));

    let err = NoteService::new(&mut store)
        .create_note("title", "body")
        .unwrap_err();
    assert!(matches!(err, NoteServiceError::StoreUnavailable));
    assert!(err.is_store_unavailable());
}

#[test]
fn reset_clears_notes_and_tags_but_keeps_schema() {
    let mut store = Store::open_in_memory().unwrap();
    NoteService::new(&mut store)
        .create_note("t", "<p>#work</p>")
        .unwrap();

    store.reset().unwrap();
    let conn = store.connection().unwrap();
    let notes: i64 = conn
        .query_row("SELECT COUNT(*) FROM notes;", [], |row| row.get(0))
        .unwrap();
    let tags: i64 = conn
        .query_row("SELECT COUNT(*) FROM tags;", [], |row| row.get(0))
        .unwrap();
    assert_eq!((notes, tags), (0, 0));
    assert_eq!(store.schema_version().unwrap(), latest_version());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> bool {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table});"))
        .unwrap();
    let names: Vec<String> = stmt
        .query_map([], |row| row.get(1))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    names.iter().any(|name| name == column)
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
