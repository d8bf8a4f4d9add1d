//! Schema steps for the note store.
//!
//! `PRAGMA user_version` records the last step applied. Backups carry the same
//! number as `dbVersion`, so a step is never renumbered once released.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::{Connection, TransactionBehavior};

#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "notes_and_tag_counts",
        sql: include_str!("0001_init.sql"),
    },
    SchemaStep {
        version: 2,
        name: "tag_colors",
        sql: include_str!("0002_tag_colors.sql"),
    },
];

/// Schema version a freshly opened store ends up at.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Brings the store up to [`latest_version`] in one transaction.
///
/// A store written by a newer build is refused rather than touched.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from = current_user_version(conn)?;
    let latest = latest_version();
    if from > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: latest,
        });
    }
    if from == latest {
        return Ok(());
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    for step in SCHEMA_STEPS.iter().filter(|step| step.version > from) {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        debug!(
            "event=db_migrate_step module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={}",
        from, latest
    );
    Ok(())
}

/// Schema version recorded in the store file.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, current_user_version, latest_version, SCHEMA_STEPS};
    use rusqlite::Connection;
    use std::collections::BTreeSet;

    #[test]
    fn steps_are_numbered_from_one_without_gaps() {
        let versions: Vec<u32> = SCHEMA_STEPS.iter().map(|step| step.version).collect();
        let expected: Vec<u32> = (1..=latest_version()).collect();
        assert_eq!(versions, expected);

        let names: BTreeSet<&str> = SCHEMA_STEPS.iter().map(|step| step.name).collect();
        assert_eq!(names.len(), SCHEMA_STEPS.len());
    }

    #[test]
    fn tag_colors_arrive_with_version_two() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_STEPS[0].sql).unwrap();
        conn.pragma_update(None, "user_version", 1).unwrap();
        conn.execute("INSERT INTO tags (name, count) VALUES ('work', 3);", [])
            .unwrap();

        apply_migrations(&mut conn).unwrap();
        assert_eq!(current_user_version(&conn).unwrap(), 2);

        let (count, color): (u32, String) = conn
            .query_row("SELECT count, color FROM tags WHERE name = 'work';", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(count, 3);
        let rgb = crate::tags::color::parse_hex_color(&color).unwrap();
        assert!(rgb.0 >= 200 && rgb.1 >= 200 && rgb.2 >= 200);
    }
}
