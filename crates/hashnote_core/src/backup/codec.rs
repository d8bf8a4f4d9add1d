//! Backup export and batched import.

use super::migrate::migrate;
use super::version::{check_compatibility, NewerVersionWarning, APP_VERSION};
use super::{BackupDocument, BackupError, IMPORT_BATCH_SIZE};
use crate::db::Store;
use crate::model::note::Note;
use crate::model::tag::{normalize_tag, Tag, TagDelta};
use crate::model::time::now_rfc3339;
use crate::repo::note_repo::{NoteListQuery, NoteRepository, SqliteNoteRepository};
use crate::repo::tag_repo::{SqliteTagRepository, TagRepository};
use crate::repo::{RepoError, RepoResult};
use crate::service::tag_service::{apply_delta, recompute_with, RepairReport};
use log::{info, warn};
use rand::Rng;
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

/// Summary of a finished import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub total: usize,
    pub imported: usize,
    /// Malformed records that were skipped.
    pub failed: usize,
    pub source_version: Option<String>,
    pub migrations: Vec<String>,
    /// Catalog rows taken from the backup, when it carried a catalog.
    pub tags_replaced: Option<usize>,
    /// Backup catalog rows with no referencing note, kept at count zero.
    pub unused_tags_kept: usize,
    pub repair: RepairReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Completed(ImportReport),
    /// The backup is newer and the caller declined; nothing was written.
    Declined(NewerVersionWarning),
}

/// Progress after one committed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub processed: usize,
    pub total: usize,
    pub imported: usize,
    pub failed: usize,
}

/// Exports and imports whole-store backups.
pub struct BackupCodec<'s> {
    store: &'s mut Store,
    batch_size: usize,
}

impl<'s> BackupCodec<'s> {
    pub fn new(store: &'s mut Store) -> Self {
        Self {
            store,
            batch_size: IMPORT_BATCH_SIZE,
        }
    }

    /// Overrides the import batch size; values below 1 become 1.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Snapshots every note and catalog row.
    pub fn export(&mut self) -> Result<BackupDocument, BackupError> {
        let db_version = self.store.schema_version()?;
        let tx = self.store.connection_mut()?.transaction()?;
        let (notes, tags) = {
            let notes = SqliteNoteRepository::try_new(&tx)?.list_notes(&NoteListQuery::all())?;
            let tags = SqliteTagRepository::try_new(&tx)?.list_tags()?;
            (notes, tags)
        };
        tx.commit()?;

        let stamp = now_rfc3339();
        let doc = BackupDocument {
            notes: notes
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<_, _>>()
                .map_err(BackupError::Json)?,
            tags: Some(
                tags.iter()
                    .map(serde_json::to_value)
                    .collect::<Result<_, _>>()
                    .map_err(BackupError::Json)?,
            ),
            export_date: Some(stamp.clone()),
            app_version: Some(APP_VERSION.to_string()),
            db_version: Some(db_version),
            version_timestamp: Some(stamp),
        };
        info!(
            "event=backup_export module=backup status=ok notes={} tags={}",
            notes.len(),
            tags.len()
        );
        Ok(doc)
    }

    pub fn export_json(&mut self) -> Result<String, BackupError> {
        self.export()?.to_json_pretty()
    }

    /// Imports a backup to completion.
    ///
    /// When the backup is newer than this build, `confirm` decides whether to
    /// go on; declining writes nothing.
    pub fn import<F>(
        &mut self,
        doc: BackupDocument,
        confirm: F,
    ) -> Result<ImportOutcome, BackupError>
    where
        F: FnOnce(&NewerVersionWarning) -> bool,
    {
        if let Some(warning) = check_compatibility(doc.app_version.as_deref()) {
            warn!(
                "event=backup_import module=backup status=newer_version backup_version={}",
                warning.backup_version
            );
            if !confirm(&warning) {
                info!("event=backup_import module=backup status=declined");
                return Ok(ImportOutcome::Declined(warning));
            }
        }
        let report = self.begin_import(doc).finish()?;
        Ok(ImportOutcome::Completed(report))
    }

    /// Parses then imports backup text.
    pub fn import_json<F>(&mut self, text: &str, confirm: F) -> Result<ImportOutcome, BackupError>
    where
        F: FnOnce(&NewerVersionWarning) -> bool,
    {
        let doc = BackupDocument::from_json(text)?;
        self.import(doc, confirm)
    }

    /// Migrates the document and returns a session that imports one batch
    /// per `next_batch` call.
    ///
    /// Dropping the session stops the import between batches; committed
    /// batches stay and the catalog keeps delta-maintained counts.
    pub fn begin_import(&mut self, mut doc: BackupDocument) -> ImportSession<'_> {
        let migrations = migrate(&mut doc)
            .into_iter()
            .map(str::to_string)
            .collect();
        ImportSession {
            store: &mut *self.store,
            batch_size: self.batch_size,
            source_version: doc.app_version,
            migrations,
            notes: doc.notes,
            tags: doc.tags,
            cursor: 0,
            imported: 0,
            failed: 0,
            started_at: Instant::now(),
        }
    }
}

/// An in-progress import.
pub struct ImportSession<'s> {
    store: &'s mut Store,
    batch_size: usize,
    source_version: Option<String>,
    migrations: Vec<String>,
    notes: Vec<Value>,
    tags: Option<Vec<Value>>,
    cursor: usize,
    imported: usize,
    failed: usize,
    started_at: Instant,
}

impl ImportSession<'_> {
    pub fn total(&self) -> usize {
        self.notes.len()
    }

    pub fn is_drained(&self) -> bool {
        self.cursor >= self.notes.len()
    }

    /// Imports the next batch in one transaction.
    ///
    /// Returns `None` once every note record has been processed.
    pub fn next_batch(&mut self) -> Result<Option<BatchProgress>, BackupError> {
        if self.is_drained() {
            return Ok(None);
        }
        let end = (self.cursor + self.batch_size).min(self.notes.len());
        let mut rng = rand::thread_rng();
        let mut imported = 0;
        let mut failed = 0;

        let mut tx = self
            .store
            .connection_mut()?
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        for raw in &self.notes[self.cursor..end] {
            let savepoint = tx.savepoint()?;
            match import_record(&savepoint, raw, &mut rng) {
                Ok(()) => {
                    savepoint.commit()?;
                    imported += 1;
                }
                // the savepoint drops here: rolled back and released, batch goes on
                Err(RepoError::InvalidData(reason)) => {
                    warn!(
                        "event=backup_import_record module=backup status=skip reason={}",
                        reason.replace(['\n', '\r'], " ")
                    );
                    failed += 1;
                }
                Err(other) => return Err(other.into()),
            }
        }
        tx.commit()?;

        self.cursor = end;
        self.imported += imported;
        self.failed += failed;
        let progress = BatchProgress {
            processed: self.cursor,
            total: self.notes.len(),
            imported: self.imported,
            failed: self.failed,
        };
        info!(
            "event=backup_import_batch module=backup status=ok processed={} total={} failed={}",
            progress.processed, progress.total, progress.failed
        );
        Ok(Some(progress))
    }

    /// Imports the remaining batches, replaces the catalog when the backup
    /// carries one, then reconciles counts against the imported notes.
    pub fn finish(mut self) -> Result<ImportReport, BackupError> {
        while self.next_batch()?.is_some() {}

        let backup_tags = self.tags.take();
        let tx = self
            .store
            .connection_mut()?
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let (tags_replaced, unused_tags_kept, repair) = {
            let notes = SqliteNoteRepository::try_new(&tx)?;
            let tags = SqliteTagRepository::try_new(&tx)?;

            let mut restored = Vec::new();
            if let Some(raw_tags) = &backup_tags {
                tags.clear_tags()?;
                for raw in raw_tags {
                    match parse_backup_tag(raw) {
                        Some(tag) => {
                            tags.put_tag(&tag)?;
                            restored.push(tag);
                        }
                        None => warn!(
                            "event=backup_import_tag module=backup status=skip reason=malformed"
                        ),
                    }
                }
            }

            let repair = recompute_with(&notes, &tags)?;
            let mut kept = 0;
            for tag in &restored {
                if tags.get_tag(&tag.name)?.is_none() {
                    tags.put_tag(&tag.clone().with_count(0))?;
                    kept += 1;
                }
            }
            (backup_tags.as_ref().map(|_| restored.len()), kept, repair)
        };
        tx.commit()?;

        let report = ImportReport {
            total: self.notes.len(),
            imported: self.imported,
            failed: self.failed,
            source_version: self.source_version,
            migrations: self.migrations,
            tags_replaced,
            unused_tags_kept,
            repair,
        };
        info!(
            "event=backup_import module=backup status=ok imported={} failed={} tags_repaired={} duration_ms={}",
            report.imported,
            report.failed,
            report.repair.tags_repaired,
            self.started_at.elapsed().as_millis()
        );
        Ok(report)
    }
}

fn import_record<R>(conn: &Connection, raw: &Value, rng: &mut R) -> RepoResult<()>
where
    R: Rng + ?Sized,
{
    let note = Note::deserialize(raw).map_err(|err| RepoError::InvalidData(err.to_string()))?;
    note.validate()
        .map_err(|err| RepoError::InvalidData(err.to_string()))?;

    let notes = SqliteNoteRepository::try_new(conn)?;
    let tags = SqliteTagRepository::try_new(conn)?;
    let old_tags = notes
        .get_note(&note.id)?
        .map(|existing| existing.tag_set())
        .unwrap_or_default();
    notes.upsert_note(&note)?;
    apply_delta(&tags, &TagDelta::between(&old_tags, &note.tag_set()), rng)
}

fn parse_backup_tag(raw: &Value) -> Option<Tag> {
    let mut tag = Tag::deserialize(raw).ok()?;
    tag.name = normalize_tag(&tag.name)?;
    tag.color = tag.color.filter(|color| !color.trim().is_empty());
    Some(tag)
}
