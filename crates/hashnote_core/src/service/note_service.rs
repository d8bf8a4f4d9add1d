//! Note use-case service.
//!
//! # Responsibility
//! - Create, update, archive and delete notes.
//! - Derive each note's tag set from its markup on save.
//! - Keep the tag catalog in step through per-save deltas.
//!
//! # Invariants
//! - A note write and its tag delta commit in one transaction.
//! - Blank notes (title and content empty after trim) are never stored.
//! - Archiving changes neither tags nor `modified_at`.

use crate::db::{DbError, Store};
use crate::model::note::{Note, NoteId};
use crate::model::tag::TagDelta;
use crate::model::time::now_millis;
use crate::repo::note_repo::{NoteListQuery, NoteRepository, SqliteNoteRepository};
use crate::repo::tag_repo::SqliteTagRepository;
use crate::repo::RepoError;
use crate::search::query::has_all_tags;
use crate::search::SearchQuery;
use crate::service::tag_service::apply_delta;
use crate::tags::extract_note_tags;
use log::{debug, info, warn};
use rusqlite::TransactionBehavior;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for note use-cases.
#[derive(Debug)]
pub enum NoteServiceError {
    /// Title and content are both blank.
    EmptyNote,
    NoteNotFound(NoteId),
    StoreUnavailable,
    Repo(RepoError),
    /// Write succeeded but the read-back did not find the row.
    InconsistentState(&'static str),
}

impl NoteServiceError {
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable)
    }
}

impl Display for NoteServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyNote => write!(f, "note has no title and no content"),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::StoreUnavailable => write!(f, "note store is not open"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent note state: {details}"),
        }
    }
}

impl Error for NoteServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for NoteServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Db(DbError::StoreUnavailable) => Self::StoreUnavailable,
            RepoError::NotFound(id) => Self::NoteNotFound(NoteId::from(id)),
            other => Self::Repo(other),
        }
    }
}

impl From<DbError> for NoteServiceError {
    fn from(value: DbError) -> Self {
        RepoError::from(value).into()
    }
}

impl From<rusqlite::Error> for NoteServiceError {
    fn from(value: rusqlite::Error) -> Self {
        RepoError::from(value).into()
    }
}

/// A persisted note plus the tag change that was applied with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedNote {
    pub note: Note,
    pub old_tags: BTreeSet<String>,
    pub new_tags: BTreeSet<String>,
}

impl SavedNote {
    pub fn delta(&self) -> TagDelta {
        TagDelta::between(&self.old_tags, &self.new_tags)
    }
}

/// List filter used by the note list view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteFilter {
    pub archived: bool,
    /// Every listed tag must be present.
    pub tags: Vec<String>,
}

impl NoteFilter {
    pub fn active() -> Self {
        Self::default()
    }

    pub fn archived() -> Self {
        Self {
            archived: true,
            tags: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Note use-case service over an open store.
pub struct NoteService<'s> {
    store: &'s mut Store,
}

impl<'s> NoteService<'s> {
    pub fn new(store: &'s mut Store) -> Self {
        Self { store }
    }

    /// Creates a note with a fresh id and both timestamps set to now.
    pub fn create_note(
        &mut self,
        title: &str,
        content: &str,
    ) -> Result<SavedNote, NoteServiceError> {
        if Note::is_blank(title, content) {
            debug!("event=note_create module=note_service status=skip reason=blank");
            return Err(NoteServiceError::EmptyNote);
        }

        let now = now_millis();
        let new_tags = extract_note_tags(title, content);
        let note = Note {
            id: NoteId::generate(),
            title: title.to_string(),
            content: content.to_string(),
            tags: new_tags.iter().cloned().collect(),
            created_at: Some(now),
            modified_at: Some(now),
            archived: false,
        };

        let tx = self
            .store
            .connection_mut()?
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let notes = SqliteNoteRepository::try_new(&tx)?;
            let tags = SqliteTagRepository::try_new(&tx)?;
            notes.insert_note(&note)?;
            apply_delta(
                &tags,
                &TagDelta::between(&BTreeSet::new(), &new_tags),
                &mut rand::thread_rng(),
            )?;
        }
        tx.commit()?;

        info!(
            "event=note_create module=note_service status=ok tags={}",
            new_tags.len()
        );
        Ok(SavedNote {
            note,
            old_tags: BTreeSet::new(),
            new_tags,
        })
    }

    /// Replaces title and content, re-derives tags and bumps `modified_at`.
    ///
    /// A note without `created_at` gets it backfilled to now, logged once.
    pub fn update_note(
        &mut self,
        id: &NoteId,
        title: &str,
        content: &str,
    ) -> Result<SavedNote, NoteServiceError> {
        if Note::is_blank(title, content) {
            debug!("event=note_update module=note_service status=skip reason=blank");
            return Err(NoteServiceError::EmptyNote);
        }

        let tx = self
            .store
            .connection_mut()?
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let saved = {
            let notes = SqliteNoteRepository::try_new(&tx)?;
            let tags = SqliteTagRepository::try_new(&tx)?;
            let existing = notes
                .get_note(id)?
                .ok_or_else(|| NoteServiceError::NoteNotFound(id.clone()))?;

            let now = now_millis();
            let created_at = match existing.created_at {
                Some(value) => value,
                None => {
                    warn!(
                        "event=note_created_at_backfill module=note_service status=ok reason=missing"
                    );
                    now
                }
            };
            let old_tags = existing.tag_set();
            let new_tags = extract_note_tags(title, content);
            let note = Note {
                id: existing.id,
                title: title.to_string(),
                content: content.to_string(),
                tags: new_tags.iter().cloned().collect(),
                created_at: Some(created_at),
                modified_at: Some(now),
                archived: existing.archived,
            };
            notes.update_note(&note)?;
            apply_delta(
                &tags,
                &TagDelta::between(&old_tags, &new_tags),
                &mut rand::thread_rng(),
            )?;
            SavedNote {
                note,
                old_tags,
                new_tags,
            }
        };
        tx.commit()?;

        let delta = saved.delta();
        info!(
            "event=note_update module=note_service status=ok tags_added={} tags_removed={}",
            delta.added.len(),
            delta.removed.len()
        );
        Ok(saved)
    }

    /// Flips the archived flag without touching tags or counts.
    pub fn set_archived(
        &mut self,
        id: &NoteId,
        archived: bool,
    ) -> Result<Note, NoteServiceError> {
        let repo = SqliteNoteRepository::try_new(self.store.connection()?)?;
        repo.set_archived(id, archived)?;
        let note = repo
            .get_note(id)?
            .ok_or(NoteServiceError::InconsistentState("archived note missing after write"))?;
        info!("event=note_archive module=note_service status=ok archived={archived}");
        Ok(note)
    }

    /// Deletes a note and decrements its tags. Returns the removed tag set.
    pub fn delete_note(&mut self, id: &NoteId) -> Result<BTreeSet<String>, NoteServiceError> {
        let tx = self
            .store
            .connection_mut()?
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let removed = {
            let notes = SqliteNoteRepository::try_new(&tx)?;
            let tags = SqliteTagRepository::try_new(&tx)?;
            let existing = notes
                .get_note(id)?
                .ok_or_else(|| NoteServiceError::NoteNotFound(id.clone()))?;
            let old_tags = existing.tag_set();
            notes.delete_note(id)?;
            apply_delta(
                &tags,
                &TagDelta::between(&old_tags, &BTreeSet::new()),
                &mut rand::thread_rng(),
            )?;
            old_tags
        };
        tx.commit()?;

        info!(
            "event=note_delete module=note_service status=ok tags_removed={}",
            removed.len()
        );
        Ok(removed)
    }

    pub fn get_note(&self, id: &NoteId) -> Result<Option<Note>, NoteServiceError> {
        let repo = SqliteNoteRepository::try_new(self.store.connection()?)?;
        Ok(repo.get_note(id)?)
    }

    /// Lists notes in scope, newest first, narrowed by tag filter.
    pub fn list_notes(&self, filter: &NoteFilter) -> Result<Vec<Note>, NoteServiceError> {
        let repo = SqliteNoteRepository::try_new(self.store.connection()?)?;
        let query = if filter.archived {
            NoteListQuery::archived()
        } else {
            NoteListQuery::active()
        };
        let mut notes = repo.list_notes(&query)?;
        notes.retain(|note| has_all_tags(note, &filter.tags));
        Ok(notes)
    }

    /// Searches the active or archived notes.
    pub fn search(&self, query: &SearchQuery) -> Result<Vec<Note>, NoteServiceError> {
        let predicate = query.predicate();
        let filter = NoteFilter {
            archived: query.archived,
            tags: query.tags.clone(),
        };
        let mut notes = self.list_notes(&filter)?;
        notes.retain(|note| predicate.matches(note));
        debug!(
            "event=note_search module=note_service status=ok hits={}",
            notes.len()
        );
        Ok(notes)
    }
}
