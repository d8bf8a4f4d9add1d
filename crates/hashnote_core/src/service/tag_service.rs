//! Tag consistency engine.
//!
//! # Responsibility
//! - Apply per-mutation tag deltas to the catalog.
//! - Create, recolor and delete catalog rows on explicit request.
//! - Rebuild the catalog from note contents when counts drift (`recompute`).
//!
//! # Invariants
//! - After any committed operation, `tag.count` equals the number of notes
//!   whose tag set contains `tag.name`.
//! - Incremental updates never delete rows; a count of zero is kept.
//! - Only `recompute` (and the import built on it) may drop rows.
//! - Deltas run on the caller's transaction so note and counts commit together.

use crate::db::{DbError, Store};
use crate::markup::{is_block_boundary, segments};
use crate::model::note::Note;
use crate::model::tag::{normalize_tag, Tag, TagDelta};
use crate::model::time::now_millis;
use crate::repo::note_repo::{NoteListQuery, NoteRepository, SqliteNoteRepository};
use crate::repo::tag_repo::{SqliteTagRepository, TagRepository};
use crate::repo::{RepoError, RepoResult};
use crate::tags::extract::is_word_char;
use crate::tags::color::parse_hex_color;
use crate::tags::{extract_note_tags, is_valid_tag_name, unique_color};
use log::{debug, info, warn};
use rand::Rng;
use regex::Regex;
use rusqlite::TransactionBehavior;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Service error for tag use-cases.
#[derive(Debug)]
pub enum TagServiceError {
    /// Name is not `[A-Za-z0-9_]+`.
    InvalidName(String),
    /// A tag with the same case-insensitive name exists.
    AlreadyExists(String),
    /// Color is not `#rgb` or `#rrggbb`.
    InvalidColor(String),
    TagNotFound(String),
    StoreUnavailable,
    Repo(RepoError),
}

impl TagServiceError {
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable)
    }
}

impl Display for TagServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(name) => write!(
                f,
                "invalid tag name `{name}`: use letters, digits and underscores only"
            ),
            Self::AlreadyExists(name) => write!(f, "tag #{name} already exists"),
            Self::InvalidColor(color) => {
                write!(f, "invalid color `{color}`: expected #rgb or #rrggbb")
            }
            Self::TagNotFound(name) => write!(f, "tag not found: {name}"),
            Self::StoreUnavailable => write!(f, "note store is not open"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TagServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for TagServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Db(DbError::StoreUnavailable) => Self::StoreUnavailable,
            RepoError::NotFound(name) => Self::TagNotFound(name),
            other => Self::Repo(other),
        }
    }
}

impl From<DbError> for TagServiceError {
    fn from(value: DbError) -> Self {
        RepoError::from(value).into()
    }
}

impl From<rusqlite::Error> for TagServiceError {
    fn from(value: rusqlite::Error) -> Self {
        RepoError::from(value).into()
    }
}

/// Outcome of a full catalog reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    /// Catalog rows written by the rebuild.
    pub tags_repaired: usize,
    /// Notes whose stored tag list was rewritten into canonical form.
    pub notes_normalized: usize,
}

/// Result of an explicit tag creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedTag {
    pub tag: Tag,
    /// Notes rewritten by the backfill scan.
    pub notes_modified: usize,
}

/// Tag use-case service over an open store.
pub struct TagService<'s> {
    store: &'s mut Store,
}

impl<'s> TagService<'s> {
    pub fn new(store: &'s mut Store) -> Self {
        Self { store }
    }

    /// Gets one tag by case-insensitive name.
    pub fn get_tag(&self, name: &str) -> Result<Option<Tag>, TagServiceError> {
        let Some(name) = normalize_tag(name) else {
            return Ok(None);
        };
        let repo = SqliteTagRepository::try_new(self.store.connection()?)?;
        Ok(repo.get_tag(&name)?)
    }

    /// Lists the whole catalog sorted by name.
    pub fn list_tags(&self) -> Result<Vec<Tag>, TagServiceError> {
        let repo = SqliteTagRepository::try_new(self.store.connection()?)?;
        Ok(repo.list_tags()?)
    }

    /// Autocomplete candidates: names starting with `prefix`, case-insensitive.
    ///
    /// A leading `#` is ignored. Most used first, ties by name.
    pub fn suggest_tags(&self, prefix: &str) -> Result<Vec<Tag>, TagServiceError> {
        let prefix = prefix.trim().trim_start_matches('#').to_lowercase();
        let mut matches: Vec<Tag> = self
            .list_tags()?
            .into_iter()
            .filter(|tag| tag.name.to_lowercase().starts_with(&prefix))
            .collect();
        matches.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        Ok(matches)
    }

    /// Tag manager filter: names containing `term`, case-insensitive, by name.
    ///
    /// A blank term returns the whole catalog.
    pub fn find_tags(&self, term: &str) -> Result<Vec<Tag>, TagServiceError> {
        let term = term.trim().to_lowercase();
        Ok(self
            .list_tags()?
            .into_iter()
            .filter(|tag| tag.name.to_lowercase().contains(&term))
            .collect())
    }

    /// Creates a catalog row on explicit request.
    ///
    /// With `scan_and_backfill`, standalone occurrences of the word in note
    /// titles and content text are rewritten into `#name` and the affected
    /// notes are saved, all in the same transaction as the new row.
    ///
    /// # Errors
    /// - `InvalidName` unless the name matches `[A-Za-z0-9_]+`.
    /// - `AlreadyExists` when the lowercase name is taken.
    /// - `InvalidColor` when a given color is not `#rgb` or `#rrggbb`.
    pub fn create_tag(
        &mut self,
        name: &str,
        color: Option<&str>,
        scan_and_backfill: bool,
    ) -> Result<CreatedTag, TagServiceError> {
        let trimmed = name.trim();
        if !is_valid_tag_name(trimmed) {
            return Err(TagServiceError::InvalidName(name.to_string()));
        }
        let canonical = trimmed.to_lowercase();
        let requested_color = match color.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => Some(canonical_color(value)?),
            None => None,
        };
        let word_re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&canonical)))
            .map_err(|_| TagServiceError::InvalidName(name.to_string()))?;
        let mut rng = rand::thread_rng();

        let tx = self
            .store
            .connection_mut()?
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let (created, notes_modified) = {
            let notes = SqliteNoteRepository::try_new(&tx)?;
            let tags = SqliteTagRepository::try_new(&tx)?;
            if tags.get_tag(&canonical)?.is_some() {
                return Err(TagServiceError::AlreadyExists(canonical));
            }

            let color = match requested_color {
                Some(value) => value,
                None => unique_color(&tags.list_colors()?, &mut rng),
            };
            let all_notes = notes.list_notes(&NoteListQuery::all())?;
            let existing_refs = all_notes
                .iter()
                .filter(|note| note.tag_set().contains(&canonical))
                .count();
            tags.put_tag(
                &Tag::new(canonical.as_str())
                    .with_color(color)
                    .with_count(count_u32(existing_refs)),
            )?;

            let mut modified = 0;
            if scan_and_backfill {
                let now = now_millis();
                for note in all_notes {
                    if backfill_note(&notes, &tags, note, &word_re, &canonical, now, &mut rng)? {
                        modified += 1;
                    }
                }
            }

            let created = tags
                .get_tag(&canonical)?
                .ok_or_else(|| RepoError::NotFound(canonical.clone()))?;
            (created, modified)
        };
        tx.commit()?;

        info!(
            "event=tag_create module=tag_service status=ok scan={} notes_modified={} count={}",
            scan_and_backfill, notes_modified, created.count
        );
        Ok(CreatedTag {
            tag: created,
            notes_modified,
        })
    }

    /// Changes the display color; the count is left untouched.
    ///
    /// A blank color clears it.
    pub fn set_tag_color(&mut self, name: &str, color: &str) -> Result<Tag, TagServiceError> {
        let canonical =
            normalize_tag(name).ok_or_else(|| TagServiceError::TagNotFound(name.to_string()))?;
        let color = match color.trim() {
            "" => None,
            value => Some(canonical_color(value)?),
        };
        let tx = self
            .store
            .connection_mut()?
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let updated = {
            let tags = SqliteTagRepository::try_new(&tx)?;
            let mut tag = tags
                .get_tag(&canonical)?
                .ok_or_else(|| TagServiceError::TagNotFound(canonical.clone()))?;
            tag.color = color;
            tags.put_tag(&tag)?;
            tag
        };
        tx.commit()?;
        debug!("event=tag_color module=tag_service status=ok");
        Ok(updated)
    }

    /// Removes a catalog row. Notes keep the name until they are next saved.
    pub fn delete_tag(&mut self, name: &str) -> Result<(), TagServiceError> {
        let canonical =
            normalize_tag(name).ok_or_else(|| TagServiceError::TagNotFound(name.to_string()))?;
        let repo = SqliteTagRepository::try_new(self.store.connection()?)?;
        if !repo.delete_tag(&canonical)? {
            return Err(TagServiceError::TagNotFound(canonical));
        }
        info!("event=tag_delete module=tag_service status=ok");
        Ok(())
    }

    /// Full reconciliation: normalize note tags, then rebuild the catalog,
    /// committed as one unit.
    pub fn recompute(&mut self) -> Result<RepairReport, TagServiceError> {
        let started_at = Instant::now();
        let tx = self
            .store
            .connection_mut()?
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let report = {
            let notes = SqliteNoteRepository::try_new(&tx)?;
            let tags = SqliteTagRepository::try_new(&tx)?;
            recompute_with(&notes, &tags)?
        };
        tx.commit()?;
        info!(
            "event=tag_recompute module=tag_service status=ok tags_repaired={} notes_normalized={} duration_ms={}",
            report.tags_repaired,
            report.notes_normalized,
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }

    /// Runs only the note normalization phase.
    pub fn normalize_notes(&mut self) -> Result<usize, TagServiceError> {
        let tx = self
            .store
            .connection_mut()?
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let normalized = normalize_note_tags(&SqliteNoteRepository::try_new(&tx)?)?;
        tx.commit()?;
        Ok(normalized)
    }

    /// Runs only the catalog rebuild phase, keeping current colors.
    pub fn rebuild_catalog(&mut self) -> Result<usize, TagServiceError> {
        let tx = self
            .store
            .connection_mut()?
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let rebuilt = {
            let notes = SqliteNoteRepository::try_new(&tx)?;
            let tags = SqliteTagRepository::try_new(&tx)?;
            let colors = snapshot_colors(&tags)?;
            rebuild_tag_catalog(&notes, &tags, &colors)?
        };
        tx.commit()?;
        Ok(rebuilt)
    }
}

/// Applies one tag delta to the catalog.
///
/// Removed tags are decremented (saturating, row kept at zero). Added tags are
/// incremented or created with count 1 and a color distinct from the
/// colors already in use.
pub fn apply_delta<T, R>(tags: &T, delta: &TagDelta, rng: &mut R) -> RepoResult<()>
where
    T: TagRepository + ?Sized,
    R: Rng + ?Sized,
{
    if delta.is_empty() {
        return Ok(());
    }

    for name in &delta.removed {
        match tags.get_tag(name)? {
            Some(mut tag) => {
                tag.count = tag.count.saturating_sub(1);
                tags.put_tag(&tag)?;
            }
            None => {
                warn!(
                    "event=tag_delta module=tag_service status=skip reason=missing_row op=decrement"
                );
            }
        }
    }

    let mut in_use = if delta.added.is_empty() {
        Vec::new()
    } else {
        tags.list_colors()?
    };
    for name in &delta.added {
        match tags.get_tag(name)? {
            Some(mut tag) => {
                tag.count = tag.count.saturating_add(1);
                tags.put_tag(&tag)?;
            }
            None => {
                let color = unique_color(&in_use, rng);
                in_use.push(color.clone());
                tags.put_tag(&Tag::new(name.as_str()).with_color(color).with_count(1))?;
            }
        }
    }

    debug!(
        "event=tag_delta module=tag_service status=ok removed={} added={}",
        delta.removed.len(),
        delta.added.len()
    );
    Ok(())
}

/// Snapshot of assigned colors keyed by canonical name.
pub fn snapshot_colors<T>(tags: &T) -> RepoResult<BTreeMap<String, String>>
where
    T: TagRepository + ?Sized,
{
    let mut colors = BTreeMap::new();
    for tag in tags.list_tags()? {
        let (Some(name), Some(color)) = (normalize_tag(&tag.name), tag.color) else {
            continue;
        };
        colors.entry(name).or_insert(color);
    }
    Ok(colors)
}

/// Rewrites every note whose stored tag list is not canonical.
///
/// Returns how many notes were rewritten.
pub fn normalize_note_tags<N>(notes: &N) -> RepoResult<usize>
where
    N: NoteRepository + ?Sized,
{
    let mut normalized = 0;
    for note in notes.list_notes(&NoteListQuery::all())? {
        let canonical: Vec<String> = note.tag_set().into_iter().collect();
        if canonical != note.tags {
            notes.set_note_tags(&note.id, &canonical)?;
            normalized += 1;
        }
    }
    Ok(normalized)
}

/// Clears the catalog and writes one row per referenced name.
///
/// Colors come from `preserved`; names without a preserved color get none.
pub fn rebuild_tag_catalog<N, T>(
    notes: &N,
    tags: &T,
    preserved: &BTreeMap<String, String>,
) -> RepoResult<usize>
where
    N: NoteRepository + ?Sized,
    T: TagRepository + ?Sized,
{
    let mut tally: BTreeMap<String, usize> = BTreeMap::new();
    for note in notes.list_notes(&NoteListQuery::all())? {
        for name in note.tag_set() {
            *tally.entry(name).or_insert(0) += 1;
        }
    }

    tags.clear_tags()?;
    for (name, count) in &tally {
        let mut tag = Tag::new(name.as_str()).with_count(count_u32(*count));
        tag.color = preserved.get(name).cloned();
        tags.put_tag(&tag)?;
    }
    Ok(tally.len())
}

/// Both recompute phases on the caller's transaction.
pub fn recompute_with<N, T>(notes: &N, tags: &T) -> RepoResult<RepairReport>
where
    N: NoteRepository + ?Sized,
    T: TagRepository + ?Sized,
{
    let colors = snapshot_colors(tags)?;
    let notes_normalized = normalize_note_tags(notes)?;
    let tags_repaired = rebuild_tag_catalog(notes, tags, &colors)?;
    Ok(RepairReport {
        tags_repaired,
        notes_normalized,
    })
}

fn backfill_note<N, T, R>(
    notes: &N,
    tags: &T,
    note: Note,
    word_re: &Regex,
    name: &str,
    now: i64,
    rng: &mut R,
) -> RepoResult<bool>
where
    N: NoteRepository + ?Sized,
    T: TagRepository + ?Sized,
    R: Rng + ?Sized,
{
    let title = hashify_text(&note.title, word_re, name, None, None);
    let content = hashify_markup(&note.content, word_re, name);
    if title.is_none() && content.is_none() {
        return Ok(false);
    }

    let old_tags = note.tag_set();
    let mut updated = note;
    if let Some(title) = title {
        updated.title = title;
    }
    if let Some(content) = content {
        updated.content = content;
    }
    let new_tags: BTreeSet<String> = extract_note_tags(&updated.title, &updated.content);
    updated.tags = new_tags.iter().cloned().collect();
    updated.modified_at = Some(now);
    if updated.created_at.is_none() {
        warn!("event=note_created_at_backfill module=tag_service status=ok reason=missing");
        updated.created_at = Some(now);
    }

    notes.update_note(&updated)?;
    apply_delta(tags, &TagDelta::between(&old_tags, &new_tags), rng)?;
    Ok(true)
}

/// Rewrites standalone occurrences of the word in text segments only.
///
/// Word boundaries are judged on the rendered text: inline tags are
/// transparent and block boundaries count as whitespace.
fn hashify_markup(markup: &str, word_re: &Regex, name: &str) -> Option<String> {
    let pieces = segments(markup);
    let mut changed = false;
    let mut out = String::with_capacity(markup.len());
    for (index, (is_markup, segment)) in pieces.iter().enumerate() {
        if *is_markup {
            out.push_str(segment);
            continue;
        }
        let before = neighbour_char(pieces[..index].iter().rev(), |text| text.chars().next_back());
        let after = neighbour_char(pieces[index + 1..].iter(), |text| text.chars().next());
        match hashify_text(segment, word_re, name, before, after) {
            Some(rewritten) => {
                changed = true;
                out.push_str(&rewritten);
            }
            None => out.push_str(segment),
        }
    }
    changed.then_some(out)
}

/// First rendered character reached by walking `pieces` outward.
fn neighbour_char<'a, 'b: 'a, I, F>(pieces: I, edge: F) -> Option<char>
where
    I: Iterator<Item = &'a (bool, &'b str)>,
    F: Fn(&str) -> Option<char>,
{
    for (is_markup, segment) in pieces {
        if *is_markup {
            if is_block_boundary(*segment) {
                return Some(' ');
            }
            continue;
        }
        if let Some(found) = edge(*segment) {
            return Some(found);
        }
    }
    None
}

/// Replaces every match not already part of a hashtag, entity or longer word
/// with `#name`. `before` and `after` are the characters just outside `text`.
fn hashify_text(
    text: &str,
    word_re: &Regex,
    name: &str,
    before: Option<char>,
    after: Option<char>,
) -> Option<String> {
    let mut out = String::with_capacity(text.len() + name.len());
    let mut cursor = 0;
    let mut changed = false;
    for found in word_re.find_iter(text) {
        let prev = text[..found.start()].chars().next_back().or(before);
        let next = text[found.end()..].chars().next().or(after);
        if matches!(prev, Some('#') | Some('&')) || next == Some('#') {
            continue;
        }
        if prev.is_some_and(is_word_char) || next.is_some_and(is_word_char) {
            continue;
        }
        out.push_str(&text[cursor..found.start()]);
        out.push('#');
        out.push_str(name);
        cursor = found.end();
        changed = true;
    }
    if !changed {
        return None;
    }
    out.push_str(&text[cursor..]);
    Some(out)
}

/// Validates a user-supplied color and returns it as lowercase `#rrggbb`.
fn canonical_color(value: &str) -> Result<String, TagServiceError> {
    let (r, g, b) =
        parse_hex_color(value).ok_or_else(|| TagServiceError::InvalidColor(value.to_string()))?;
    Ok(format!("#{r:02x}{g:02x}{b:02x}"))
}

fn count_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
