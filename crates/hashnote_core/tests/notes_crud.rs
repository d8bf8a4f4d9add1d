use hashnote_core::{NoteFilter, NoteId, NoteService, NoteServiceError, Store, TagService};
use std::collections::BTreeSet;

fn set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn count_of(store: &mut Store, name: &str) -> Option<u32> {
    TagService::new(store)
        .get_tag(name)
        .unwrap()
        .map(|tag| tag.count)
}

#[test]
fn create_derives_tags_from_title_and_content() {
    let mut store = Store::open_in_memory().unwrap();
    let saved = NoteService::new(&mut store)
        .create_note("Plan #Work", "<div>call bob #urgent.</div><div>#work</div>")
        .unwrap();

    assert_eq!(saved.new_tags, set(&["urgent", "work"]));
    assert!(saved.old_tags.is_empty());
    assert_eq!(saved.note.tags, vec!["urgent".to_string(), "work".to_string()]);
    assert!(saved.note.created_at.is_some());
    assert_eq!(saved.note.created_at, saved.note.modified_at);
    assert!(!saved.note.archived);

    assert_eq!(count_of(&mut store, "work"), Some(1));
    assert_eq!(count_of(&mut store, "urgent"), Some(1));
    let work = TagService::new(&mut store).get_tag("WORK").unwrap().unwrap();
    assert!(work.has_color());
}

#[test]
fn blank_notes_are_rejected() {
    let mut store = Store::open_in_memory().unwrap();
    let mut service = NoteService::new(&mut store);
    assert!(matches!(
        service.create_note("  ", " \n"),
        Err(NoteServiceError::EmptyNote)
    ));

    let saved = service.create_note("t", "body").unwrap();
    assert!(matches!(
        service.update_note(&saved.note.id, "", ""),
        Err(NoteServiceError::EmptyNote)
    ));
    assert_eq!(service.list_notes(&NoteFilter::active()).unwrap().len(), 1);
}

#[test]
fn update_applies_only_the_tag_difference() {
    let mut store = Store::open_in_memory().unwrap();
    let id = {
        let mut service = NoteService::new(&mut store);
        service.create_note("a", "#a #b").unwrap();
        service.create_note("b", "#b #x").unwrap().note.id
    };
    assert_eq!(count_of(&mut store, "b"), Some(2));

    let saved = NoteService::new(&mut store)
        .update_note(&id, "b", "#b #c")
        .unwrap();
    assert_eq!(saved.old_tags, set(&["b", "x"]));
    assert_eq!(saved.new_tags, set(&["b", "c"]));
    assert_eq!(saved.delta().removed, set(&["x"]));
    assert_eq!(saved.delta().added, set(&["c"]));

    assert_eq!(count_of(&mut store, "a"), Some(1));
    assert_eq!(count_of(&mut store, "b"), Some(2));
    assert_eq!(count_of(&mut store, "c"), Some(1));
    assert_eq!(count_of(&mut store, "x"), Some(0));
}

#[test]
fn update_keeps_created_at_and_backfills_when_missing() {
    let mut store = Store::open_in_memory().unwrap();
    let saved = NoteService::new(&mut store).create_note("t", "body").unwrap();
    let created = saved.note.created_at;

    let updated = NoteService::new(&mut store)
        .update_note(&saved.note.id, "t2", "body2")
        .unwrap();
    assert_eq!(updated.note.created_at, created);
    assert!(updated.note.modified_at >= created);

    store
        .connection()
        .unwrap()
        .execute(
            "UPDATE notes SET created_at = NULL WHERE id = ?1;",
            [saved.note.id.as_str()],
        )
        .unwrap();
    let repaired = NoteService::new(&mut store)
        .update_note(&saved.note.id, "t3", "body3")
        .unwrap();
    assert!(repaired.note.created_at.is_some());
    assert_eq!(repaired.note.created_at, repaired.note.modified_at);
}

#[test]
fn missing_notes_report_not_found() {
    let mut store = Store::open_in_memory().unwrap();
    let mut service = NoteService::new(&mut store);
    let ghost = NoteId::from("ghost");

    assert!(matches!(
        service.update_note(&ghost, "t", "b"),
        Err(NoteServiceError::NoteNotFound(id)) if id == ghost
    ));
    assert!(matches!(
        service.delete_note(&ghost),
        Err(NoteServiceError::NoteNotFound(_))
    ));
    assert!(matches!(
        service.set_archived(&ghost, true),
        Err(NoteServiceError::NoteNotFound(_))
    ));
    assert!(service.get_note(&ghost).unwrap().is_none());
}

#[test]
fn archiving_moves_between_scopes_without_touching_counts() {
    let mut store = Store::open_in_memory().unwrap();
    let saved = NoteService::new(&mut store)
        .create_note("t", "#work")
        .unwrap();

    let archived = NoteService::new(&mut store)
        .set_archived(&saved.note.id, true)
        .unwrap();
    assert!(archived.archived);
    assert_eq!(archived.modified_at, saved.note.modified_at);
    assert_eq!(count_of(&mut store, "work"), Some(1));

    let service = NoteService::new(&mut store);
    assert!(service.list_notes(&NoteFilter::active()).unwrap().is_empty());
    assert_eq!(service.list_notes(&NoteFilter::archived()).unwrap().len(), 1);
}

#[test]
fn delete_decrements_and_keeps_zero_count_rows() {
    let mut store = Store::open_in_memory().unwrap();
    let saved = NoteService::new(&mut store)
        .create_note("t", "#solo #shared")
        .unwrap();
    NoteService::new(&mut store)
        .create_note("u", "#shared")
        .unwrap();

    let removed = NoteService::new(&mut store)
        .delete_note(&saved.note.id)
        .unwrap();
    assert_eq!(removed, set(&["shared", "solo"]));
    assert_eq!(count_of(&mut store, "solo"), Some(0));
    assert_eq!(count_of(&mut store, "shared"), Some(1));
    assert!(NoteService::new(&mut store)
        .get_note(&saved.note.id)
        .unwrap()
        .is_none());
}

#[test]
fn list_filters_by_every_selected_tag() {
    let mut store = Store::open_in_memory().unwrap();
    {
        let mut service = NoteService::new(&mut store);
        service.create_note("one", "#work #urgent").unwrap();
        service.create_note("two", "#work").unwrap();
        service.create_note("three", "#home").unwrap();
    }

    let service = NoteService::new(&mut store);
    let work = service
        .list_notes(&NoteFilter::active().with_tag("work"))
        .unwrap();
    assert_eq!(work.len(), 2);

    let both = service
        .list_notes(&NoteFilter::active().with_tag("Work").with_tag("urgent"))
        .unwrap();
    assert_eq!(both.len(), 1);
    assert_eq!(both[0].title, "one");
}

#[test]
fn notes_survive_reopening_a_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.db");

    let id = {
        let mut store = Store::open(&path).unwrap();
        let id = NoteService::new(&mut store)
            .create_note("kept", "#persisted")
            .unwrap()
            .note
            .id;
        store.close().unwrap();
        id
    };

    let mut store = Store::open(&path).unwrap();
    let note = NoteService::new(&mut store).get_note(&id).unwrap().unwrap();
    assert_eq!(note.title, "kept");
    assert_eq!(count_of(&mut store, "persisted"), Some(1));
}
