use hashnote_core::model::tag::Tag;
use hashnote_core::repo::tag_repo::{SqliteTagRepository, TagRepository};
use hashnote_core::{NoteService, RepairReport, Store, TagService, TagServiceError};
use std::collections::BTreeMap;

/// Counts every tag reference across all notes, archived included.
fn expected_counts(store: &Store) -> BTreeMap<String, u32> {
    let conn = store.connection().unwrap();
    let mut stmt = conn.prepare("SELECT tags FROM notes;").unwrap();
    let lists: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let mut counts = BTreeMap::new();
    for raw in lists {
        let tags: Vec<String> = serde_json::from_str(&raw).unwrap();
        let unique: std::collections::BTreeSet<String> =
            tags.iter().map(|tag| tag.to_lowercase()).collect();
        for tag in unique {
            *counts.entry(tag).or_insert(0) += 1;
        }
    }
    counts
}

fn catalog(store: &mut Store) -> BTreeMap<String, u32> {
    TagService::new(store)
        .list_tags()
        .unwrap()
        .into_iter()
        .filter(|tag| tag.count > 0)
        .map(|tag| (tag.name, tag.count))
        .collect()
}

#[test]
fn counts_match_note_references_after_mixed_mutations() {
    let mut store = Store::open_in_memory().unwrap();
    let mut service = NoteService::new(&mut store);
    let a = service.create_note("a", "#one #two").unwrap().note.id;
    let b = service.create_note("b", "#two #three").unwrap().note.id;
    service.create_note("c", "#three").unwrap();
    service.update_note(&a, "a", "#two #four").unwrap();
    service.set_archived(&b, true).unwrap();
    service.delete_note(&b).unwrap();

    let expected = expected_counts(&store);
    assert_eq!(catalog(&mut store), expected);
    assert_eq!(
        TagService::new(&mut store).get_tag("one").unwrap().unwrap().count,
        0
    );
}

#[test]
fn recompute_repairs_drift_and_preserves_colors() {
    let mut store = Store::open_in_memory().unwrap();
    NoteService::new(&mut store)
        .create_note("a", "#work #home")
        .unwrap();
    let work_color = TagService::new(&mut store)
        .set_tag_color("work", "#abcdef")
        .unwrap()
        .color;

    {
        let conn = store.connection().unwrap();
        conn.execute_batch(
            "UPDATE tags SET count = 42 WHERE name = 'work';
             DELETE FROM tags WHERE name = 'home';
             INSERT INTO tags (name, count, color) VALUES ('ghost', 3, '#000000');
             UPDATE notes SET tags = '[\"Work\",\"home\",\"work\"]';",
        )
        .unwrap();
    }

    let report = TagService::new(&mut store).recompute().unwrap();
    assert_eq!(
        report,
        RepairReport {
            tags_repaired: 2,
            notes_normalized: 1,
        }
    );

    let tags = TagService::new(&mut store).list_tags().unwrap();
    let names: Vec<&str> = tags.iter().map(|tag| tag.name.as_str()).collect();
    assert_eq!(names, vec!["home", "work"]);
    assert!(tags.iter().all(|tag| tag.count == 1));
    assert_eq!(tags[1].color, work_color);
    assert_eq!(tags[0].color, None);

    let second = TagService::new(&mut store).recompute().unwrap();
    assert_eq!(second.notes_normalized, 0);
    assert_eq!(TagService::new(&mut store).list_tags().unwrap(), tags);
}

#[test]
fn recompute_phases_can_run_separately() {
    let mut store = Store::open_in_memory().unwrap();
    NoteService::new(&mut store).create_note("a", "#x").unwrap();
    store
        .connection()
        .unwrap()
        .execute_batch("UPDATE notes SET tags = '[\"X\"]'; DELETE FROM tags;")
        .unwrap();

    let mut tags = TagService::new(&mut store);
    assert_eq!(tags.normalize_notes().unwrap(), 1);
    assert_eq!(tags.rebuild_catalog().unwrap(), 1);
    assert_eq!(tags.get_tag("x").unwrap().unwrap().count, 1);
}

#[test]
fn explicit_tag_without_scan_starts_unused() {
    let mut store = Store::open_in_memory().unwrap();
    let created = TagService::new(&mut store)
        .create_tag("Ideas", Some("#112233"), false)
        .unwrap();

    assert_eq!(created.tag, Tag::new("ideas").with_color("#112233"));
    assert_eq!(created.notes_modified, 0);
    assert!(matches!(
        TagService::new(&mut store).create_tag("IDEAS", None, false),
        Err(TagServiceError::AlreadyExists(name)) if name == "ideas"
    ));
    assert!(matches!(
        TagService::new(&mut store).create_tag("two words", None, false),
        Err(TagServiceError::InvalidName(_))
    ));
}

#[test]
fn explicit_tag_scan_rewrites_standalone_words() {
    let mut store = Store::open_in_memory().unwrap();
    {
        let mut service = NoteService::new(&mut store);
        service
            .create_note("Project kickoff", "<div>the project starts</div>")
            .unwrap();
        service
            .create_note("misc", "<div>projects and project_x</div>")
            .unwrap();
        service.create_note("other", "nothing here").unwrap();
    }

    let created = TagService::new(&mut store)
        .create_tag("project", None, true)
        .unwrap();
    assert_eq!(created.notes_modified, 1);
    assert_eq!(created.tag.count, 1);
    assert!(created.tag.has_color());

    let notes = NoteService::new(&mut store)
        .list_notes(&hashnote_core::NoteFilter::active())
        .unwrap();
    let kickoff = notes.iter().find(|n| n.title.contains("kickoff")).unwrap();
    assert_eq!(kickoff.title, "#project kickoff");
    assert_eq!(kickoff.content, "<div>the #project starts</div>");
    assert_eq!(kickoff.tags, vec!["project".to_string()]);

    let misc = notes.iter().find(|n| n.title == "misc").unwrap();
    assert_eq!(misc.content, "<div>projects and project_x</div>");
    assert!(misc.tags.is_empty());

    assert_eq!(catalog(&mut store), expected_counts(&store));
}

#[test]
fn recreating_a_deleted_tag_counts_existing_hashtags() {
    let mut store = Store::open_in_memory().unwrap();
    NoteService::new(&mut store)
        .create_note("misc", "<div>#project already</div>")
        .unwrap();
    TagService::new(&mut store).delete_tag("project").unwrap();

    let created = TagService::new(&mut store)
        .create_tag("project", None, true)
        .unwrap();
    assert_eq!(created.notes_modified, 0);
    assert_eq!(created.tag.count, 1);

    let notes = NoteService::new(&mut store)
        .list_notes(&hashnote_core::NoteFilter::active())
        .unwrap();
    assert_eq!(notes[0].content, "<div>#project already</div>");
    assert_eq!(catalog(&mut store), expected_counts(&store));
}

#[test]
fn scan_judges_word_boundaries_across_inline_markup() {
    let mut store = Store::open_in_memory().unwrap();
    NoteService::new(&mut store)
        .create_note("draft", "my project<b>x</b> here")
        .unwrap();

    let created = TagService::new(&mut store)
        .create_tag("project", None, true)
        .unwrap();
    assert_eq!(created.notes_modified, 0);
    assert_eq!(created.tag.count, 0);
    assert!(TagService::new(&mut store).get_tag("projectx").unwrap().is_none());

    let notes = NoteService::new(&mut store)
        .list_notes(&hashnote_core::NoteFilter::active())
        .unwrap();
    assert_eq!(notes[0].content, "my project<b>x</b> here");
    assert!(notes[0].tags.is_empty());
}

#[test]
fn explicit_colors_must_be_hex() {
    let mut store = Store::open_in_memory().unwrap();
    assert!(matches!(
        TagService::new(&mut store).create_tag("ideas", Some("blue"), false),
        Err(TagServiceError::InvalidColor(color)) if color == "blue"
    ));
    assert!(TagService::new(&mut store).get_tag("ideas").unwrap().is_none());

    let created = TagService::new(&mut store)
        .create_tag("ideas", Some("#ABC"), false)
        .unwrap();
    assert_eq!(created.tag.color.as_deref(), Some("#aabbcc"));

    assert!(matches!(
        TagService::new(&mut store).set_tag_color("ideas", "zzz"),
        Err(TagServiceError::InvalidColor(_))
    ));
    let cleared = TagService::new(&mut store)
        .set_tag_color("ideas", "  ")
        .unwrap();
    assert_eq!(cleared.color, None);
}

#[test]
fn suggestions_rank_by_usage_then_name() {
    let mut store = Store::open_in_memory().unwrap();
    {
        let mut service = NoteService::new(&mut store);
        service.create_note("a", "#work #workshop").unwrap();
        service.create_note("b", "#work").unwrap();
        service.create_note("c", "#homework #network").unwrap();
    }
    TagService::new(&mut store)
        .create_tag("worry", None, false)
        .unwrap();

    let tags = TagService::new(&mut store);
    let names = |found: Vec<Tag>| -> Vec<String> { found.into_iter().map(|t| t.name).collect() };

    assert_eq!(
        names(tags.suggest_tags("WO").unwrap()),
        vec!["work", "workshop", "worry"]
    );
    assert_eq!(
        names(tags.suggest_tags("#work").unwrap()),
        vec!["work", "workshop"]
    );
    assert!(tags.suggest_tags("zz").unwrap().is_empty());

    assert_eq!(
        names(tags.find_tags("  WORK ").unwrap()),
        vec!["homework", "network", "work", "workshop"]
    );
    assert_eq!(tags.find_tags("").unwrap().len(), 5);
}

#[test]
fn color_changes_leave_counts_alone() {
    let mut store = Store::open_in_memory().unwrap();
    NoteService::new(&mut store).create_note("a", "#work").unwrap();

    let tag = TagService::new(&mut store)
        .set_tag_color("Work", "#123456")
        .unwrap();
    assert_eq!(tag.count, 1);
    assert_eq!(tag.color.as_deref(), Some("#123456"));
    assert!(matches!(
        TagService::new(&mut store).set_tag_color("nope", "#123456"),
        Err(TagServiceError::TagNotFound(_))
    ));
}

#[test]
fn deleted_tags_return_on_next_save() {
    let mut store = Store::open_in_memory().unwrap();
    let id = NoteService::new(&mut store)
        .create_note("a", "#work")
        .unwrap()
        .note
        .id;

    TagService::new(&mut store).delete_tag("work").unwrap();
    assert!(TagService::new(&mut store).get_tag("work").unwrap().is_none());
    assert!(matches!(
        TagService::new(&mut store).delete_tag("work"),
        Err(TagServiceError::TagNotFound(_))
    ));

    NoteService::new(&mut store)
        .update_note(&id, "a", "#work #more")
        .unwrap();
    assert_eq!(
        TagService::new(&mut store).get_tag("more").unwrap().unwrap().count,
        1
    );
    // `work` was already on the note, so this save carries no delta for it
    assert!(TagService::new(&mut store).get_tag("work").unwrap().is_none());
    TagService::new(&mut store).recompute().unwrap();
    assert_eq!(
        TagService::new(&mut store).get_tag("work").unwrap().unwrap().count,
        1
    );
}

#[test]
fn new_tags_get_distinct_pastel_colors() {
    let mut store = Store::open_in_memory().unwrap();
    NoteService::new(&mut store)
        .create_note("a", "#one #two #three")
        .unwrap();

    let conn = store.connection().unwrap();
    let repo = SqliteTagRepository::try_new(conn).unwrap();
    let colors = repo.list_colors().unwrap();
    assert_eq!(colors.len(), 3);
    for color in &colors {
        let channels = [&color[1..3], &color[3..5], &color[5..7]];
        for channel in channels {
            assert!(u8::from_str_radix(channel, 16).unwrap() >= 200);
        }
    }
}
