//! End-to-end publish runs against an in-memory source.

mod common;

use std::fs;

use notepress::decode::testing::NoteBlobBuilder;
use notepress::error::Error;
use notepress::model::{Attr, Note, NoteId};
use notepress::publish::feed::check_well_formed;
use notepress::publish::manifest::{LoadedManifest, Manifest};
use notepress::publish::{Publisher, RedirectRule, StaleOutput, Warning};
use notepress::source::{MemorySource, NoteSource};

use common::{Workspace, body, jan, note, templates};

fn two_notes() -> MemorySource {
    MemorySource::new([
        note("A", "Hello World", "First post.", 1),
        note("B", "Second", "More words.", 2),
    ])
}

fn load_manifest(ws: &Workspace) -> Manifest {
    match Manifest::load(&ws.manifest()).unwrap() {
        LoadedManifest::Loaded(m) => m,
        other => panic!("expected a valid manifest, got {other:?}"),
    }
}

// ============================================================================
// Full and incremental builds
// ============================================================================

#[test]
fn test_first_run_writes_everything() {
    let ws = Workspace::new();
    let report = ws.publish(&two_notes());

    assert_eq!(report.new, vec![NoteId::new("A"), NoteId::new("B")]);
    assert!(report.manifest_written);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);

    let page = ws.read("hello-world.html");
    assert!(page.contains("<h1>Hello World</h1>"));
    assert!(page.contains("<p>First post.</p>"));
    assert!(page.contains("<time datetime=\"2025-01-01T00:00:00+00:00\">January 1, 2025</time>"));
    // The title line is shown by the template, not repeated in the body.
    assert!(!page.contains("<p>Hello World</p>"));

    let index = ws.read("index.html");
    let newer = index.find("/second.html").unwrap();
    let older = index.find("/hello-world.html").unwrap();
    assert!(newer < older, "index is newest first");

    let feed = ws.read("feed.xml");
    check_well_formed(&feed).unwrap();
    assert!(feed.contains("<link>https://example.com/second.html</link>"));
    assert!(feed.contains("<pubDate>Thu, 02 Jan 2025 00:00:00 +0000</pubDate>"));
    assert!(feed.contains("<![CDATA[<p>More words.</p>]]>"));

    let manifest = load_manifest(&ws);
    assert_eq!(manifest.entries.len(), 2);
    assert_eq!(manifest.entries[&NoteId::new("A")].slug, "hello-world");
    assert!(manifest.last_published.is_some());
}

#[test]
fn test_rerun_without_changes_is_byte_identical() {
    let ws = Workspace::new();
    let source = two_notes();
    ws.publish(&source);
    let before = ws.snapshot();

    let report = ws.publish(&source);
    assert_eq!(report.unchanged, 2);
    assert_eq!(report.rendered(), 0);
    assert!(report.written.is_empty(), "{:?}", report.written);
    assert!(!report.manifest_written);
    assert_eq!(before, ws.snapshot());
}

#[test]
fn test_one_changed_body_renders_only_that_note() {
    let ws = Workspace::new();
    let mut source = two_notes();
    ws.publish(&source);
    let untouched = fs::read(ws.output().join("hello-world.html")).unwrap();

    source.note_mut("B").unwrap().body = Some(body("Second", "Edited words."));
    let report = ws.publish(&source);

    assert_eq!(report.changed, vec![NoteId::new("B")]);
    assert_eq!(report.unchanged, 1);
    assert!(report.written.contains(&ws.output().join("second.html")));
    assert!(!report.written.contains(&ws.output().join("hello-world.html")));
    assert_eq!(fs::read(ws.output().join("hello-world.html")).unwrap(), untouched);
    assert!(ws.read("second.html").contains("<p>Edited words.</p>"));
    assert!(ws.read("feed.xml").contains("Edited words."));
}

#[test]
fn test_touch_without_edit_is_unchanged() {
    let ws = Workspace::new();
    let mut source = two_notes();
    ws.publish(&source);

    source.note_mut("A").unwrap().modified = jan(20);
    let report = ws.publish(&source);
    assert_eq!(report.unchanged, 2);
    assert!(!report.manifest_written);
}

#[test]
fn test_missing_page_is_rendered_again() {
    let ws = Workspace::new();
    let source = two_notes();
    ws.publish(&source);
    fs::remove_file(ws.output().join("second.html")).unwrap();

    let report = ws.publish(&source);
    assert_eq!(report.changed, vec![NoteId::new("B")]);
    assert!(ws.exists("second.html"));
}

#[test]
fn test_template_change_rebuilds_everything() {
    let ws = Workspace::new();
    let source = two_notes();
    ws.publish(&source);

    let mut options = ws.options();
    options.site.title = "Renamed Blog".to_string();
    let report = ws.publish_with(options, &source);
    assert_eq!(report.changed.len(), 2);
    assert!(ws.read("hello-world.html").contains("Hello World - Renamed Blog"));
}

#[test]
fn test_feed_limit() {
    let ws = Workspace::new();
    let source = MemorySource::new((1..=5).map(|day| note(&format!("N{day}"), &format!("Post {day}"), "x", day)));
    let mut options = ws.options();
    options.feed_limit = 3;
    ws.publish_with(options, &source);

    let index = ws.read("index.html");
    assert!(index.contains("/post-5.html"));
    assert!(index.contains("/post-3.html"));
    assert!(!index.contains("/post-2.html"));
    assert_eq!(ws.read("feed.xml").matches("<item>").count(), 3);
}

// ============================================================================
// Slugs, moves and redirects
// ============================================================================

#[test]
fn test_slug_collision_aborts_and_writes_nothing() {
    let ws = Workspace::new();
    let source = MemorySource::new([
        note("A-1", "My Note", "one", 1).with_folder_path(["Work"]),
        note("B-2", "My Note", "two", 2).with_folder_path(["Home"]),
    ]);
    let mut options = ws.options();
    options.slugs.include_folders = false;

    let err = Publisher::new(options, templates()).run(&source).unwrap_err();
    match &err {
        Error::SlugCollision(collisions) => {
            assert_eq!(collisions.len(), 1);
            assert_eq!(collisions[0].slug, "my-note");
            let ids: Vec<&str> = collisions[0].notes.iter().map(|(id, _)| id.as_str()).collect();
            assert_eq!(ids, ["A-1", "B-2"]);
        }
        other => panic!("expected a slug collision, got {other:?}"),
    }
    let message = err.to_string();
    assert!(message.contains("A-1") && message.contains("B-2"), "{message}");
    assert!(ws.snapshot().is_empty());
}

#[test]
fn test_folders_keep_same_titles_apart() {
    let ws = Workspace::new();
    let source = MemorySource::new([
        note("A-1", "My Note", "one", 1).with_folder_path(["Work"]),
        note("B-2", "My Note", "two", 2).with_folder_path(["Home"]),
    ]);
    ws.publish(&source);
    assert!(ws.exists("work/my-note.html"));
    assert!(ws.exists("home/my-note.html"));
}

#[test]
fn test_title_change_moves_note_with_redirect() {
    let ws = Workspace::new();
    let mut source = MemorySource::new([note("X", "Old Title", "Body.", 1)]);
    ws.publish(&source);
    assert!(ws.exists("old-title.html"));

    let x = source.note_mut("X").unwrap();
    x.title = "New Title".to_string();
    x.body = Some(body("New Title", "Body."));
    let report = ws.publish(&source);

    assert_eq!(report.redirects, vec![RedirectRule::new("old-title", "new-title")]);
    assert_eq!(load_manifest(&ws).entries[&NoteId::new("X")].slug, "new-title");
    assert_eq!(
        ws.read("_redirects"),
        "# BEGIN notepress redirects\n/old-title.html /new-title.html 301\n# END notepress redirects\n"
    );
    assert!(ws.exists("new-title.html"));
    assert!(ws.exists("old-title.html"), "stale pages are kept by default");

    let again = ws.publish(&source);
    assert!(again.redirects.is_empty());
    assert!(again.written.is_empty());
}

#[test]
fn test_title_edit_with_same_slug_is_not_a_move() {
    let ws = Workspace::new();
    let mut source = MemorySource::new([note("X", "Old Title", "Body.", 1)]);
    ws.publish(&source);

    source.note_mut("X").unwrap().title = "Old Title!".to_string();
    let report = ws.publish(&source);
    assert!(report.redirects.is_empty());
    assert_eq!(report.changed, vec![NoteId::new("X")]);
    assert!(!ws.exists("_redirects"));
}

#[test]
fn test_slugs_are_frozen_until_reslug() {
    let ws = Workspace::new();
    let source = MemorySource::new([note("T", "Trip", "Packing.", 1).with_folder_path(["Travel"])]);
    let mut flat = ws.options();
    flat.slugs.include_folders = false;
    ws.publish_with(flat, &source);
    assert!(ws.exists("trip.html"));

    // Default options would nest the note, but its slug is already published.
    let report = ws.publish(&source);
    assert_eq!(report.unchanged, 1);
    assert!(!ws.exists("travel/trip.html"));

    let mut reslug = ws.options();
    reslug.reslug = true;
    reslug.stale_output = StaleOutput::Remove;
    let report = ws.publish_with(reslug, &source);
    assert_eq!(report.moved, vec![NoteId::new("T")]);
    assert_eq!(report.redirects, vec![RedirectRule::new("trip", "travel/trip")]);
    assert!(ws.exists("travel/trip.html"));
    assert!(!ws.exists("trip.html"));
    assert!(ws.read("_redirects").contains("/trip.html /travel/trip.html 301"));
}

#[test]
fn test_redirect_section_preserves_manual_rules() {
    let ws = Workspace::new();
    let mut source = MemorySource::new([note("X", "Alpha", "a", 1)]);
    ws.publish(&source);
    fs::write(ws.output().join("_redirects"), "/blog/* /:splat 301\n").unwrap();

    let x = source.note_mut("X").unwrap();
    x.title = "Beta".to_string();
    ws.publish(&source);
    let x = source.note_mut("X").unwrap();
    x.title = "Gamma".to_string();
    ws.publish(&source);

    assert_eq!(
        ws.read("_redirects"),
        "/blog/* /:splat 301\n# BEGIN notepress redirects\n\
         /alpha.html /gamma.html 301\n/beta.html /gamma.html 301\n# END notepress redirects\n"
    );
}

#[test]
fn test_deleted_note_leaves_index() {
    let ws = Workspace::new();
    let mut source = two_notes();
    ws.publish(&source);

    source.remove("B");
    let report = ws.publish(&source);
    assert_eq!(report.deleted, vec![NoteId::new("B")]);
    assert!(!ws.read("index.html").contains("/second.html"));
    assert!(ws.exists("second.html"));
    assert!(!load_manifest(&ws).entries.contains_key(&NoteId::new("B")));
}

#[test]
fn test_deleted_note_page_removed_on_request() {
    let ws = Workspace::new();
    let mut source = MemorySource::new([note("A", "Kept", "k", 1), note("B", "Gone", "g", 2).with_folder_path(["Old"])]);
    ws.publish(&source);
    assert!(ws.exists("old/gone.html"));

    source.remove("B");
    let mut options = ws.options();
    options.stale_output = StaleOutput::Remove;
    let report = ws.publish_with(options, &source);
    assert_eq!(report.removed, vec![ws.output().join("old/gone.html")]);
    assert!(!ws.output().join("old").exists());
    assert!(ws.exists("kept.html"));
}

// ============================================================================
// Recoverable and fatal conditions
// ============================================================================

#[test]
fn test_corrupt_manifest_is_backed_up_and_rebuilt() {
    let ws = Workspace::new();
    fs::write(ws.manifest(), "{ not json").unwrap();

    let report = ws.publish(&two_notes());
    assert!(matches!(report.warnings.as_slice(), [Warning::ManifestRecovered { .. }]));
    assert_eq!(report.new.len(), 2);

    let backup = report.manifest_backup.expect("backup path");
    assert_eq!(fs::read_to_string(backup).unwrap(), "{ not json");
    assert_eq!(load_manifest(&ws).entries.len(), 2);
}

#[test]
fn test_stored_slug_outside_root_is_rejected() {
    let ws = Workspace::new();
    let source = two_notes();
    ws.publish(&source);

    let mut manifest = load_manifest(&ws);
    manifest.entries.get_mut(&NoteId::new("A")).unwrap().slug = "../escape".to_string();
    manifest.save(&ws.manifest()).unwrap();

    let report = ws.publish(&source);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].id, NoteId::new("A"));
    assert!(report.rejected[0].reason.contains("escapes"));
    assert!(!ws.dir.path().join("escape.html").exists());
    assert_eq!(load_manifest(&ws).entries[&NoteId::new("A")].slug, "../escape");
    assert_eq!(report.unchanged, 1);
}

#[test]
fn test_undecodable_body_is_published_as_warning() {
    let ws = Workspace::new();
    let source = MemorySource::new([
        Note::new("BAD", "Broken").with_body(b"\x1f\x8b definitely not gzip".to_vec()),
        note("OK", "Fine", "ok", 2),
    ]);
    let report = ws.publish(&source);
    assert!(matches!(
        report.warnings.as_slice(),
        [Warning::Decode { id, .. }] if id.as_str() == "BAD"
    ));
    assert!(ws.exists("broken.html"));
    assert!(ws.exists("fine.html"));
}

#[test]
fn test_schema_failure_writes_nothing() {
    struct Incompatible;

    impl NoteSource for Incompatible {
        fn check_schema(&self) -> notepress::Result<()> {
            Err(Error::SchemaIncompatible {
                missing: vec!["ZICNOTEDATA".into()],
            })
        }

        fn notes(&self) -> notepress::Result<Vec<Note>> {
            panic!("notes read despite failed schema check")
        }
    }

    let ws = Workspace::new();
    let err = Publisher::new(ws.options(), templates()).run(&Incompatible).unwrap_err();
    assert!(matches!(err, Error::SchemaIncompatible { .. }));
    assert!(ws.snapshot().is_empty());
}

#[test]
fn test_duplicate_identifiers_keep_first() {
    let ws = Workspace::new();
    let source = MemorySource::new([note("A", "First", "1", 1), note("A", "Second", "2", 2)]);
    let report = ws.publish(&source);
    assert_eq!(report.warnings, vec![Warning::DuplicateNote(NoteId::new("A"))]);
    assert!(ws.exists("first.html"));
    assert!(!ws.exists("second.html"));
}

// ============================================================================
// Rendering through the engine
// ============================================================================

#[test]
fn test_links_between_notes() {
    let ws = Workspace::new();
    let text = "Trip\nSee Packing list and [[Missing Note]] and [[packing]].";
    let trip = NoteBlobBuilder::new(text)
        .plain(9)
        .linked(12, "applenotes:note/pack-1?ownerIdentifier=x")
        .fill()
        .gzip()
        .unwrap();
    let source = MemorySource::new([
        note("PACK-1", "Packing", "Socks.", 1),
        Note::new("TRIP-2", "Trip").with_body(trip).with_created(jan(2)),
    ]);
    ws.publish(&source);

    let page = ws.read("trip.html");
    assert!(page.contains("<a href=\"/packing.html\">Packing list</a>"), "{page}");
    assert!(page.contains(" and Missing Note and "));
    assert!(page.contains("<a href=\"/packing.html\">packing</a>"));
}

#[test]
fn test_footnote_ids_are_scoped_to_the_page() {
    let ws = Workspace::new();
    let source = MemorySource::new([note("F", "Cited", "Claim[^1].\n[^1]: Source", 1).with_folder_path(["Essays"])]);
    ws.publish(&source);

    let page = ws.read("essays/cited.html");
    assert!(page.contains("id=\"essays-cited--footnote-1--anchor\""));
    assert!(page.contains("<li id=\"essays-cited--footnote-1\">Source"));
    assert!(page.contains("<footer>"));
}

#[test]
fn test_styled_body() {
    let ws = Workspace::new();
    let blob = NoteBlobBuilder::new("Styled\nHello World")
        .plain(7)
        .styled(5, Attr::Bold)
        .fill()
        .gzip()
        .unwrap();
    let source = MemorySource::new([Note::new("S", "Styled").with_body(blob)]);
    ws.publish(&source);
    assert!(ws.read("styled.html").contains("<p><strong>Hello</strong> World</p>"));
}

#[test]
fn test_titles_are_escaped() {
    let ws = Workspace::new();
    let source = MemorySource::new([note("E", "Fish & <Chips>", "x", 1)]);
    ws.publish(&source);
    let page = ws.read("fish-chips.html");
    assert!(page.contains("<h1>Fish &amp; &lt;Chips&gt;</h1>"));
    check_well_formed(&ws.read("feed.xml")).unwrap();
}
