use entropic_sketchbook::{
    BinItemKey, BinItemKind, Layout, Sketchbook, SketchbookError, DEFAULT_TEMPLATE,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn open_book() -> (TempDir, Sketchbook) {
    let dir = TempDir::new().expect("tempdir");
    let book = Sketchbook::open(Layout::for_documents_dir(dir.path())).expect("open");
    (dir, book)
}

fn listed_ids(book: &Sketchbook) -> Vec<String> {
    book.sketches()
        .list()
        .expect("list")
        .into_iter()
        .map(|s| s.id)
        .collect()
}

#[test]
fn open_creates_documents_layout() {
    let (dir, book) = open_book();
    assert!(dir.path().join("Entropic").join("sketches").is_dir());
    assert!(dir.path().join("Entropic").join(".bin").is_dir());
    assert!(listed_ids(&book).is_empty());
    assert!(book.bin().list().expect("bin").is_empty());
}

#[test]
fn create_then_load_returns_template() {
    let (_dir, book) = open_book();
    for name in ["Waves", "1 Test", "草图", "with space"] {
        let sketch = book.sketches().create(Some(name)).expect("create");
        assert_eq!(book.sketches().load(&sketch.id).expect("load"), DEFAULT_TEMPLATE);
    }
}

#[test]
fn rename_preserves_content_and_hides_old_id() {
    let (_dir, book) = open_book();
    let sketches = book.sketches();
    sketches.create(Some("Before")).expect("create");
    sketches.save("Before", "void draw() { ellipse(1, 2, 3, 4); }").expect("save");
    let before = sketches.load("Before").expect("load");

    let new_id = sketches.rename("Before", "After").expect("rename");
    assert_eq!(sketches.load(&new_id).expect("load"), before);
    assert_eq!(listed_ids(&book), vec!["After".to_string()]);
    assert!(matches!(
        sketches.load("Before"),
        Err(SketchbookError::NotFound(_))
    ));
}

#[test]
fn soft_deleted_sketch_round_trips_through_bin() {
    let (_dir, book) = open_book();
    let sketches = book.sketches();
    sketches.create(Some("Waves")).expect("create");
    sketches.save("Waves", "// keep me").expect("save");
    book.variants().stage("Waves", None).expect("stage");

    let item = sketches.soft_delete("Waves").expect("delete");
    assert_eq!(item.kind, BinItemKind::Sketch);
    assert!(listed_ids(&book).is_empty());
    assert_eq!(book.bin().list().expect("bin"), vec![item.clone()]);

    let outcome = book.bin().restore(&item.key()).expect("restore");
    assert!(!outcome.file_missing);
    assert_eq!(listed_ids(&book), vec!["Waves".to_string()]);
    assert_eq!(sketches.load("Waves").expect("load"), "// keep me");
    assert_eq!(book.variants().list("Waves").expect("variants").len(), 1);
    assert!(book.bin().list().expect("bin").is_empty());
}

#[test]
fn deleting_same_sketch_twice_keeps_one_bin_entry() {
    let (_dir, book) = open_book();
    let sketches = book.sketches();
    sketches.create(Some("Twice")).expect("create");
    sketches.soft_delete("Twice").expect("first delete");
    sketches.create(Some("Twice")).expect("recreate");
    sketches.save("Twice", "// second").expect("save");
    sketches.soft_delete("Twice").expect("second delete");

    assert_eq!(book.bin().list().expect("bin").len(), 1);
    book.bin()
        .restore(&BinItemKey::sketch("Twice"))
        .expect("restore");
    assert_eq!(sketches.load("Twice").expect("load"), "// second");
}

#[test]
fn staged_variant_is_independent_of_later_edits() {
    let (_dir, book) = open_book();
    book.sketches().create(Some("Waves")).expect("create");
    book.sketches().save("Waves", "// at stage time").expect("save");
    let variant = book.variants().stage("Waves", Some("snap")).expect("stage");
    book.sketches().save("Waves", "// later").expect("save");

    assert_eq!(
        book.variants().load("Waves", &variant.id).expect("load"),
        "// at stage time"
    );
}

#[test]
fn restoring_variant_overwrites_main_source() {
    let (_dir, book) = open_book();
    book.sketches().create(Some("Waves")).expect("create");
    let variant = book.variants().stage("Waves", None).expect("stage");
    book.variants()
        .save("Waves", &variant.id, "// edited draft")
        .expect("save variant");

    book.variants().restore("Waves", &variant.id).expect("restore");
    assert_eq!(book.sketches().load("Waves").expect("load"), "// edited draft");
}

#[test]
fn deleted_variant_lands_in_bin_with_origin() {
    let (_dir, book) = open_book();
    book.sketches().create(Some("Waves")).expect("create");
    let v1 = book.variants().stage("Waves", None).expect("v1");
    book.variants().stage("Waves", None).expect("v2");

    book.variants().soft_delete("Waves", "v1").expect("delete");

    let bin = book.bin().list().expect("bin");
    assert_eq!(bin.len(), 1);
    assert_eq!(bin[0].kind, BinItemKind::Variant);
    assert_eq!(bin[0].id, "v1");
    assert_eq!(bin[0].sketch_id.as_deref(), Some("Waves"));
    assert_eq!(bin[0].name, v1.name);
    assert_eq!(bin[0].original_timestamp, Some(v1.timestamp));

    let ids: Vec<_> = book
        .variants()
        .list("Waves")
        .expect("list")
        .into_iter()
        .map(|v| v.id)
        .collect();
    assert_eq!(ids, vec!["v2".to_string()]);

    book.bin()
        .restore(&BinItemKey::variant("Waves", "v1"))
        .expect("restore");
    let ids: Vec<_> = book
        .variants()
        .list("Waves")
        .expect("list")
        .into_iter()
        .map(|v| v.id)
        .collect();
    assert_eq!(ids, vec!["v1".to_string(), "v2".to_string()]);
    assert_eq!(book.variants().stage("Waves", None).expect("v3").id, "v3");
}

#[test]
fn variant_restore_conflicts_when_id_is_active() {
    let (_dir, book) = open_book();
    book.sketches().create(Some("Waves")).expect("create");
    book.variants().stage("Waves", None).expect("v1");
    book.variants().soft_delete("Waves", "v1").expect("delete");

    // Recreate a snapshot with the same id out of band.
    let layout = book.layout();
    std::fs::write(layout.variant_source("Waves", "v1"), "// squatter").expect("write");

    let err = book
        .bin()
        .restore(&BinItemKey::variant("Waves", "v1"))
        .expect_err("conflict");
    assert!(matches!(err, SketchbookError::Conflict(_)));
}

#[test]
fn sweep_purges_only_items_older_than_retention() {
    let (_dir, book) = open_book();
    book.sketches().create(Some("Old")).expect("create");
    let item = book.sketches().soft_delete("Old").expect("delete");

    let just_inside = item.deleted_at + entropic_sketchbook::BIN_RETENTION_MS;
    assert!(book.bin().sweep_expired_at(just_inside).expect("sweep").is_empty());
    assert_eq!(book.bin().list().expect("bin").len(), 1);

    let report = book.bin().sweep_expired_at(just_inside + 1).expect("sweep");
    assert_eq!(report.purged.len(), 1);
    assert!(book.bin().list().expect("bin").is_empty());
    assert!(!book.layout().binned_sketch("Old").exists());
}

#[test]
fn unsafe_ids_are_rejected_everywhere() {
    let (_dir, book) = open_book();
    assert!(matches!(
        book.sketches().load("../escape"),
        Err(SketchbookError::InvalidName(_))
    ));
    assert!(matches!(
        book.variants().load("Waves", "../../x"),
        Err(SketchbookError::InvalidName(_))
    ));
    assert!(matches!(
        book.bin().restore(&BinItemKey::sketch(".bin")),
        Err(SketchbookError::InvalidName(_))
    ));
}

#[test]
fn binned_variants_follow_their_sketch_through_rename() {
    let (dir, book) = open_book();
    book.sketches().create(Some("A")).expect("create");
    book.sketches().save("A", "void draw() { rect(0, 0, 5, 5); }").expect("save");
    book.variants().stage("A", None).expect("v1");
    book.variants().soft_delete("A", "v1").expect("delete");

    let new_id = book.sketches().rename("A", "B").expect("rename");
    assert_eq!(new_id, "B");

    let items = book.bin().list().expect("bin");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].sketch_id.as_deref(), Some("B"));
    let bin_dir = dir.path().join("Entropic").join(".bin");
    assert!(bin_dir.join("B_v1.pde").is_file());
    assert!(!bin_dir.join("A_v1.pde").exists());

    book.bin().restore(&items[0].key()).expect("restore");
    assert_eq!(
        book.variants().load("B", "v1").expect("load"),
        "void draw() { rect(0, 0, 5, 5); }"
    );
    assert!(book.bin().list().expect("bin").is_empty());
}

#[test]
fn listed_bin_items_parse_back_into_keys() {
    let (_dir, book) = open_book();
    for id in ["First", "Second"] {
        book.sketches().create(Some(id)).expect("create");
        book.variants().stage(id, None).expect("v1");
        book.variants().soft_delete(id, "v1").expect("delete");
    }

    let items = book.bin().list().expect("bin");
    assert_eq!(items.len(), 2);
    let echoed = serde_json::to_value(&items[1]).expect("encode");
    let key: BinItemKey = serde_json::from_value(echoed).expect("decode key");
    assert_eq!(key, BinItemKey::variant("Second", "v1"));

    let outcome = book.bin().restore(&key).expect("restore");
    assert_eq!(outcome.item.sketch_id.as_deref(), Some("Second"));
    let ids: Vec<_> = book
        .variants()
        .list("Second")
        .expect("list")
        .into_iter()
        .map(|v| v.id)
        .collect();
    assert_eq!(ids, vec!["v1".to_string()]);
    assert_eq!(book.bin().list().expect("bin").len(), 1);
}
