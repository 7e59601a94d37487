//! ACID and crash recovery integration tests for StrictDB.
//!
//! These tests verify that the storage layer provides the expected
//! durability and atomicity guarantees at the StrictDB level.
//!
//! # Crash Simulation
//!
//! We simulate a crash by dropping the `StrictDB` handle without calling
//! `close()`. Dropping never saves, so only what a successful `save()`
//! committed may be visible after reopening.
//!
//! redb uses shadow paging (not a WAL), so the database is always in a
//! consistent state: either the commit completed (data is present) or it
//! didn't (data is absent). There is never a half-committed state.

use serde_json::json;
use strictdb::{CollectionOptions, Config, Document, StrictDB};
use tempfile::tempdir;

/// Helper: open a StrictDB at the given path with default config.
fn open_db(path: &std::path::Path) -> StrictDB {
    StrictDB::open(path, Config::default()).unwrap()
}

fn doc(value: serde_json::Value) -> Document {
    value.as_object().cloned().unwrap()
}

// ============================================================================
// Durability Tests
// ============================================================================

#[test]
fn test_saved_data_survives_crash() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("crash.db");

    {
        let mut db = open_db(&path);
        db.add_collection("posts", CollectionOptions::new().unique(["slug"]))
            .unwrap()
            .insert(doc(json!({"slug": "durable"})))
            .unwrap();
        db.save().unwrap();
        // NO close() -- simulates crash
    }

    let db = open_db(&path);
    let posts = db.get_collection("posts").unwrap();
    assert_eq!(posts.count(), 1, "Saved data must survive a crash");
    assert_eq!(posts.documents()[0]["slug"], json!("durable"));
    db.close().unwrap();
}

#[test]
fn test_unsaved_changes_lost_on_crash() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("crash.db");

    {
        let mut db = open_db(&path);
        db.add_collection("posts", CollectionOptions::new()).unwrap();
        db.save().unwrap();

        db.get_collection_mut("posts")
            .unwrap()
            .insert(doc(json!({"slug": "never-saved"})))
            .unwrap();
        db.add_collection("drafts", CollectionOptions::new()).unwrap();
        // NO save(), NO close() -- crash
    }

    let db = open_db(&path);
    assert_eq!(db.collection_names(), vec!["posts".to_string()]);
    assert!(db.get_collection("posts").unwrap().is_empty());
    db.close().unwrap();
}

#[test]
fn test_bulk_data_survives_crash() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bulk.db");

    {
        let mut db = open_db(&path);
        let items = db
            .add_collection("items", CollectionOptions::new().unique(["sku"]))
            .unwrap();
        for i in 0..100 {
            items
                .insert(doc(json!({"sku": format!("sku-{}", i), "n": i})))
                .unwrap();
        }
        db.save().unwrap();
    }

    let db = open_db(&path);
    let items = db.get_collection("items").unwrap();
    assert_eq!(items.count(), 100);
    for i in 0..100 {
        let found = items.by("sku", &json!(format!("sku-{}", i))).unwrap();
        assert_eq!(found.unwrap()["n"], json!(i), "sku-{} must be present", i);
    }
    db.close().unwrap();
}

#[test]
fn test_multiple_crash_cycles() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cycles.db");

    // Cycle 1: create and crash
    {
        let mut db = open_db(&path);
        db.add_collection("log", CollectionOptions::new())
            .unwrap()
            .insert(doc(json!({"cycle": 1})))
            .unwrap();
        db.save().unwrap();
    }

    // Cycle 2: add more and crash again
    {
        let mut db = open_db(&path);
        let log = db.get_collection_mut("log").unwrap();
        assert_eq!(log.count(), 1, "Cycle 1 data must survive");
        log.insert(doc(json!({"cycle": 2}))).unwrap();
        db.save().unwrap();
    }

    // Cycle 3: verify both survived, in insertion order
    let db = open_db(&path);
    let cycles: Vec<_> = db
        .get_collection("log")
        .unwrap()
        .iter()
        .map(|d| d["cycle"].clone())
        .collect();
    assert_eq!(cycles, vec![json!(1), json!(2)]);
    db.close().unwrap();
}

// ============================================================================
// Atomicity Tests
// ============================================================================

#[test]
fn test_save_replaces_whole_snapshot() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.db");

    let mut db = open_db(&path);
    db.add_collection("a", CollectionOptions::new())
        .unwrap()
        .insert(doc(json!({"x": 1})))
        .unwrap();
    db.add_collection("b", CollectionOptions::new()).unwrap();
    db.save().unwrap();

    // Removing a collection and saving must not leave its records behind
    db.remove_collection("a");
    db.save().unwrap();
    db.close().unwrap();

    let mut db = open_db(&path);
    assert_eq!(db.collection_names(), vec!["b".to_string()]);

    // A new collection reusing the name starts empty with fresh IDs
    let a = db.add_collection("a", CollectionOptions::new()).unwrap();
    assert!(a.is_empty());
    assert_eq!(a.insert(doc(json!({"x": 2}))).unwrap()["_id"], json!(1));
    db.close().unwrap();
}

#[test]
fn test_reload_restores_last_save() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reload.db");

    let mut db = open_db(&path);
    let posts = db
        .add_collection("posts", CollectionOptions::new().unique(["slug"]))
        .unwrap();
    posts.insert(doc(json!({"slug": "a"}))).unwrap();
    db.save().unwrap();

    db.get_collection_mut("posts").unwrap().clear();
    db.reload().unwrap();

    let posts = db.get_collection("posts").unwrap();
    assert_eq!(posts.count(), 1);
    assert!(posts.by("slug", &json!("a")).unwrap().is_some());
    db.close().unwrap();
}

#[test]
fn test_record_fields_roundtrip_exactly() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fields.db");

    let original = doc(json!({
        "slug": "nested",
        "tags": ["a", "b"],
        "author": {"name": "x", "age": 3},
        "ratio": 0.25,
        "flag": false,
        "empty": null
    }));

    let mut db = open_db(&path);
    let stored = db
        .add_collection("posts", CollectionOptions::new())
        .unwrap()
        .insert(original)
        .unwrap();
    db.close().unwrap();

    let db = open_db(&path);
    assert_eq!(db.get_collection("posts").unwrap().documents(), vec![stored]);
    db.close().unwrap();
}
