use bson::doc;

use ejdb_engine::{CollectionOptions, IndexSpec, KvEngine};
use ejdb_bson::IndexKind;
use ejdb_store::MemoryStore;

fn engine() -> KvEngine<MemoryStore> {
    KvEngine::open(MemoryStore::new()).unwrap()
}

#[test]
fn create_collection_rejects_duplicate() {
    let engine = engine();
    let mut txn = engine.begin(false).unwrap();
    txn.create_collection("contacts", CollectionOptions::default())
        .unwrap();
    assert!(txn
        .create_collection("contacts", CollectionOptions::default())
        .is_err());
    txn.commit().unwrap();
}

#[test]
fn insert_assigns_id_and_roundtrips() {
    let engine = engine();
    let mut txn = engine.begin(false).unwrap();
    txn.create_collection("contacts", CollectionOptions::default())
        .unwrap();
    let id = txn.insert("contacts", doc! { "name": "Bruce" }).unwrap();
    let fetched = txn.get("contacts", &id).unwrap().unwrap();
    assert_eq!(fetched.get_str("name").unwrap(), "Bruce");
    txn.commit().unwrap();
}

#[test]
fn delete_removes_document() {
    let engine = engine();
    let mut txn = engine.begin(false).unwrap();
    txn.create_collection("contacts", CollectionOptions::default())
        .unwrap();
    let id = txn.insert("contacts", doc! { "name": "Bruce" }).unwrap();
    assert!(txn.delete("contacts", &id).unwrap());
    assert!(txn.get("contacts", &id).unwrap().is_none());
    assert!(!txn.delete("contacts", &id).unwrap());
    txn.commit().unwrap();
}

#[test]
fn scan_lists_every_live_document() {
    let engine = engine();
    let mut txn = engine.begin(false).unwrap();
    txn.create_collection("contacts", CollectionOptions::default())
        .unwrap();
    txn.insert("contacts", doc! { "name": "A" }).unwrap();
    txn.insert("contacts", doc! { "name": "B" }).unwrap();
    let all = txn.scan("contacts").unwrap();
    assert_eq!(all.len(), 2);
    txn.commit().unwrap();
}

#[test]
fn unique_index_rejects_duplicate_value() {
    let engine = engine();
    let mut txn = engine.begin(false).unwrap();
    txn.create_collection("contacts", CollectionOptions::default())
        .unwrap();
    txn.create_index(
        "contacts",
        "email",
        IndexSpec {
            field: "email".to_string(),
            kind: IndexKind::String,
            unique: true,
        },
    )
    .unwrap();
    txn.insert("contacts", doc! { "email": "a@x.com" }).unwrap();
    assert!(txn.insert("contacts", doc! { "email": "a@x.com" }).is_err());
    txn.commit().unwrap();
}

#[test]
fn create_index_backfills_existing_documents() {
    let engine = engine();
    let mut txn = engine.begin(false).unwrap();
    txn.create_collection("contacts", CollectionOptions::default())
        .unwrap();
    txn.insert("contacts", doc! { "age": 30 }).unwrap();
    txn.insert("contacts", doc! { "age": 40 }).unwrap();
    txn.create_index(
        "contacts",
        "age",
        IndexSpec {
            field: "age".to_string(),
            kind: IndexKind::Number,
            unique: false,
        },
    )
    .unwrap();
    let hits = txn
        .scan_index("contacts", "age", ejdb_engine::IndexRange::Full)
        .unwrap();
    assert_eq!(hits.len(), 2);
    txn.commit().unwrap();
}

#[test]
fn replace_diffs_index_entries() {
    let engine = engine();
    let mut txn = engine.begin(false).unwrap();
    txn.create_collection("contacts", CollectionOptions::default())
        .unwrap();
    txn.create_index(
        "contacts",
        "name",
        IndexSpec {
            field: "name".to_string(),
            kind: IndexKind::String,
            unique: false,
        },
    )
    .unwrap();
    let id = txn.insert("contacts", doc! { "name": "Bruce" }).unwrap();
    txn.replace("contacts", &id, doc! { "_id": id, "name": "Wayne" })
        .unwrap();

    let bruce_hits = txn
        .scan_index(
            "contacts",
            "name",
            ejdb_engine::IndexRange::Eq(b"Bruce"),
        )
        .unwrap();
    assert!(bruce_hits.is_empty());

    let wayne_hits = txn
        .scan_index(
            "contacts",
            "name",
            ejdb_engine::IndexRange::Eq(b"Wayne"),
        )
        .unwrap();
    assert_eq!(wayne_hits, vec![id]);
    txn.commit().unwrap();
}

#[test]
fn drop_collection_clears_records_and_indexes() {
    let engine = engine();
    let mut txn = engine.begin(false).unwrap();
    txn.create_collection("contacts", CollectionOptions::default())
        .unwrap();
    txn.create_index(
        "contacts",
        "name",
        IndexSpec {
            field: "name".to_string(),
            kind: IndexKind::String,
            unique: false,
        },
    )
    .unwrap();
    txn.insert("contacts", doc! { "name": "Bruce" }).unwrap();
    txn.drop_collection("contacts").unwrap();
    assert!(txn.get_collection("contacts").unwrap().is_none());
    txn.create_collection("contacts", CollectionOptions::default())
        .unwrap();
    assert!(txn.scan("contacts").unwrap().is_empty());
    txn.commit().unwrap();
}
