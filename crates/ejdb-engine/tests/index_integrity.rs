use bson::doc;

use ejdb_bson::IndexKind;
use ejdb_engine::{CollectionOptions, IndexRange, IndexSpec, KvEngine};
use ejdb_store::MemoryStore;

fn engine() -> KvEngine<MemoryStore> {
    KvEngine::open(MemoryStore::new()).unwrap()
}

#[test]
fn array_index_finds_document_by_any_element() {
    let engine = engine();
    let mut txn = engine.begin(false).unwrap();
    txn.create_collection("posts", CollectionOptions::default())
        .unwrap();
    txn.create_index(
        "posts",
        "tags",
        IndexSpec {
            field: "tags".to_string(),
            kind: IndexKind::Array,
            unique: false,
        },
    )
    .unwrap();
    let id = txn
        .insert("posts", doc! { "tags": ["rust", "db"] })
        .unwrap();

    let hits = txn
        .scan_index("posts", "tags", IndexRange::Eq(b"db"))
        .unwrap();
    assert_eq!(hits, vec![id]);
    txn.commit().unwrap();
}

#[test]
fn qgram_index_finds_document_by_substring() {
    let engine = engine();
    let mut txn = engine.begin(false).unwrap();
    txn.create_collection("posts", CollectionOptions::default())
        .unwrap();
    txn.create_index(
        "posts",
        "body",
        IndexSpec {
            field: "body".to_string(),
            kind: IndexKind::Qgram,
            unique: false,
        },
    )
    .unwrap();
    let id = txn
        .insert("posts", doc! { "body": "the quick brown fox" })
        .unwrap();

    let hits = txn
        .scan_index("posts", "body", IndexRange::Eq(b"qu"))
        .unwrap();
    assert_eq!(hits, vec![id]);
    txn.commit().unwrap();
}

#[test]
fn expired_document_is_invisible_to_get_and_scan() {
    let engine = engine();
    let mut txn = engine.begin(false).unwrap();
    txn.create_collection(
        "sessions",
        CollectionOptions {
            ttl_field: Some("expires_at".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    let id = txn
        .insert(
            "sessions",
            doc! { "expires_at": bson::DateTime::from_millis(1) },
        )
        .unwrap();

    assert!(txn.get("sessions", &id).unwrap().is_none());
    assert!(txn.scan("sessions").unwrap().is_empty());
    txn.commit().unwrap();
}

#[test]
fn non_unique_index_allows_repeated_values() {
    let engine = engine();
    let mut txn = engine.begin(false).unwrap();
    txn.create_collection("contacts", CollectionOptions::default())
        .unwrap();
    txn.create_index(
        "contacts",
        "city",
        IndexSpec {
            field: "city".to_string(),
            kind: IndexKind::IString,
            unique: false,
        },
    )
    .unwrap();
    txn.insert("contacts", doc! { "city": "Gotham" }).unwrap();
    txn.insert("contacts", doc! { "city": "gotham" }).unwrap();

    let hits = txn
        .scan_index("contacts", "city", IndexRange::Eq(b"gotham"))
        .unwrap();
    assert_eq!(hits.len(), 2);
    txn.commit().unwrap();
}

#[test]
fn redeclaring_identical_index_is_a_no_op() {
    let engine = engine();
    let mut txn = engine.begin(false).unwrap();
    txn.create_collection("contacts", CollectionOptions::default())
        .unwrap();
    let spec = IndexSpec {
        field: "email".to_string(),
        kind: IndexKind::String,
        unique: true,
    };
    txn.create_index("contacts", "email", spec.clone()).unwrap();
    txn.create_index("contacts", "email", spec).unwrap();
    txn.commit().unwrap();
}
