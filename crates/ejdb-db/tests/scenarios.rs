use bson::rawdoc;

use ejdb_bson::IndexKind;
use ejdb_db::{Db, OpenOptions};
use ejdb_engine::CollectionOptions;
use ejdb_store::MemoryStore;

fn open() -> Db<MemoryStore> {
    Db::open(MemoryStore::new(), OpenOptions::read_write()).unwrap()
}

/// S1: save a document, load it back by id, get the same fields.
#[test]
fn save_and_load_roundtrips() {
    let db = open();
    db.ensure_collection("people", CollectionOptions::default()).unwrap();
    let id = db.save("people", bson::doc! { "name": "Bruce", "age": 40 }).unwrap();
    let loaded = db.load("people", &id).unwrap().unwrap();
    assert_eq!(loaded.get_str("name").unwrap(), "Bruce");
    assert_eq!(loaded.get_i32("age").unwrap(), 40);
}

/// S2: a `$begin` prefix query against a string index returns only the
/// matching prefix, driven by the index rather than a full scan.
#[test]
fn prefix_query_uses_index() {
    let db = open();
    db.ensure_collection("people", CollectionOptions::default()).unwrap();
    db.ensure_index("people", "name", IndexKind::String, false).unwrap();
    db.save("people", bson::doc! { "name": "Wayne" }).unwrap();
    db.save("people", bson::doc! { "name": "Waylon" }).unwrap();
    db.save("people", bson::doc! { "name": "Kent" }).unwrap();

    let query = rawdoc! { "name": { "$begin": "Way" } };
    let result = db.exec("people", &query, true).unwrap();
    assert_eq!(result.docs.len(), 2);
    assert!(result.log.iter().any(|l| l.contains("field=name")));
}

/// S3: a unique index rejects a second document with a colliding value,
/// and the first document's write is unaffected.
#[test]
fn unique_index_rejects_duplicate() {
    let db = open();
    db.ensure_collection("people", CollectionOptions::default()).unwrap();
    db.ensure_index("people", "email", IndexKind::String, true).unwrap();
    db.save("people", bson::doc! { "email": "a@x.com" }).unwrap();
    let second = db.save("people", bson::doc! { "email": "a@x.com" });
    assert!(second.is_err());

    let query = rawdoc! { "email": "a@x.com" };
    let result = db.exec("people", &query, false).unwrap();
    assert_eq!(result.docs.len(), 1);
}

/// A shorter unique value that happens to be a byte-prefix of an
/// already-stored longer one (or vice versa) is not a collision: the
/// index key encoding must not let "Bob" and "Bobby" alias each other.
#[test]
fn unique_index_allows_prefix_colliding_values() {
    let db = open();
    db.ensure_collection("people", CollectionOptions::default()).unwrap();
    db.ensure_index("people", "name", IndexKind::String, true).unwrap();
    db.save("people", bson::doc! { "name": "Bobby" }).unwrap();
    db.save("people", bson::doc! { "name": "Bob" }).unwrap();

    let bobby = db.exec("people", &rawdoc! { "name": "Bobby" }, false).unwrap();
    assert_eq!(bobby.docs.len(), 1);
    let bob = db.exec("people", &rawdoc! { "name": "Bob" }, false).unwrap();
    assert_eq!(bob.docs.len(), 1);
}

/// S4: a numeric range query returns exactly the matching rows, with an
/// execution-log entry naming the index it drove off of.
#[test]
fn range_query_with_execution_log() {
    let db = open();
    db.ensure_collection("events", CollectionOptions::default()).unwrap();
    db.ensure_index("events", "priority", IndexKind::Number, false).unwrap();
    for p in 0..10 {
        db.save("events", bson::doc! { "priority": p }).unwrap();
    }

    let query = rawdoc! { "priority": { "$gte": 4_i32, "$lt": 8_i32 } };
    let result = db.exec("events", &query, true).unwrap();
    assert_eq!(result.docs.len(), 4);
    assert!(result.log.iter().any(|l| l.contains("kind=range")));
}

/// S5: writes made inside a transaction that is aborted are invisible
/// once the transaction ends — the pre-begin state is preserved.
#[test]
fn abort_leaves_pre_begin_state() {
    let db = open();
    db.ensure_collection("accounts", CollectionOptions::default()).unwrap();
    let id = db.save("accounts", bson::doc! { "balance": 100_i32 }).unwrap();

    {
        let mut txn = db.begin(false).unwrap();
        txn.remove("accounts", &id).unwrap();
        txn.save("accounts", bson::doc! { "balance": 999_i32 }).unwrap();
        txn.abort().unwrap();
    }

    let loaded = db.load("accounts", &id).unwrap().unwrap();
    assert_eq!(loaded.get_i32("balance").unwrap(), 100);

    let query = rawdoc! { "balance": 999_i32 };
    let result = db.exec("accounts", &query, false).unwrap();
    assert!(result.docs.is_empty());
}

/// A second `begin()` while a transaction is already open on the handle
/// is rejected rather than silently nesting (spec.md §4.7).
#[test]
fn nested_begin_is_rejected() {
    let db = open();
    let _txn = db.begin(false).unwrap();
    assert!(db.begin(false).is_err());
}

/// S6: sorting falls back to an external merge once the in-memory
/// buffer is exhausted, and still returns rows in the requested order.
#[test]
fn sort_with_small_buffer_still_orders_correctly() {
    let db = open();
    db.ensure_collection(
        "scores",
        CollectionOptions {
            sort_buffer_sz: Some(1),
            ..Default::default()
        },
    )
    .unwrap();
    for n in (0..20).rev() {
        db.save("scores", bson::doc! { "n": n }).unwrap();
    }

    let query = rawdoc! { "$orderby": { "n": 1_i32 } };
    let result = db.exec("scores", &query, false).unwrap();
    let values: Vec<i32> = result
        .docs
        .iter()
        .map(|d| d.get_i32("n").unwrap())
        .collect();
    let mut expected: Vec<i32> = (0..20).collect();
    expected.sort();
    assert_eq!(values, expected);
}

/// `$upsert`: zero matches on a pure-equality filter synthesizes a new
/// document from the filter's equalities merged with the payload.
#[test]
fn upsert_synthesizes_document_on_zero_matches() {
    let db = open();
    db.ensure_collection("counters", CollectionOptions::default()).unwrap();

    let query = rawdoc! {
        "name": "visits",
        "$set": { "count": 1_i32 },
        "$upsert": { "count": 1_i32 },
    };
    let result = db.exec("counters", &query, false).unwrap();
    assert!(result.upserted_id.is_some());

    let all = db.exec("counters", &rawdoc! { "name": "visits" }, false).unwrap();
    assert_eq!(all.docs.len(), 1);
    assert_eq!(all.docs[0].get_i32("count").unwrap(), 1);
}

/// `$upsert` alongside a non-equality atom is rejected up front rather
/// than silently skipping the upsert (or, worse, running as a plain
/// update with no upsert at all when the atom happens to match rows).
#[test]
fn upsert_with_non_equality_filter_is_rejected() {
    let db = open();
    db.ensure_collection("counters", CollectionOptions::default()).unwrap();
    db.save("counters", bson::doc! { "name": "visits", "count": 5_i32 }).unwrap();

    let query = rawdoc! {
        "count": { "$gt": 0_i32 },
        "$set": { "count": 6_i32 },
        "$upsert": { "count": 1_i32 },
    };
    assert!(db.exec("counters", &query, false).is_err());
}

/// `$search` drives off a q-gram index but the match is re-verified as
/// an exact normalized substring, so a document whose field merely
/// shares a gram with the search text (without containing it) is
/// excluded.
#[test]
fn search_matches_substring_via_qgram_index() {
    let db = open();
    db.ensure_collection("articles", CollectionOptions::default()).unwrap();
    db.ensure_index("articles", "body", IndexKind::Qgram, false).unwrap();
    db.save("articles", bson::doc! { "body": "the quick brown fox" }).unwrap();
    db.save("articles", bson::doc! { "body": "a slow red turtle" }).unwrap();

    let query = rawdoc! { "body": { "$search": "quick brown" } };
    let result = db.exec("articles", &query, false).unwrap();
    assert_eq!(result.docs.len(), 1);
    assert_eq!(result.docs[0].get_str("body").unwrap(), "the quick brown fox");

    let miss = db.exec("articles", &rawdoc! { "body": { "$search": "slow fox" } }, false).unwrap();
    assert!(miss.docs.is_empty());
}
