//! Collection catalog entries and TTL expiry (SPEC_FULL.md "TTL-bearing
//! collections"): a per-collection option naming a DateTime field whose
//! elapsing marks a document stale. The document's own field is read
//! directly — documents are stored as plain BSON bytes, nothing wraps
//! them in a separate envelope.

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use ejdb_bson::IndexKind;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexSpec {
    pub field: String,
    pub kind: IndexKind,
    pub unique: bool,
}

/// Per-collection tuning, expanding spec.md's collection meta block
/// with the "page warmup" hints SPEC_FULL.md names: these are advisory
/// and do not change read/write semantics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CollectionOptions {
    pub expected_record_count: Option<u64>,
    pub record_cache_size: Option<u64>,
    pub large_file: bool,
    pub compressed: bool,
    /// Dotted path to a top-level DateTime field; once it elapses the
    /// document is treated as absent by reads and is reaped lazily on
    /// the next scan that passes over it.
    pub ttl_field: Option<String>,
    /// In-memory budget for the executor's sort buffer before it spills
    /// to a temp file (spec.md §4.6). `None` lets the caller fall back
    /// to a default.
    pub sort_buffer_sz: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionMeta {
    pub name: String,
    pub options: CollectionOptions,
    pub indexes: Vec<IndexSpec>,
}

impl CollectionMeta {
    pub fn new(name: impl Into<String>, options: CollectionOptions) -> Self {
        Self {
            name: name.into(),
            options,
            indexes: Vec::new(),
        }
    }

    pub fn index_on(&self, field: &str) -> Option<&IndexSpec> {
        self.indexes.iter().find(|ix| ix.field == field)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        bson::to_vec(self).expect("CollectionMeta always serializes")
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bson::from_slice(bytes).ok()
    }
}

/// `now_millis` is passed in rather than read from the clock so callers
/// control the time source (tests, and the engine's single read of
/// "now" per transaction).
pub fn is_expired(doc: &Document, options: &CollectionOptions, now_millis: i64) -> bool {
    let Some(field) = &options.ttl_field else {
        return false;
    };
    match ejdb_bson::path::get(&Bson::Document(doc.clone()), field) {
        Some(Bson::DateTime(dt)) => dt.timestamp_millis() <= now_millis,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn meta_roundtrips_through_bson() {
        let mut meta = CollectionMeta::new("sessions", CollectionOptions::default());
        meta.indexes.push(IndexSpec {
            field: "user_id".to_string(),
            kind: IndexKind::String,
            unique: false,
        });
        let bytes = meta.to_bytes();
        let back = CollectionMeta::from_bytes(&bytes).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn ttl_field_absent_never_expires() {
        let opts = CollectionOptions::default();
        assert!(!is_expired(&doc! { "a": 1 }, &opts, 1_000));
    }

    #[test]
    fn past_ttl_datetime_is_expired() {
        let opts = CollectionOptions {
            ttl_field: Some("expires_at".to_string()),
            ..Default::default()
        };
        let doc = doc! { "expires_at": bson::DateTime::from_millis(100) };
        assert!(is_expired(&doc, &opts, 200));
        assert!(!is_expired(&doc, &opts, 50));
    }
}
