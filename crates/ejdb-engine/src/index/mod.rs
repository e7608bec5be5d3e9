//! Per-document index-entry computation.
//!
//! Given a collection's index specs and a document, produce the set of
//! index keys that must exist for it. Update maintenance then diffs the
//! old document's entries against the new document's entries and writes
//! only the delta (see `kv::catalog::replace_document`).

use std::collections::BTreeMap;
use std::ops::Bound;

use bson::oid::ObjectId;
use bson::{Bson, Document};

use ejdb_bson::{key as keyenc, qgram, IndexKind};

use crate::encoding::{IndexSpec, Postings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub field: String,
    pub value_bytes: Vec<u8>,
    pub postings: Option<Postings>,
}

/// A query against a single index field, from a full scan down to a
/// bounded range — the shapes `ejdb-query`'s planner compiles its
/// operators into.
#[derive(Debug, Clone)]
pub enum IndexRange<'a> {
    Full,
    Eq(&'a [u8]),
    Range {
        lower: Bound<&'a [u8]>,
        upper: Bound<&'a [u8]>,
    },
}

/// Compute every index entry `doc` contributes under `indexes`.
/// Fields absent from the document, or whose value doesn't match the
/// index kind, contribute no entry (spec.md I2).
pub fn entries_for_document(
    indexes: &[IndexSpec],
    doc: &Document,
    _doc_id: &ObjectId,
) -> Vec<IndexEntry> {
    let mut out = Vec::new();
    for spec in indexes {
        let owned = Bson::Document(doc.clone());
        let Some(value) = ejdb_bson::path::get(&owned, &spec.field) else {
            continue;
        };
        match spec.kind {
            IndexKind::Array => {
                if let Bson::Array(items) = value {
                    for item in items {
                        if let Some(bytes) = encode_array_element(item) {
                            out.push(IndexEntry {
                                field: spec.field.clone(),
                                value_bytes: bytes,
                                postings: None,
                            });
                        }
                    }
                }
            }
            IndexKind::Qgram => {
                if let Bson::String(s) = value {
                    let mut by_gram: BTreeMap<String, Vec<u32>> = BTreeMap::new();
                    for gram in qgram::tokenize(s) {
                        by_gram.entry(gram.text).or_default().push(gram.position);
                    }
                    for (text, positions) in by_gram {
                        out.push(IndexEntry {
                            field: spec.field.clone(),
                            value_bytes: text.into_bytes(),
                            postings: Some(Postings::new(positions)),
                        });
                    }
                }
            }
            _ => {
                if let Some(bytes) = keyenc::encode(spec.kind, value) {
                    out.push(IndexEntry {
                        field: spec.field.clone(),
                        value_bytes: bytes,
                        postings: None,
                    });
                }
            }
        }
    }
    out
}

/// Array elements are indexed by their own natural type rather than a
/// declared sub-kind — string and numeric elements are the practical
/// case spec.md §4.5's array indexing targets.
fn encode_array_element(value: &Bson) -> Option<Vec<u8>> {
    keyenc::encode(IndexKind::String, value).or_else(|| keyenc::encode(IndexKind::Number, value))
}
