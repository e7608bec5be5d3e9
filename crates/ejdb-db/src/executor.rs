//! Query execution (spec.md §4.6 "Execution"): turns a [`Plan`] into a
//! deduplicated candidate stream, loads and re-filters each candidate,
//! then applies the requested action (select / update / delete /
//! upsert) and hints (sort, skip, limit, projection, count-only).

use std::collections::HashSet;
use std::ops::Bound;

use bson::oid::ObjectId;
use bson::Document;

use ejdb_engine::{CollectionOptions, IndexRange, KvTransaction};
use ejdb_query::{matches, Expression, ParsedQuery};
use ejdb_store::Store;

use crate::error::DbError;
use crate::planner::{self, DrivingRange, Plan};
use crate::sort;

#[derive(Debug, Default)]
pub struct ExecResult {
    pub docs: Vec<Document>,
    pub count: u64,
    pub upserted_id: Option<ObjectId>,
    pub log: Vec<String>,
}

/// Read-only execution: select, with sort/skip/limit/projection/count.
pub fn select<S: Store>(
    txn: &KvTransaction<'_, S>,
    collection: &str,
    options: &CollectionOptions,
    parsed: &ParsedQuery<'_>,
    explain: bool,
) -> Result<ExecResult, DbError> {
    let meta = txn
        .get_collection(collection)?
        .ok_or_else(|| DbError::CollectionNotFound(collection.to_string()))?;
    let plan = planner::plan_query(&meta.indexes, &parsed.filter);
    let mut log = Vec::new();
    if explain {
        log.push(planner::explain(&plan));
    }

    let mut rows = load_matches(txn, collection, &plan, &parsed.filter)?;

    if !parsed.hints.order_by.is_empty() {
        rows = sort::sort_documents(rows, &parsed.hints.order_by, options.sort_buffer_sz)?;
    }

    let skip = parsed.hints.skip.unwrap_or(0) as usize;
    let rows: Vec<(ObjectId, Document)> = rows.into_iter().skip(skip).collect();
    let rows: Vec<(ObjectId, Document)> = match parsed.hints.limit {
        Some(n) => rows.into_iter().take(n as usize).collect(),
        None => rows,
    };

    if parsed.hints.only_count {
        return Ok(ExecResult {
            count: rows.len() as u64,
            log,
            ..Default::default()
        });
    }

    let mut docs: Vec<Document> = rows.into_iter().map(|(_, d)| d).collect();
    if let Some(fields) = &parsed.hints.fields {
        for doc in &mut docs {
            apply_projection(doc, fields);
        }
    }
    let count = docs.len() as u64;
    Ok(ExecResult {
        docs,
        count,
        log,
        upserted_id: None,
    })
}

/// Update every document matching the filter with `update`, or every
/// document if `dropall`/`only_matching` semantics call for it. Used
/// for both the `$set`/`$inc`/... directive family and plain `replace`.
pub fn update<S: Store>(
    txn: &mut KvTransaction<'_, S>,
    collection: &str,
    parsed: &ParsedQuery<'_>,
) -> Result<ExecResult, DbError> {
    let meta = txn
        .get_collection(collection)?
        .ok_or_else(|| DbError::CollectionNotFound(collection.to_string()))?;
    let plan = planner::plan_query(&meta.indexes, &parsed.filter);
    let rows = load_matches(txn, collection, &plan, &parsed.filter)?;

    let mut modified = 0u64;
    for (id, mut doc) in rows {
        parsed
            .update
            .apply(&mut doc)
            .map_err(|e| DbError::InvalidDocument(e.to_string()))?;
        txn.replace(collection, &id, doc)?;
        modified += 1;
    }

    if modified == 0 {
        if let Some(upserted) = try_upsert(txn, collection, parsed)? {
            return Ok(ExecResult {
                count: 1,
                upserted_id: Some(upserted),
                ..Default::default()
            });
        }
    }

    Ok(ExecResult {
        count: modified,
        ..Default::default()
    })
}

/// Delete every document matching the filter (`$dropall`).
pub fn dropall<S: Store>(
    txn: &mut KvTransaction<'_, S>,
    collection: &str,
    filter: &Expression<'_>,
) -> Result<u64, DbError> {
    let meta = txn
        .get_collection(collection)?
        .ok_or_else(|| DbError::CollectionNotFound(collection.to_string()))?;
    let plan = planner::plan_query(&meta.indexes, filter);
    let rows = load_matches(txn, collection, &plan, filter)?;
    let mut deleted = 0u64;
    for (id, _) in rows {
        if txn.delete(collection, &id)? {
            deleted += 1;
        }
    }
    Ok(deleted)
}

/// spec.md §4.6 step 6: zero matches, filter is pure equality atoms →
/// synthesize a document from those equalities merged with the
/// `$upsert` payload, and insert it.
fn try_upsert<S: Store>(
    txn: &mut KvTransaction<'_, S>,
    collection: &str,
    parsed: &ParsedQuery<'_>,
) -> Result<Option<ObjectId>, DbError> {
    let Some(payload) = &parsed.upsert else {
        return Ok(None);
    };
    let mut doc = Document::new();
    if !collect_equalities(&parsed.filter, &mut doc) {
        return Ok(None);
    }
    for (k, v) in payload {
        doc.insert(k.clone(), v.clone());
    }
    let id = txn.insert(collection, doc)?;
    Ok(Some(id))
}

fn collect_equalities(expr: &Expression<'_>, out: &mut Document) -> bool {
    match expr {
        Expression::And(children) => children.iter().all(|c| collect_equalities(c, out)),
        Expression::Eq(field, v) => {
            let Ok(value) = bson::Bson::try_from(*v) else {
                return false;
            };
            out.insert(field.to_string(), value);
            true
        }
        _ => false,
    }
}

/// Stream candidates from `plan`, load each once, re-check the full
/// filter, and dedup by doc id (spec.md P3). Dedup happens before the
/// load so a document visited by two sub-plans is loaded only once.
fn load_matches<S: Store>(
    txn: &KvTransaction<'_, S>,
    collection: &str,
    plan: &Plan,
    filter: &Expression<'_>,
) -> Result<Vec<(ObjectId, Document)>, DbError> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for id in candidate_ids(txn, collection, plan)? {
        if !seen.insert(id) {
            continue;
        }
        let Some(doc) = txn.get(collection, &id)? else {
            continue;
        };
        if matches(filter, &doc) {
            out.push((id, doc));
        }
    }
    Ok(out)
}

fn candidate_ids<S: Store>(
    txn: &KvTransaction<'_, S>,
    collection: &str,
    plan: &Plan,
) -> Result<Vec<ObjectId>, DbError> {
    match plan {
        Plan::Scan => Ok(txn.scan(collection)?.into_iter().map(|(id, _)| id).collect()),
        Plan::Index { field, range } => match range {
            DrivingRange::Eq(bytes) => Ok(txn.scan_index(collection, field, IndexRange::Eq(bytes))?),
            DrivingRange::Range { lower, upper } => Ok(txn.scan_index(
                collection,
                field,
                IndexRange::Range {
                    lower: bound_ref(lower),
                    upper: bound_ref(upper),
                },
            )?),
            DrivingRange::InSet(values) => {
                let mut ids = Vec::new();
                for v in values {
                    ids.extend(txn.scan_index(collection, field, IndexRange::Eq(v))?);
                }
                Ok(ids)
            }
        },
        Plan::Union(branches) => {
            let mut ids = Vec::new();
            for branch in branches {
                ids.extend(candidate_ids(txn, collection, branch)?);
            }
            Ok(ids)
        }
    }
}

fn bound_ref(b: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match b {
        Bound::Included(v) => Bound::Included(v.as_slice()),
        Bound::Excluded(v) => Bound::Excluded(v.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

fn apply_projection(doc: &mut Document, fields: &[(String, bool)]) {
    if fields.is_empty() {
        return;
    }
    let include = fields.iter().any(|(_, inc)| *inc);
    if include {
        let keep: HashSet<&str> = fields
            .iter()
            .filter(|(_, inc)| *inc)
            .map(|(f, _)| f.as_str())
            .collect();
        let drop: Vec<String> = doc
            .keys()
            .filter(|k| k.as_str() != "_id" && !keep.contains(k.as_str()))
            .cloned()
            .collect();
        for key in drop {
            doc.remove(&key);
        }
    } else {
        for (field, _) in fields {
            doc.remove(field);
        }
    }
}
