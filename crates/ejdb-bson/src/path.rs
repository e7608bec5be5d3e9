//! Dotted-path lookup, per spec.md §4.1: `a.b.0.c`, numeric segments
//! index into arrays, lookup stops and reports absent at the first
//! missing segment.

use bson::raw::{RawBsonRef, RawDocument};
use bson::{Bson, Document};

/// Zero-copy path lookup over a raw BSON document — the fast read path.
pub fn get_raw<'a>(doc: &'a RawDocument, path: &str) -> Option<RawBsonRef<'a>> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = doc.get(first).ok().flatten()?;
    for segment in segments {
        current = step_raw(current, segment)?;
    }
    Some(current)
}

fn step_raw<'a>(value: RawBsonRef<'a>, segment: &str) -> Option<RawBsonRef<'a>> {
    match value {
        RawBsonRef::Document(d) => d.get(segment).ok().flatten(),
        RawBsonRef::Array(a) => {
            let idx: usize = segment.parse().ok()?;
            a.into_iter().nth(idx).and_then(|r| r.ok())
        }
        _ => None,
    }
}

/// Owned-tree path lookup — used by the merge/update-operator path.
pub fn get<'a>(value: &'a Bson, path: &str) -> Option<&'a Bson> {
    let mut current = value;
    for segment in path.split('.') {
        current = step(current, segment)?;
    }
    Some(current)
}

fn step<'a>(value: &'a Bson, segment: &str) -> Option<&'a Bson> {
    match value {
        Bson::Document(d) => d.get(segment),
        Bson::Array(a) => {
            let idx: usize = segment.parse().ok()?;
            a.get(idx)
        }
        _ => None,
    }
}

/// Set the leaf at `path`, creating intermediate objects as needed
/// (spec.md §4.1 `$set` semantics). The root must be a document.
pub fn set(root: &mut Document, path: &str, new_value: Bson) {
    let segments: Vec<&str> = path.split('.').collect();
    set_at(root, &segments, new_value);
}

fn set_at(doc: &mut Document, segments: &[&str], new_value: Bson) {
    let (head, rest) = segments.split_first().expect("non-empty path");
    if rest.is_empty() {
        doc.insert(head.to_string(), new_value);
        return;
    }
    let entry = doc
        .entry(head.to_string())
        .or_insert_with(|| Bson::Document(Document::new()));
    if !matches!(entry, Bson::Document(_)) {
        *entry = Bson::Document(Document::new());
    }
    if let Bson::Document(child) = entry {
        set_at(child, rest, new_value);
    }
}

/// Remove the leaf at `path`, returning its previous value if present.
pub fn remove(root: &mut Document, path: &str) -> Option<Bson> {
    let segments: Vec<&str> = path.split('.').collect();
    remove_at(root, &segments)
}

fn remove_at(doc: &mut Document, segments: &[&str]) -> Option<Bson> {
    let (head, rest) = segments.split_first()?;
    if rest.is_empty() {
        return doc.remove(*head);
    }
    match doc.get_mut(*head) {
        Some(Bson::Document(child)) => remove_at(child, rest),
        _ => None,
    }
}

/// Move the leaf at `from` to `to` (spec.md §4.1 `$rename`). No-op if
/// `from` is absent.
pub fn rename(root: &mut Document, from: &str, to: &str) {
    if let Some(value) = remove(root, from) {
        set(root, to, value);
    }
}
