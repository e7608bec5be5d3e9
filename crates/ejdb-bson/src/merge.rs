//! Update-operator application, per spec.md §4.1.

use std::fmt;

use bson::{Bson, Document};

use crate::path;

#[derive(Debug, Clone, PartialEq)]
pub enum MergeError {
    NotNumeric(String),
    NotArray(String),
    IncOverflow(String),
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeError::NotNumeric(p) => write!(f, "$inc target at '{p}' is not numeric"),
            MergeError::NotArray(p) => write!(f, "'{p}' is not an array"),
            MergeError::IncOverflow(p) => write!(f, "$inc overflowed at '{p}'"),
        }
    }
}

impl std::error::Error for MergeError {}

/// One update-operator document, already split by kind. Multiple paths
/// per operator are applied in map-iteration order; callers that need
/// a fixed order should use a `Vec` at the query-parsing layer instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOps {
    pub set: Vec<(String, Bson)>,
    pub unset: Vec<String>,
    pub inc: Vec<(String, Bson)>,
    pub push: Vec<(String, Bson)>,
    pub add_to_set: Vec<(String, Bson)>,
    pub pull: Vec<(String, Bson)>,
    pub rename: Vec<(String, String)>,
}

impl UpdateOps {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
            && self.unset.is_empty()
            && self.inc.is_empty()
            && self.push.is_empty()
            && self.add_to_set.is_empty()
            && self.pull.is_empty()
            && self.rename.is_empty()
    }

    /// Apply all operators to `doc` in a fixed, spec-ordered sequence:
    /// rename, unset, set, inc, push, addToSet, pull. Mutates in place.
    pub fn apply(&self, doc: &mut Document) -> Result<(), MergeError> {
        for (from, to) in &self.rename {
            path::rename(doc, from, to);
        }
        for p in &self.unset {
            path::remove(doc, p);
        }
        for (p, v) in &self.set {
            path::set(doc, p, v.clone());
        }
        for (p, n) in &self.inc {
            apply_inc(doc, p, n)?;
        }
        for (p, v) in &self.push {
            apply_push(doc, p, v.clone(), false)?;
        }
        for (p, v) in &self.add_to_set {
            apply_push(doc, p, v.clone(), true)?;
        }
        for (p, v) in &self.pull {
            apply_pull(doc, p, v);
        }
        Ok(())
    }
}

fn apply_inc(doc: &mut Document, p: &str, n: &Bson) -> Result<(), MergeError> {
    let delta = as_f64(n).ok_or_else(|| MergeError::NotNumeric(p.to_string()))?;
    let snapshot = Bson::Document(doc.clone());
    let current = path::get(&snapshot, p);
    let new_value = match current {
        None => n.clone(),
        Some(Bson::Int32(i)) => {
            let sum = *i as i64 + delta as i64;
            i32::try_from(sum)
                .map(Bson::Int32)
                .map_err(|_| MergeError::IncOverflow(p.to_string()))?
        }
        Some(Bson::Int64(i)) => i
            .checked_add(delta as i64)
            .map(Bson::Int64)
            .ok_or_else(|| MergeError::IncOverflow(p.to_string()))?,
        Some(Bson::Double(d)) => Bson::Double(d + delta),
        Some(_) => return Err(MergeError::NotNumeric(p.to_string())),
    };
    path::set(doc, p, new_value);
    Ok(())
}

fn as_f64(b: &Bson) -> Option<f64> {
    match b {
        Bson::Int32(i) => Some(*i as f64),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(d) => Some(*d),
        _ => None,
    }
}

fn apply_push(doc: &mut Document, p: &str, v: Bson, only_if_absent: bool) -> Result<(), MergeError> {
    let snapshot = Bson::Document(doc.clone());
    let current = path::get(&snapshot, p).cloned();
    let mut arr = match current {
        None => Vec::new(),
        Some(Bson::Array(a)) => a,
        Some(_) => return Err(MergeError::NotArray(p.to_string())),
    };
    if !only_if_absent || !arr.contains(&v) {
        arr.push(v);
    }
    path::set(doc, p, Bson::Array(arr));
    Ok(())
}

fn apply_pull(doc: &mut Document, p: &str, v: &Bson) {
    let snapshot = Bson::Document(doc.clone());
    if let Some(Bson::Array(arr)) = path::get(&snapshot, p).cloned() {
        let filtered: Vec<Bson> = arr.into_iter().filter(|el| el != v).collect();
        path::set(doc, p, Bson::Array(filtered));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn set_creates_path() {
        let mut d = doc! {};
        let ops = UpdateOps {
            set: vec![("a.b".to_string(), Bson::Int32(5))],
            ..Default::default()
        };
        ops.apply(&mut d).unwrap();
        assert_eq!(path::get(&Bson::Document(d), "a.b"), Some(&Bson::Int32(5)));
    }

    #[test]
    fn inc_creates_at_value_when_absent() {
        let mut d = doc! {};
        let ops = UpdateOps {
            inc: vec![("n".to_string(), Bson::Int32(3))],
            ..Default::default()
        };
        ops.apply(&mut d).unwrap();
        assert_eq!(d.get("n"), Some(&Bson::Int32(3)));
    }

    #[test]
    fn inc_adds_to_existing() {
        let mut d = doc! { "n": 10 };
        let ops = UpdateOps {
            inc: vec![("n".to_string(), Bson::Int32(5))],
            ..Default::default()
        };
        ops.apply(&mut d).unwrap();
        assert_eq!(d.get("n"), Some(&Bson::Int32(15)));
    }

    #[test]
    fn inc_on_non_numeric_errors() {
        let mut d = doc! { "n": "not a number" };
        let ops = UpdateOps {
            inc: vec![("n".to_string(), Bson::Int32(5))],
            ..Default::default()
        };
        assert!(ops.apply(&mut d).is_err());
    }

    #[test]
    fn push_appends_and_creates_array() {
        let mut d = doc! {};
        let ops = UpdateOps {
            push: vec![("tags".to_string(), Bson::String("a".into()))],
            ..Default::default()
        };
        ops.apply(&mut d).unwrap();
        assert_eq!(d.get_array("tags").unwrap(), &vec![Bson::String("a".into())]);
    }

    #[test]
    fn add_to_set_deduplicates() {
        let mut d = doc! { "tags": ["a"] };
        let ops = UpdateOps {
            add_to_set: vec![("tags".to_string(), Bson::String("a".into()))],
            ..Default::default()
        };
        ops.apply(&mut d).unwrap();
        assert_eq!(d.get_array("tags").unwrap().len(), 1);
    }

    #[test]
    fn pull_removes_matching_elements() {
        let mut d = doc! { "tags": ["a", "b", "a"] };
        let ops = UpdateOps {
            pull: vec![("tags".to_string(), Bson::String("a".into()))],
            ..Default::default()
        };
        ops.apply(&mut d).unwrap();
        assert_eq!(d.get_array("tags").unwrap(), &vec![Bson::String("b".into())]);
    }

    #[test]
    fn rename_moves_value() {
        let mut d = doc! { "old": 1 };
        let ops = UpdateOps {
            rename: vec![("old".to_string(), "new".to_string())],
            ..Default::default()
        };
        ops.apply(&mut d).unwrap();
        assert!(d.get("old").is_none());
        assert_eq!(d.get("new"), Some(&Bson::Int32(1)));
    }

    #[test]
    fn idempotent_double_set() {
        let mut d = doc! {};
        let ops = UpdateOps {
            set: vec![("a".to_string(), Bson::Int32(1))],
            ..Default::default()
        };
        ops.apply(&mut d).unwrap();
        ops.apply(&mut d).unwrap();
        assert_eq!(d.get("a"), Some(&Bson::Int32(1)));
    }
}
