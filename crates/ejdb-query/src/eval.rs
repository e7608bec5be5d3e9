//! Residual predicate evaluation (spec.md §4.6: "evaluate residual
//! predicates ... on match apply the action"). Runs an [`Expression`]
//! against a fully-loaded document — used both for the driving atom's
//! own verification (cheap double-check) and for every atom the
//! planner didn't pick an index for.

use std::cmp::Ordering;

use bson::raw::RawBsonRef;
use bson::{Bson, Document};

use ejdb_bson::{path, qgram};

use crate::expression::Expression;

pub fn matches(expr: &Expression<'_>, doc: &Document) -> bool {
    match expr {
        Expression::And(children) => children.iter().all(|c| matches(c, doc)),
        Expression::Or(children) => children.iter().any(|c| matches(c, doc)),
        Expression::Eq(field, v) => any_value(doc, field, |val| values_equal(val, *v)),
        Expression::Ne(field, v) => !any_value(doc, field, |val| values_equal(val, *v)),
        Expression::Gt(field, v) => {
            any_value(doc, field, |val| compare(val, *v) == Some(Ordering::Greater))
        }
        Expression::Gte(field, v) => any_value(doc, field, |val| {
            matches!(compare(val, *v), Some(Ordering::Greater | Ordering::Equal))
        }),
        Expression::Lt(field, v) => {
            any_value(doc, field, |val| compare(val, *v) == Some(Ordering::Less))
        }
        Expression::Lte(field, v) => any_value(doc, field, |val| {
            matches!(compare(val, *v), Some(Ordering::Less | Ordering::Equal))
        }),
        Expression::Between(field, lo, hi) => any_value(doc, field, |val| {
            !matches!(compare(val, *lo), Some(Ordering::Less) | None)
                && !matches!(compare(val, *hi), Some(Ordering::Greater) | None)
        }),
        Expression::In(field, values) => {
            any_value(doc, field, |val| values.iter().any(|v| values_equal(val, *v)))
        }
        Expression::Nin(field, values) => {
            !any_value(doc, field, |val| values.iter().any(|v| values_equal(val, *v)))
        }
        Expression::Begin(field, prefix) => any_value(doc, field, |val| match val {
            Bson::String(s) => s.starts_with(*prefix),
            _ => false,
        }),
        Expression::Icase(field, s) => any_value(doc, field, |val| match val {
            Bson::String(v) => v.to_lowercase() == s.to_lowercase(),
            _ => false,
        }),
        Expression::Regex(field, re) => any_value(doc, field, |val| match val {
            Bson::String(s) => re.is_match(s),
            _ => false,
        }),
        Expression::Search(field, needle) => any_value(doc, field, |val| match val {
            Bson::String(s) => qgram::normalize(s).contains(&qgram::normalize(needle)),
            _ => false,
        }),
        Expression::Exists(field, want) => {
            let present = path::get(&Bson::Document(doc.clone()), field).is_some();
            present == *want
        }
        Expression::ElemMatch(field, inner) => match path::get(&Bson::Document(doc.clone()), field) {
            Some(Bson::Array(items)) => items.iter().any(|item| match item {
                Bson::Document(d) => matches(inner, d),
                _ => false,
            }),
            _ => false,
        },
    }
}

/// True if `field` resolves to a value (or, for an array field, any
/// element) for which `pred` holds — MongoDB's implicit
/// array-broadcasting semantics for scalar operators.
fn any_value(doc: &Document, field: &str, pred: impl Fn(&Bson) -> bool) -> bool {
    match path::get(&Bson::Document(doc.clone()), field) {
        Some(Bson::Array(items)) => items.iter().any(|item| pred(item)),
        Some(val) => pred(val),
        None => false,
    }
}

fn values_equal(a: &Bson, b: RawBsonRef<'_>) -> bool {
    let Ok(b) = Bson::try_from(b) else {
        return false;
    };
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(&b)) {
        return x == y;
    }
    *a == b
}

fn compare(a: &Bson, b: RawBsonRef<'_>) -> Option<Ordering> {
    let b = Bson::try_from(b).ok()?;
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(&b)) {
        return x.partial_cmp(&y);
    }
    match (a, &b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        _ => None,
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
