//! Query planner (spec.md §4.6, component C6's front end): a pure
//! function from a parsed predicate tree plus a collection's declared
//! indexes to a [`Plan`] describing how to generate candidate
//! locators. Execution stays orthogonal — see `executor.rs` — so a
//! plan can be explained or tested on its own (spec.md §9).
//!
//! The driving atom only narrows candidate generation; correctness is
//! always enforced by re-evaluating the *entire* original filter
//! against each loaded candidate (`executor::matches_filter`). That
//! means a plan never has to be perfectly precise — picking a merely
//! adequate index, or falling back to `Plan::Scan`, is always safe,
//! just potentially slower.

use std::ops::Bound;

use bson::Bson;
use bson::raw::RawBsonRef;

use ejdb_bson::key as keyenc;
use ejdb_bson::{qgram, IndexKind};
use ejdb_engine::IndexSpec;
use ejdb_query::Expression;

#[derive(Debug, Clone)]
pub enum Plan {
    /// Full collection scan — no atom in the filter had an applicable index.
    Scan,
    /// Candidates are the doc ids an index scan on `field` yields.
    Index { field: String, range: DrivingRange },
    /// Union of sub-plans, deduplicated by the executor (spec.md §4.6 step 5).
    Union(Vec<Plan>),
}

#[derive(Debug, Clone)]
pub enum DrivingRange {
    Eq(Vec<u8>),
    Range {
        lower: Bound<Vec<u8>>,
        upper: Bound<Vec<u8>>,
    },
    /// `$in`: union of ascending eq scans (spec.md §4.5 predicate table).
    InSet(Vec<Vec<u8>>),
}

/// One line describing the chosen plan, attached to the executor's
/// optional trace (spec.md §4.6 "execution log").
pub fn explain(plan: &Plan) -> String {
    match plan {
        Plan::Scan => "full collection scan".to_string(),
        Plan::Index { field, range } => {
            let kind = match range {
                DrivingRange::Eq(_) => "eq",
                DrivingRange::Range { .. } => "range",
                DrivingRange::InSet(values) => return format!("index chosen: field={field} kind=in (n={})", values.len()),
            };
            format!("index chosen: field={field} kind={kind}")
        }
        Plan::Union(branches) => {
            let parts: Vec<String> = branches.iter().map(explain).collect();
            format!("union[{}]", parts.join(" | "))
        }
    }
}

pub fn plan_query(indexes: &[IndexSpec], filter: &Expression<'_>) -> Plan {
    plan_expr(indexes, filter)
}

fn plan_expr(indexes: &[IndexSpec], expr: &Expression<'_>) -> Plan {
    match expr {
        Expression::Or(children) => {
            Plan::Union(children.iter().map(|c| plan_expr(indexes, c)).collect())
        }
        Expression::And(children) => plan_and(indexes, children),
        other => best_atom(indexes, other)
            .map(to_plan)
            .unwrap_or(Plan::Scan),
    }
}

fn plan_and(indexes: &[IndexSpec], children: &[Expression<'_>]) -> Plan {
    let atoms: Vec<&Expression> = children
        .iter()
        .filter(|c| !matches!(c, Expression::And(_) | Expression::Or(_)))
        .collect();

    let mut best: Option<(String, Candidate, u32)> = None;
    for atom in &atoms {
        if let Some((field, candidate, score)) = best_atom(indexes, atom) {
            if best.as_ref().map(|(_, _, s)| score < *s).unwrap_or(true) {
                best = Some((field, candidate, score));
            }
        }
    }
    if let Some((field, candidate, _)) = best {
        return to_plan((field, candidate, 0));
    }

    if let Some(Expression::Or(or_children)) =
        children.iter().find(|c| matches!(c, Expression::Or(_)))
    {
        return Plan::Union(or_children.iter().map(|c| plan_expr(indexes, c)).collect());
    }

    Plan::Scan
}

fn to_plan((field, candidate, _score): (String, Candidate, u32)) -> Plan {
    let range = match candidate {
        Candidate::Eq(b) => DrivingRange::Eq(b),
        Candidate::Range { lower, upper } => DrivingRange::Range { lower, upper },
        Candidate::InSet(values) => DrivingRange::InSet(values),
    };
    Plan::Index { field, range }
}

enum Candidate {
    Eq(Vec<u8>),
    Range {
        lower: Bound<Vec<u8>>,
        upper: Bound<Vec<u8>>,
    },
    InSet(Vec<Vec<u8>>),
}

/// Score one atom against the collection's indexes per spec.md §4.6
/// step 2 (lower is better): unique eq=1, non-unique eq=10 (not given
/// an explicit score by the spec; scored the same as a non-unique
/// range scan since there's no cardinality estimate to tell them apart
/// — see DESIGN.md), range=10, prefix=20, in=30×cardinality,
/// qgram search=40 (driven by a single gram's postings, the widest net
/// of the bunch).
fn best_atom(indexes: &[IndexSpec], atom: &Expression<'_>) -> Option<(String, Candidate, u32)> {
    match atom {
        Expression::Eq(field, v) => {
            let idx = find_index(indexes, field)?;
            let value = Bson::try_from(*v).ok()?;
            let bytes = encode_for_kind(idx.kind, &value)?;
            let score = if idx.unique { 1 } else { 10 };
            Some((field.to_string(), Candidate::Eq(bytes), score))
        }
        Expression::Icase(field, s) => {
            let idx = find_index(indexes, field)?;
            if idx.kind != IndexKind::IString {
                return None;
            }
            let score = if idx.unique { 1 } else { 10 };
            Some((
                field.to_string(),
                Candidate::Eq(s.to_lowercase().into_bytes()),
                score,
            ))
        }
        Expression::Begin(field, prefix) => {
            let idx = find_index(indexes, field)?;
            if !matches!(idx.kind, IndexKind::String | IndexKind::IString) {
                return None;
            }
            let bytes = if idx.kind == IndexKind::IString {
                prefix.to_lowercase().into_bytes()
            } else {
                prefix.as_bytes().to_vec()
            };
            let upper = match next_prefix(&bytes) {
                Some(hi) => Bound::Excluded(hi),
                None => Bound::Unbounded,
            };
            Some((
                field.to_string(),
                Candidate::Range {
                    lower: Bound::Included(bytes),
                    upper,
                },
                20,
            ))
        }
        Expression::Gt(field, v) | Expression::Gte(field, v) | Expression::Lt(field, v) | Expression::Lte(field, v) => {
            let idx = find_index(indexes, field)?;
            if idx.kind != IndexKind::Number {
                return None;
            }
            let value = Bson::try_from(*v).ok()?;
            let bytes = encode_for_kind(idx.kind, &value)?;
            let range = match atom {
                Expression::Gt(..) => Candidate::Range {
                    lower: Bound::Excluded(bytes),
                    upper: Bound::Unbounded,
                },
                Expression::Gte(..) => Candidate::Range {
                    lower: Bound::Included(bytes),
                    upper: Bound::Unbounded,
                },
                Expression::Lt(..) => Candidate::Range {
                    lower: Bound::Unbounded,
                    upper: Bound::Excluded(bytes),
                },
                Expression::Lte(..) => Candidate::Range {
                    lower: Bound::Unbounded,
                    upper: Bound::Included(bytes),
                },
                _ => unreachable!(),
            };
            Some((field.to_string(), range, 10))
        }
        Expression::Between(field, lo, hi) => {
            let idx = find_index(indexes, field)?;
            if idx.kind != IndexKind::Number {
                return None;
            }
            let lo_b = encode_for_kind(idx.kind, &Bson::try_from(*lo).ok()?)?;
            let hi_b = encode_for_kind(idx.kind, &Bson::try_from(*hi).ok()?)?;
            Some((
                field.to_string(),
                Candidate::Range {
                    lower: Bound::Included(lo_b),
                    upper: Bound::Included(hi_b),
                },
                10,
            ))
        }
        Expression::In(field, values) => {
            let idx = find_index(indexes, field)?;
            let mut encoded = Vec::with_capacity(values.len());
            for v in values {
                let value = Bson::try_from(*v).ok()?;
                encoded.push(encode_for_kind(idx.kind, &value)?);
            }
            let score = 30u32.saturating_mul(encoded.len().max(1) as u32);
            Some((field.to_string(), Candidate::InSet(encoded), score))
        }
        Expression::Search(field, needle) => {
            let idx = find_index(indexes, field)?;
            if idx.kind != IndexKind::Qgram {
                return None;
            }
            // Any one gram's postings are a superset of the documents
            // actually containing `needle`; the executor's residual
            // filter (`matches`) narrows that down to an exact
            // normalized-substring match.
            let gram = qgram::tokenize(needle).into_iter().next()?;
            Some((
                field.to_string(),
                Candidate::Eq(gram.text.into_bytes()),
                40,
            ))
        }
        _ => None,
    }
}

fn find_index<'a>(indexes: &'a [IndexSpec], field: &str) -> Option<&'a IndexSpec> {
    indexes.iter().find(|ix| ix.field == field)
}

/// Array-indexed fields are encoded element-by-element under the
/// element's own natural type (see `ejdb-engine`'s
/// `index::entries_for_document`); mirror that here so an eq/in atom
/// against an array-indexed field can still drive a plan.
fn encode_for_kind(kind: IndexKind, value: &Bson) -> Option<Vec<u8>> {
    match kind {
        IndexKind::Array => keyenc::encode(IndexKind::String, value)
            .or_else(|| keyenc::encode(IndexKind::Number, value)),
        other => keyenc::encode(other, value),
    }
}

fn next_prefix(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut out = prefix.to_vec();
    while let Some(last) = out.pop() {
        if last != 0xFF {
            out.push(last + 1);
            return Some(out);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::rawdoc;
    use ejdb_query::parse_query;

    fn idx(field: &str, kind: IndexKind, unique: bool) -> IndexSpec {
        IndexSpec {
            field: field.to_string(),
            kind,
            unique,
        }
    }

    #[test]
    fn unique_eq_is_chosen_as_driving() {
        let q = rawdoc! { "email": "x@example.com" };
        let parsed = parse_query(&q).unwrap();
        let indexes = vec![idx("email", IndexKind::String, true)];
        let plan = plan_query(&indexes, &parsed.filter);
        assert!(matches!(
            plan,
            Plan::Index { range: DrivingRange::Eq(_), .. }
        ));
    }

    #[test]
    fn no_index_falls_back_to_scan() {
        let q = rawdoc! { "email": "x@example.com" };
        let parsed = parse_query(&q).unwrap();
        let plan = plan_query(&[], &parsed.filter);
        assert!(matches!(plan, Plan::Scan));
    }

    #[test]
    fn range_over_number_index() {
        let q = rawdoc! { "age": { "$gte": 4_i32, "$lt": 11_i32 } };
        let parsed = parse_query(&q).unwrap();
        let indexes = vec![idx("age", IndexKind::Number, false)];
        let plan = plan_query(&indexes, &parsed.filter);
        assert!(matches!(
            plan,
            Plan::Index { range: DrivingRange::Range { .. }, .. }
        ));
    }

    #[test]
    fn top_level_or_becomes_union() {
        let q = rawdoc! { "$or": [{ "status": "a" }, { "status": "b" }] };
        let parsed = parse_query(&q).unwrap();
        let indexes = vec![idx("status", IndexKind::String, false)];
        let plan = plan_query(&indexes, &parsed.filter);
        assert!(matches!(plan, Plan::Union(ref b) if b.len() == 2));
    }

    #[test]
    fn prefers_lower_score_among_multiple_atoms() {
        let q = rawdoc! { "status": "active", "age": { "$gt": 4_i32 } };
        let parsed = parse_query(&q).unwrap();
        let indexes = vec![
            idx("status", IndexKind::String, true),
            idx("age", IndexKind::Number, false),
        ];
        let plan = plan_query(&indexes, &parsed.filter);
        match plan {
            Plan::Index { field, range: DrivingRange::Eq(_) } => assert_eq!(field, "status"),
            other => panic!("expected unique-eq driving plan, got {other:?}"),
        }
    }
}
