//! Parse a query document into a predicate tree, update directives,
//! and execution hints in a single pass (spec.md §4.6).
//!
//! Follows MongoDB query conventions, extended with the operator set
//! spec.md names: `$eq/$ne/$gt/$gte/$lt/$lte/$bt/$in/$nin/$begin/
//! $icase/$regex/$exists/$elemMatch`, plus the update/control/hint
//! directives `$set/$unset/$inc/$push/$pull/$addToSet/$rename`,
//! `$dropall/$upsert`, `$orderby/$skip/$limit/$fields/$onlycount`, and
//! `$search` for full-text q-gram matching.

use bson::raw::{RawBsonRef, RawDocument};
use bson::Document;

use ejdb_bson::UpdateOps;

use crate::error::QueryParseError;
use crate::expression::Expression;
use crate::hints::{QueryHints, SortDirection};
use crate::mutation;

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery<'a> {
    /// `Expression::And(vec![])` when the document carries no
    /// predicates at all — matches every document, the `$dropall`/
    /// bare-directive case.
    pub filter: Expression<'a>,
    pub update: UpdateOps,
    pub hints: QueryHints,
    pub dropall: bool,
    pub upsert: Option<Document>,
}

pub fn parse_query(doc: &RawDocument) -> Result<ParsedQuery<'_>, QueryParseError> {
    let mut filter_children = Vec::new();
    let mut update = mutation::empty_ops();
    let mut hints = QueryHints::default();
    let mut dropall = false;
    let mut upsert = None;

    for result in doc.iter() {
        let (key, value) = result.map_err(|e| QueryParseError::new(format!("malformed BSON: {e}")))?;
        match key {
            "$and" => filter_children.push(parse_logical_array(value, Expression::And)?),
            "$or" => filter_children.push(parse_logical_array(value, Expression::Or)?),
            "$set" => update.set = mutation::parse_field_value_pairs(value)?,
            "$unset" => update.unset = mutation::parse_field_list(value)?,
            "$inc" => update.inc = mutation::parse_field_value_pairs(value)?,
            "$push" => update.push = mutation::parse_field_value_pairs(value)?,
            "$pull" => update.pull = mutation::parse_field_value_pairs(value)?,
            "$addToSet" => update.add_to_set = mutation::parse_field_value_pairs(value)?,
            "$rename" => update.rename = mutation::parse_rename_pairs(value)?,
            "$dropall" => dropall = parse_bool(value, "$dropall")?,
            "$upsert" => upsert = Some(parse_document(value, "$upsert")?),
            "$orderby" => hints.order_by = parse_orderby(value)?,
            "$skip" => hints.skip = Some(parse_u64(value, "$skip")?),
            "$limit" => hints.limit = Some(parse_u64(value, "$limit")?),
            "$fields" => hints.fields = Some(parse_fields(value)?),
            "$onlycount" => hints.only_count = parse_bool(value, "$onlycount")?,
            k if k.starts_with('$') => {
                return Err(QueryParseError::new(format!(
                    "unknown top-level directive: {k}"
                )));
            }
            _ => filter_children.push(parse_field_condition(key, value)?),
        }
    }

    let filter = match filter_children.len() {
        0 => Expression::And(Vec::new()),
        1 => filter_children.into_iter().next().unwrap(),
        _ => Expression::And(filter_children),
    };

    if upsert.is_some() && !is_pure_equality(&filter) {
        return Err(QueryParseError::new(
            "$upsert requires a filter made only of top-level equality atoms",
        ));
    }

    Ok(ParsedQuery {
        filter,
        update,
        hints,
        dropall,
        upsert,
    })
}

/// `$upsert`'s synthesized-document path needs a filter it can replay
/// as field/value pairs (spec.md §4.6 step 6): an `$eq` atom or an
/// `$and` of nothing but `$eq` atoms. Anything else — a range, `$or`, a
/// regex, and so on — is rejected here rather than silently upserting
/// a document that wouldn't actually match the filter it came from.
fn is_pure_equality(expr: &Expression<'_>) -> bool {
    match expr {
        Expression::Eq(..) => true,
        Expression::And(children) => children.iter().all(is_pure_equality),
        _ => false,
    }
}

fn parse_logical_array<'a>(
    value: RawBsonRef<'a>,
    make: fn(Vec<Expression<'a>>) -> Expression<'a>,
) -> Result<Expression<'a>, QueryParseError> {
    let RawBsonRef::Array(arr) = value else {
        return Err(QueryParseError::new("$and/$or value must be an array"));
    };
    let mut children = Vec::new();
    for elem in arr {
        let elem = elem.map_err(|e| QueryParseError::new(format!("malformed BSON array: {e}")))?;
        let RawBsonRef::Document(sub_doc) = elem else {
            return Err(QueryParseError::new(
                "$and/$or array elements must be documents",
            ));
        };
        let parsed = parse_query(sub_doc)?;
        children.push(parsed.filter);
    }
    if children.is_empty() {
        return Err(QueryParseError::new("$and/$or array must not be empty"));
    }
    Ok(make(children))
}

fn parse_field_condition<'a>(
    field: &'a str,
    value: RawBsonRef<'a>,
) -> Result<Expression<'a>, QueryParseError> {
    if let RawBsonRef::Document(sub_doc) = value {
        let mut iter = sub_doc.iter();
        if let Some(Ok((first_key, _))) = iter.next() {
            if first_key.starts_with('$') {
                return parse_operator_doc(field, sub_doc);
            }
        }
    }
    Ok(Expression::Eq(field, value))
}

fn parse_operator_doc<'a>(
    field: &'a str,
    doc: &'a RawDocument,
) -> Result<Expression<'a>, QueryParseError> {
    let mut conditions: Vec<Expression<'a>> = Vec::new();

    for result in doc.iter() {
        let (op_key, op_value) =
            result.map_err(|e| QueryParseError::new(format!("malformed BSON: {e}")))?;

        if op_key == "$regex" {
            return parse_regex(field, doc);
        }

        let expr = match op_key {
            "$eq" => Expression::Eq(field, op_value),
            "$ne" => Expression::Ne(field, op_value),
            "$gt" => Expression::Gt(field, op_value),
            "$gte" => Expression::Gte(field, op_value),
            "$lt" => Expression::Lt(field, op_value),
            "$lte" => Expression::Lte(field, op_value),
            "$bt" => {
                let bounds = collect_array(op_value, "$bt")?;
                if bounds.len() != 2 {
                    return Err(QueryParseError::new("$bt value must be a 2-element array"));
                }
                let (lo, hi) = (bounds[0], bounds[1]);
                Expression::Between(field, lo, hi)
            }
            "$in" => Expression::In(field, collect_array(op_value, "$in")?),
            "$nin" => Expression::Nin(field, collect_array(op_value, "$nin")?),
            "$begin" => {
                let RawBsonRef::String(s) = op_value else {
                    return Err(QueryParseError::new("$begin value must be a string"));
                };
                Expression::Begin(field, s)
            }
            "$icase" => {
                let RawBsonRef::String(s) = op_value else {
                    return Err(QueryParseError::new("$icase value must be a string"));
                };
                Expression::Icase(field, s)
            }
            "$search" => {
                let RawBsonRef::String(s) = op_value else {
                    return Err(QueryParseError::new("$search value must be a string"));
                };
                Expression::Search(field, s)
            }
            "$exists" => {
                let RawBsonRef::Boolean(b) = op_value else {
                    return Err(QueryParseError::new("$exists value must be a boolean"));
                };
                Expression::Exists(field, b)
            }
            "$elemMatch" => {
                let RawBsonRef::Document(sub) = op_value else {
                    return Err(QueryParseError::new("$elemMatch value must be a document"));
                };
                let parsed = parse_query(sub)?;
                Expression::ElemMatch(field, Box::new(parsed.filter))
            }
            "$options" => {
                return Err(QueryParseError::new("$options without $regex"));
            }
            k => return Err(QueryParseError::new(format!("unknown field operator: {k}"))),
        };
        conditions.push(expr);
    }

    match conditions.len() {
        0 => Err(QueryParseError::new("empty operator document")),
        1 => Ok(conditions.into_iter().next().unwrap()),
        _ => Ok(Expression::And(conditions)),
    }
}

fn collect_array<'a>(
    value: RawBsonRef<'a>,
    op: &str,
) -> Result<Vec<RawBsonRef<'a>>, QueryParseError> {
    let RawBsonRef::Array(arr) = value else {
        return Err(QueryParseError::new(format!("{op} value must be an array")));
    };
    arr.into_iter()
        .collect::<Result<_, _>>()
        .map_err(|e| QueryParseError::new(format!("malformed BSON array: {e}")))
}

fn parse_regex<'a>(field: &'a str, doc: &'a RawDocument) -> Result<Expression<'a>, QueryParseError> {
    let mut pattern: Option<&str> = None;
    let mut options: Option<&str> = None;

    for result in doc.iter() {
        let (key, value) = result.map_err(|e| QueryParseError::new(format!("malformed BSON: {e}")))?;
        match key {
            "$regex" => {
                let RawBsonRef::String(s) = value else {
                    return Err(QueryParseError::new("$regex value must be a string"));
                };
                pattern = Some(s);
            }
            "$options" => {
                let RawBsonRef::String(s) = value else {
                    return Err(QueryParseError::new("$options value must be a string"));
                };
                options = Some(s);
            }
            k => {
                return Err(QueryParseError::new(format!(
                    "unexpected key alongside $regex: {k}"
                )));
            }
        }
    }

    let pat = pattern.ok_or_else(|| QueryParseError::new("missing $regex pattern"))?;
    let full_pattern = if let Some(opts) = options {
        let mut prefix = String::with_capacity(4 + opts.len() + pat.len());
        prefix.push_str("(?");
        for ch in opts.chars() {
            match ch {
                'i' | 's' | 'm' | 'x' => prefix.push(ch),
                c => return Err(QueryParseError::new(format!("unknown regex option: {c}"))),
            }
        }
        prefix.push(')');
        prefix.push_str(pat);
        prefix
    } else {
        pat.to_string()
    };

    let re = regex::Regex::new(&full_pattern)
        .map_err(|e| QueryParseError::new(format!("invalid regex pattern: {e}")))?;
    Ok(Expression::Regex(field, re))
}

fn parse_bool(value: RawBsonRef<'_>, op: &str) -> Result<bool, QueryParseError> {
    match value {
        RawBsonRef::Boolean(b) => Ok(b),
        _ => Err(QueryParseError::new(format!("{op} value must be a boolean"))),
    }
}

fn parse_u64(value: RawBsonRef<'_>, op: &str) -> Result<u64, QueryParseError> {
    match value {
        RawBsonRef::Int32(i) if i >= 0 => Ok(i as u64),
        RawBsonRef::Int64(i) if i >= 0 => Ok(i as u64),
        _ => Err(QueryParseError::new(format!(
            "{op} value must be a non-negative integer"
        ))),
    }
}

fn parse_document(value: RawBsonRef<'_>, op: &str) -> Result<Document, QueryParseError> {
    let RawBsonRef::Document(doc) = value else {
        return Err(QueryParseError::new(format!("{op} value must be a document")));
    };
    doc.to_document()
        .map_err(|e| QueryParseError::new(format!("malformed BSON: {e}")))
}

fn parse_orderby(value: RawBsonRef<'_>) -> Result<Vec<(String, SortDirection)>, QueryParseError> {
    let RawBsonRef::Document(doc) = value else {
        return Err(QueryParseError::new("$orderby value must be a document"));
    };
    let mut out = Vec::new();
    for result in doc.iter() {
        let (key, value) = result.map_err(|e| QueryParseError::new(format!("malformed BSON: {e}")))?;
        let dir = match value {
            RawBsonRef::Int32(1) | RawBsonRef::Int64(1) => SortDirection::Asc,
            RawBsonRef::Int32(-1) | RawBsonRef::Int64(-1) => SortDirection::Desc,
            _ => return Err(QueryParseError::new("$orderby value must be 1 or -1")),
        };
        out.push((key.to_string(), dir));
    }
    Ok(out)
}

fn parse_fields(value: RawBsonRef<'_>) -> Result<Vec<(String, bool)>, QueryParseError> {
    let RawBsonRef::Document(doc) = value else {
        return Err(QueryParseError::new("$fields value must be a document"));
    };
    let mut out = Vec::new();
    for result in doc.iter() {
        let (key, value) = result.map_err(|e| QueryParseError::new(format!("malformed BSON: {e}")))?;
        let include = match value {
            RawBsonRef::Int32(1) | RawBsonRef::Int64(1) | RawBsonRef::Boolean(true) => true,
            RawBsonRef::Int32(0) | RawBsonRef::Int64(0) | RawBsonRef::Boolean(false) => false,
            _ => return Err(QueryParseError::new("$fields value must be 0/1 or a boolean")),
        };
        out.push((key.to_string(), include));
    }
    let distinct: std::collections::HashSet<bool> = out.iter().map(|(_, v)| *v).collect();
    if distinct.len() > 1 {
        return Err(QueryParseError::new(
            "$fields cannot mix inclusion and exclusion",
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::rawdoc;

    #[test]
    fn bare_field_implicit_eq() {
        let doc = rawdoc! { "status": "active" };
        let parsed = parse_query(&doc).unwrap();
        assert!(matches!(parsed.filter, Expression::Eq("status", _)));
    }

    #[test]
    fn multiple_bare_fields_become_and() {
        let doc = rawdoc! { "status": "active", "age": 30_i32 };
        let parsed = parse_query(&doc).unwrap();
        assert!(matches!(parsed.filter, Expression::And(ref c) if c.len() == 2));
    }

    #[test]
    fn explicit_or() {
        let doc = rawdoc! { "$or": [{ "status": "active" }, { "status": "pending" }] };
        let parsed = parse_query(&doc).unwrap();
        assert!(matches!(parsed.filter, Expression::Or(ref c) if c.len() == 2));
    }

    #[test]
    fn between_operator() {
        let doc = rawdoc! { "age": { "$bt": [18_i32, 65_i32] } };
        let parsed = parse_query(&doc).unwrap();
        assert!(matches!(parsed.filter, Expression::Between("age", _, _)));
    }

    #[test]
    fn in_operator() {
        let doc = rawdoc! { "status": { "$in": ["a", "b"] } };
        let parsed = parse_query(&doc).unwrap();
        match parsed.filter {
            Expression::In("status", values) => assert_eq!(values.len(), 2),
            other => panic!("expected In, got {other:?}"),
        }
    }

    #[test]
    fn directives_split_out_of_filter() {
        let doc = rawdoc! { "status": "active", "$set": { "seen": true }, "$limit": 10_i32 };
        let parsed = parse_query(&doc).unwrap();
        assert!(matches!(parsed.filter, Expression::Eq("status", _)));
        assert_eq!(parsed.update.set.len(), 1);
        assert_eq!(parsed.hints.limit, Some(10));
    }

    #[test]
    fn dropall_and_upsert_directives() {
        let doc = rawdoc! { "status": "active", "$dropall": true };
        let parsed = parse_query(&doc).unwrap();
        assert!(parsed.dropall);
    }

    #[test]
    fn orderby_parses_direction() {
        let doc = rawdoc! { "$orderby": { "age": -1_i32 } };
        let parsed = parse_query(&doc).unwrap();
        assert_eq!(
            parsed.hints.order_by,
            vec![("age".to_string(), SortDirection::Desc)]
        );
    }

    #[test]
    fn mixed_fields_projection_errors() {
        let doc = rawdoc! { "$fields": { "a": 1_i32, "b": 0_i32 } };
        assert!(parse_query(&doc).is_err());
    }

    #[test]
    fn unknown_directive_errors() {
        let doc = rawdoc! { "$nor": [{ "a": 1_i32 }] };
        let err = parse_query(&doc).unwrap_err();
        assert!(err.0.contains("unknown top-level directive"));
    }

    #[test]
    fn search_operator() {
        let doc = rawdoc! { "bio": { "$search": "quick fox" } };
        let parsed = parse_query(&doc).unwrap();
        assert!(matches!(parsed.filter, Expression::Search("bio", "quick fox")));
    }

    #[test]
    fn elem_match_nests_a_subquery() {
        let doc = rawdoc! { "items": { "$elemMatch": { "qty": { "$gt": 5_i32 } } } };
        let parsed = parse_query(&doc).unwrap();
        assert!(matches!(parsed.filter, Expression::ElemMatch("items", _)));
    }

    #[test]
    fn empty_document_matches_everything() {
        let doc = rawdoc! {};
        let parsed = parse_query(&doc).unwrap();
        assert!(matches!(parsed.filter, Expression::And(ref c) if c.is_empty()));
    }
}
