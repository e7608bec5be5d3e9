//! Predicate tree. Borrows field names and scalar values directly from
//! the raw BSON query document — only `$and`/`$or`/`$in`/`$nin`
//! children and compiled `$regex` patterns allocate.

use bson::raw::RawBsonRef;

#[derive(Debug, Clone)]
pub enum Expression<'a> {
    Eq(&'a str, RawBsonRef<'a>),
    Ne(&'a str, RawBsonRef<'a>),
    Gt(&'a str, RawBsonRef<'a>),
    Gte(&'a str, RawBsonRef<'a>),
    Lt(&'a str, RawBsonRef<'a>),
    Lte(&'a str, RawBsonRef<'a>),
    /// `$bt`: inclusive between.
    Between(&'a str, RawBsonRef<'a>, RawBsonRef<'a>),
    In(&'a str, Vec<RawBsonRef<'a>>),
    Nin(&'a str, Vec<RawBsonRef<'a>>),
    /// `$begin`: string prefix match.
    Begin(&'a str, &'a str),
    /// `$icase`: case-insensitive string equality.
    Icase(&'a str, &'a str),
    Regex(&'a str, regex::Regex),
    /// `$search`: full-text substring match against a q-gram index
    /// (spec.md §4.5/§9), re-checked as a normalized substring test
    /// regardless of which gram drove candidate selection.
    Search(&'a str, &'a str),
    Exists(&'a str, bool),
    /// `$elemMatch`: at least one array element satisfies the nested
    /// expression, evaluated against that element as a standalone value.
    ElemMatch(&'a str, Box<Expression<'a>>),
    And(Vec<Expression<'a>>),
    Or(Vec<Expression<'a>>),
}

impl<'a> Expression<'a> {
    /// The field path this atom predicates on, if it is a single-field
    /// leaf (used by the planner to match atoms against declared
    /// indexes). Combinators return `None`.
    pub fn field(&self) -> Option<&'a str> {
        match self {
            Expression::Eq(f, _)
            | Expression::Ne(f, _)
            | Expression::Gt(f, _)
            | Expression::Gte(f, _)
            | Expression::Lt(f, _)
            | Expression::Lte(f, _)
            | Expression::Between(f, _, _)
            | Expression::In(f, _)
            | Expression::Nin(f, _)
            | Expression::Begin(f, _)
            | Expression::Icase(f, _)
            | Expression::Regex(f, _)
            | Expression::Search(f, _)
            | Expression::Exists(f, _)
            | Expression::ElemMatch(f, _) => Some(f),
            Expression::And(_) | Expression::Or(_) => None,
        }
    }
}

impl<'a> PartialEq for Expression<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Expression::Eq(f1, v1), Expression::Eq(f2, v2)) => f1 == f2 && v1 == v2,
            (Expression::Ne(f1, v1), Expression::Ne(f2, v2)) => f1 == f2 && v1 == v2,
            (Expression::Gt(f1, v1), Expression::Gt(f2, v2)) => f1 == f2 && v1 == v2,
            (Expression::Gte(f1, v1), Expression::Gte(f2, v2)) => f1 == f2 && v1 == v2,
            (Expression::Lt(f1, v1), Expression::Lt(f2, v2)) => f1 == f2 && v1 == v2,
            (Expression::Lte(f1, v1), Expression::Lte(f2, v2)) => f1 == f2 && v1 == v2,
            (Expression::Between(f1, a1, b1), Expression::Between(f2, a2, b2)) => {
                f1 == f2 && a1 == a2 && b1 == b2
            }
            (Expression::In(f1, v1), Expression::In(f2, v2)) => f1 == f2 && v1 == v2,
            (Expression::Nin(f1, v1), Expression::Nin(f2, v2)) => f1 == f2 && v1 == v2,
            (Expression::Begin(f1, s1), Expression::Begin(f2, s2)) => f1 == f2 && s1 == s2,
            (Expression::Icase(f1, s1), Expression::Icase(f2, s2)) => f1 == f2 && s1 == s2,
            (Expression::Regex(f1, r1), Expression::Regex(f2, r2)) => {
                f1 == f2 && r1.as_str() == r2.as_str()
            }
            (Expression::Search(f1, s1), Expression::Search(f2, s2)) => f1 == f2 && s1 == s2,
            (Expression::Exists(f1, b1), Expression::Exists(f2, b2)) => f1 == f2 && b1 == b2,
            (Expression::ElemMatch(f1, e1), Expression::ElemMatch(f2, e2)) => f1 == f2 && e1 == e2,
            (Expression::And(c1), Expression::And(c2)) => c1 == c2,
            (Expression::Or(c1), Expression::Or(c2)) => c1 == c2,
            _ => false,
        }
    }
}
