//! Execution hints, parsed from a query document's non-predicate
//! directives (spec.md §4.6): `$orderby`, `$skip`, `$limit`, `$fields`,
//! `$onlycount`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryHints {
    /// Multi-key sort order, stable, applied in declaration order.
    pub order_by: Vec<(String, SortDirection)>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    /// Inclusion (`true`) or exclusion (`false`) projection. All
    /// entries must agree in direction — mixed inclusion/exclusion is
    /// a parse error, mirroring MongoDB's own projection rule.
    pub fields: Option<Vec<(String, bool)>>,
    pub only_count: bool,
}
