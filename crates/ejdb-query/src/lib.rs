//! Query AST and BSON parser (spec.md §4.6, component C6's front end).
//!
//! A query document's keys are either field-path predicates or
//! directives starting with `$`. [`parse::parse_query`] splits a single
//! top-level document into a predicate [`expression::Expression`] tree,
//! an [`mutation::UpdateOps`] directive set, and [`hints::QueryHints`] —
//! the three things `ejdb-db`'s planner and executor consume.

pub mod error;
pub mod eval;
pub mod expression;
pub mod hints;
pub mod mutation;
pub mod parse;

pub use error::QueryParseError;
pub use eval::matches;
pub use expression::Expression;
pub use hints::QueryHints;
pub use parse::{parse_query, ParsedQuery};
