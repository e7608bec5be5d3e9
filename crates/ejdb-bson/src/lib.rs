//! Document codec operations (spec.md §4.1, C1): dotted-path lookup,
//! update-operator merge, sortable index-key encoding, q-gram
//! tokenization, and object-identifier generation.
//!
//! This crate never touches storage — it operates purely on
//! `bson::Bson`/`bson::Document`/`bson::raw` values. `ejdb-engine` pairs
//! it with `ejdb-store` to build the on-disk record/index layout.

pub mod key;
pub mod merge;
pub mod oid;
pub mod path;
pub mod qgram;

pub use key::IndexKind;
pub use merge::{MergeError, UpdateOps};
pub use oid::OidGenerator;
