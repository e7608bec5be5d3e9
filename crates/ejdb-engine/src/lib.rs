//! Collection catalog and secondary-index maintenance (spec.md §4.4,
//! §4.5 — components C4 and C5) over the ordered byte-keyed store in
//! `ejdb-store`.
//!
//! [`kv::KvEngine`] is the entry point: open it on a `Store`, `begin` a
//! transaction, and drive collections/documents/indexes through the
//! methods on [`kv::KvTransaction`] (`src/kv/catalog.rs`).

pub mod encoding;
pub mod error;
pub mod index;
pub mod kv;
pub mod validate;

pub use encoding::{CollectionMeta, CollectionOptions, IndexSpec};
pub use error::EngineError;
pub use index::IndexRange;
pub use kv::{KvEngine, KvTransaction};
