//! On-disk layout: how catalog entries, records, and index postings map
//! onto the flat byte-keyed namespaces `ejdb-store` provides.

pub mod index_record;
pub mod key;
pub mod record;

pub use index_record::Postings;
pub use key::{Key, KeyPrefix};
pub use record::{is_expired, CollectionMeta, CollectionOptions, IndexSpec};
