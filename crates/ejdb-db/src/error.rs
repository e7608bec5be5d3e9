//! Error taxonomy (spec.md §7): kinds, not types, are what the spec
//! names, so this is one flat enum rather than a hierarchy of structs.

use std::fmt;

use ejdb_engine::EngineError;
use ejdb_query::QueryParseError;

#[derive(Debug)]
pub enum DbError {
    Store(ejdb_store::StoreError),
    NotFound(String),
    CollectionNotFound(String),
    CollectionExists(String),
    DuplicateKey(String),
    InvalidQuery(String),
    InvalidDocument(String),
    OutOfRange(String),
    /// A transaction was requested while one was already open on this
    /// handle — spec.md §4.7's "nested begins are rejected".
    TransactionConflict,
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "io_error: {e}"),
            Self::NotFound(id) => write!(f, "not_found: {id}"),
            Self::CollectionNotFound(name) => write!(f, "not_found: collection {name}"),
            Self::CollectionExists(name) => write!(f, "already_exists: collection {name}"),
            Self::DuplicateKey(id) => write!(f, "unique_violation: {id}"),
            Self::InvalidQuery(msg) => write!(f, "invalid_query: {msg}"),
            Self::InvalidDocument(msg) => write!(f, "invalid_argument: {msg}"),
            Self::OutOfRange(msg) => write!(f, "out_of_range: {msg}"),
            Self::TransactionConflict => write!(f, "transaction_conflict: transaction already open"),
        }
    }
}

impl std::error::Error for DbError {}

impl From<ejdb_store::StoreError> for DbError {
    fn from(e: ejdb_store::StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<QueryParseError> for DbError {
    fn from(e: QueryParseError) -> Self {
        Self::InvalidQuery(e.to_string())
    }
}

impl From<EngineError> for DbError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Store(se) => Self::Store(se),
            EngineError::CollectionNotFound(name) => Self::CollectionNotFound(name),
            EngineError::CollectionExists(name) => Self::CollectionExists(name),
            EngineError::DuplicateKey(id) => Self::DuplicateKey(id),
            EngineError::InvalidDocument(msg) => Self::InvalidDocument(msg),
            EngineError::InvalidKey(msg) => Self::InvalidQuery(msg),
            EngineError::Encoding(msg) => Self::InvalidDocument(msg),
            EngineError::OutOfRange(msg) => Self::OutOfRange(msg),
        }
    }
}
