use std::fmt;

use ejdb_store::StoreError;

#[derive(Debug)]
pub enum EngineError {
    Store(StoreError),
    CollectionNotFound(String),
    CollectionExists(String),
    DuplicateKey(String),
    InvalidDocument(String),
    InvalidKey(String),
    Encoding(String),
    OutOfRange(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "store error: {e}"),
            Self::CollectionNotFound(name) => write!(f, "collection not found: {name}"),
            Self::CollectionExists(name) => write!(f, "collection already exists: {name}"),
            Self::DuplicateKey(id) => write!(f, "duplicate key: {id}"),
            Self::InvalidDocument(msg) => write!(f, "invalid document: {msg}"),
            Self::InvalidKey(msg) => write!(f, "invalid key: {msg}"),
            Self::Encoding(msg) => write!(f, "encoding error: {msg}"),
            Self::OutOfRange(msg) => write!(f, "out of range: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<bson::raw::Error> for EngineError {
    fn from(e: bson::raw::Error) -> Self {
        Self::Encoding(e.to_string())
    }
}

impl From<bson::ser::Error> for EngineError {
    fn from(e: bson::ser::Error) -> Self {
        Self::Encoding(e.to_string())
    }
}

impl From<bson::de::Error> for EngineError {
    fn from(e: bson::de::Error) -> Self {
        Self::Encoding(e.to_string())
    }
}
