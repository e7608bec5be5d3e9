//! Defensive bounds on document shape (spec.md §9 Open Questions:
//! "maximum document depth and key length ... implementation-defined").
//! Resolved here as a fixed depth and field-name bound, surfaced as
//! `EngineError::OutOfRange` rather than a stack overflow or panic.

use bson::raw::{RawBsonRef, RawDocument};

use crate::error::EngineError;

const MAX_DEPTH: usize = 64;
const MAX_FIELD_NAME_LEN: usize = 1024;

pub fn validate_raw_document(doc: &RawDocument) -> Result<(), EngineError> {
    validate_depth(doc, 1)
}

fn validate_depth(doc: &RawDocument, depth: usize) -> Result<(), EngineError> {
    if depth > MAX_DEPTH {
        return Err(EngineError::OutOfRange(format!(
            "document nesting exceeds max depth {MAX_DEPTH}"
        )));
    }
    for result in doc.iter() {
        let (key, value) = result.map_err(|e| EngineError::Encoding(e.to_string()))?;
        if key.len() > MAX_FIELD_NAME_LEN {
            return Err(EngineError::OutOfRange(format!(
                "field name '{key}' exceeds max length {MAX_FIELD_NAME_LEN}"
            )));
        }
        validate_value_depth(value, depth + 1)?;
    }
    Ok(())
}

fn validate_value_depth(value: RawBsonRef<'_>, depth: usize) -> Result<(), EngineError> {
    match value {
        RawBsonRef::Document(d) => validate_depth(d, depth),
        RawBsonRef::Array(a) => {
            if depth > MAX_DEPTH {
                return Err(EngineError::OutOfRange(format!(
                    "document nesting exceeds max depth {MAX_DEPTH}"
                )));
            }
            for item in a {
                let item = item.map_err(|e| EngineError::Encoding(e.to_string()))?;
                validate_value_depth(item, depth + 1)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shallow_document_passes() {
        let doc = bson::rawdoc! { "a": { "b": 1 } };
        assert!(validate_raw_document(&doc).is_ok());
    }

    #[test]
    fn long_field_name_rejected() {
        let long_name = "x".repeat(MAX_FIELD_NAME_LEN + 1);
        let mut doc = bson::RawDocumentBuf::new();
        doc.append(long_name, 1i32);
        assert!(matches!(
            validate_raw_document(&doc),
            Err(EngineError::OutOfRange(_))
        ));
    }

    #[test]
    fn deeply_nested_document_rejected() {
        let mut inner = bson::Bson::Int32(1);
        for _ in 0..MAX_DEPTH + 2 {
            inner = bson::Bson::Document(bson::doc! { "n": inner });
        }
        let bson::Bson::Document(d) = inner else {
            unreachable!()
        };
        let raw = bson::RawDocumentBuf::from_document(&d).unwrap();
        assert!(matches!(
            validate_raw_document(&raw),
            Err(EngineError::OutOfRange(_))
        ));
    }
}
