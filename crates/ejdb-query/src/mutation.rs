//! Update-directive parsing: turns `$set`/`$inc`/... sub-documents into
//! an owned [`UpdateOps`] the executor can hand to `ejdb-bson::merge`.

use bson::raw::RawBsonRef;
use bson::Bson;

use ejdb_bson::UpdateOps;

use crate::error::QueryParseError;

pub fn parse_field_value_pairs(
    value: RawBsonRef<'_>,
) -> Result<Vec<(String, Bson)>, QueryParseError> {
    let RawBsonRef::Document(doc) = value else {
        return Err(QueryParseError::new(
            "update operator value must be a document",
        ));
    };
    let mut out = Vec::new();
    for result in doc.iter() {
        let (key, val) = result.map_err(|e| QueryParseError::new(format!("malformed BSON: {e}")))?;
        let owned = Bson::try_from(val)
            .map_err(|e| QueryParseError::new(format!("unsupported BSON value: {e}")))?;
        out.push((key.to_string(), owned));
    }
    Ok(out)
}

pub fn parse_field_list(value: RawBsonRef<'_>) -> Result<Vec<String>, QueryParseError> {
    let RawBsonRef::Document(doc) = value else {
        return Err(QueryParseError::new("$unset value must be a document"));
    };
    let mut out = Vec::new();
    for result in doc.iter() {
        let (key, _) = result.map_err(|e| QueryParseError::new(format!("malformed BSON: {e}")))?;
        out.push(key.to_string());
    }
    Ok(out)
}

pub fn parse_rename_pairs(value: RawBsonRef<'_>) -> Result<Vec<(String, String)>, QueryParseError> {
    let RawBsonRef::Document(doc) = value else {
        return Err(QueryParseError::new("$rename value must be a document"));
    };
    let mut out = Vec::new();
    for result in doc.iter() {
        let (key, val) = result.map_err(|e| QueryParseError::new(format!("malformed BSON: {e}")))?;
        let RawBsonRef::String(to) = val else {
            return Err(QueryParseError::new("$rename target must be a string"));
        };
        out.push((key.to_string(), to.to_string()));
    }
    Ok(out)
}

pub fn empty_ops() -> UpdateOps {
    UpdateOps::default()
}
