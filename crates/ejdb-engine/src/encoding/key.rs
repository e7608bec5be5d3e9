//! Structured key encoding for the engine's namespace layout.
//!
//! Every document's `_id` is a 12-byte `ObjectId` (spec.md §3), so
//! unlike a generic key scheme there is no need to length-prefix the
//! doc-id component: it is always exactly 12 bytes, which lets index
//! keys embed it as a fixed-width suffix after an arbitrary-length
//! encoded value.
//!
//! Tag bytes: `c` collection meta, `x` index config, `r` record,
//! `i` index entry. `\0` separates variable-length components.

use std::borrow::Cow;

use bson::oid::ObjectId;

const COLLECTION_TAG: u8 = b'c';
const INDEX_CONFIG_TAG: u8 = b'x';
const RECORD_TAG: u8 = b'r';
const INDEX_TAG: u8 = b'i';
const SEP: u8 = 0x00;
const OID_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key<'a> {
    Collection(Cow<'a, str>),
    IndexConfig(Cow<'a, str>, Cow<'a, str>),
    Record(Cow<'a, str>, ObjectId),
    /// `value_bytes` is the sortable-encoded index key for the field's
    /// kind (see `ejdb_bson::key`); `doc_id` is the fixed 12-byte suffix.
    Index(Cow<'a, str>, Cow<'a, str>, Vec<u8>, ObjectId),
}

impl<'a> Key<'a> {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Key::Collection(name) => {
                let mut buf = vec![COLLECTION_TAG, SEP];
                buf.extend_from_slice(name.as_bytes());
                buf
            }
            Key::IndexConfig(collection, field) => {
                let mut buf = vec![INDEX_CONFIG_TAG, SEP];
                buf.extend_from_slice(collection.as_bytes());
                buf.push(SEP);
                buf.extend_from_slice(field.as_bytes());
                buf
            }
            Key::Record(collection, doc_id) => {
                let mut buf = vec![RECORD_TAG, SEP];
                buf.extend_from_slice(collection.as_bytes());
                buf.push(SEP);
                buf.extend_from_slice(&doc_id.bytes());
                buf
            }
            Key::Index(collection, field, value_bytes, doc_id) => {
                let mut buf = vec![INDEX_TAG, SEP];
                buf.extend_from_slice(collection.as_bytes());
                buf.push(SEP);
                buf.extend_from_slice(field.as_bytes());
                buf.push(SEP);
                buf.extend_from_slice(value_bytes);
                // Separates the variable-width value from the fixed 12-byte
                // doc-id suffix: without it, a shorter value (e.g. "Bob") is
                // a raw byte-prefix of a longer one ("Bobby") and an exact
                // value-prefix scan would spuriously match both.
                buf.push(SEP);
                buf.extend_from_slice(&doc_id.bytes());
                buf
            }
        }
    }

    pub fn decode(bytes: &'a [u8]) -> Option<Key<'a>> {
        if bytes.len() < 2 || bytes[1] != SEP {
            return None;
        }
        let tag = bytes[0];
        let rest = &bytes[2..];
        match tag {
            COLLECTION_TAG => Some(Key::Collection(Cow::Borrowed(
                std::str::from_utf8(rest).ok()?,
            ))),
            RECORD_TAG => {
                let sep = rest.iter().position(|&b| b == SEP)?;
                let collection = std::str::from_utf8(&rest[..sep]).ok()?;
                let id_bytes = &rest[sep + 1..];
                if id_bytes.len() != OID_LEN {
                    return None;
                }
                let mut arr = [0u8; OID_LEN];
                arr.copy_from_slice(id_bytes);
                Some(Key::Record(Cow::Borrowed(collection), ObjectId::from_bytes(arr)))
            }
            INDEX_CONFIG_TAG => {
                let sep = rest.iter().position(|&b| b == SEP)?;
                let collection = std::str::from_utf8(&rest[..sep]).ok()?;
                let field = std::str::from_utf8(&rest[sep + 1..]).ok()?;
                Some(Key::IndexConfig(
                    Cow::Borrowed(collection),
                    Cow::Borrowed(field),
                ))
            }
            INDEX_TAG => {
                let sep1 = rest.iter().position(|&b| b == SEP)?;
                let collection = std::str::from_utf8(&rest[..sep1]).ok()?;
                let after = &rest[sep1 + 1..];
                let sep2 = after.iter().position(|&b| b == SEP)?;
                let field = std::str::from_utf8(&after[..sep2]).ok()?;
                let tail = &after[sep2 + 1..];
                if tail.len() < OID_LEN + 1 {
                    return None;
                }
                let split = tail.len() - OID_LEN - 1;
                if tail[split] != SEP {
                    return None;
                }
                let value_bytes = tail[..split].to_vec();
                let mut arr = [0u8; OID_LEN];
                arr.copy_from_slice(&tail[split + 1..]);
                Some(Key::Index(
                    Cow::Borrowed(collection),
                    Cow::Borrowed(field),
                    value_bytes,
                    ObjectId::from_bytes(arr),
                ))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPrefix<'a> {
    Collection,
    IndexConfig(Cow<'a, str>),
    Record(Cow<'a, str>),
    IndexField(Cow<'a, str>, Cow<'a, str>),
    IndexValue(Cow<'a, str>, Cow<'a, str>, &'a [u8]),
}

impl<'a> KeyPrefix<'a> {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            KeyPrefix::Collection => vec![COLLECTION_TAG, SEP],
            KeyPrefix::IndexConfig(collection) => {
                let mut buf = vec![INDEX_CONFIG_TAG, SEP];
                buf.extend_from_slice(collection.as_bytes());
                buf.push(SEP);
                buf
            }
            KeyPrefix::Record(collection) => {
                let mut buf = vec![RECORD_TAG, SEP];
                buf.extend_from_slice(collection.as_bytes());
                buf.push(SEP);
                buf
            }
            KeyPrefix::IndexField(collection, field) => {
                let mut buf = vec![INDEX_TAG, SEP];
                buf.extend_from_slice(collection.as_bytes());
                buf.push(SEP);
                buf.extend_from_slice(field.as_bytes());
                buf.push(SEP);
                buf
            }
            KeyPrefix::IndexValue(collection, field, value) => {
                // Trailing `SEP` makes this an exact-value prefix, not a
                // byte-prefix of every longer value that happens to start
                // the same way (see the matching comment on `Key::Index`).
                let mut buf = KeyPrefix::IndexField(collection.clone(), field.clone()).encode();
                buf.extend_from_slice(value);
                buf.push(SEP);
                buf
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_key_roundtrip() {
        let key = Key::Collection(Cow::Borrowed("contacts"));
        let decoded = Key::decode(&key.encode()).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn record_key_roundtrip() {
        let id = ObjectId::new();
        let key = Key::Record(Cow::Borrowed("contacts"), id);
        let decoded = Key::decode(&key.encode()).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn index_key_roundtrip_with_value_bytes() {
        let id = ObjectId::new();
        let key = Key::Index(
            Cow::Borrowed("contacts"),
            Cow::Borrowed("name"),
            b"Bruce".to_vec(),
            id,
        );
        let decoded = Key::decode(&key.encode()).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn index_value_prefix_matches_exact_value_only() {
        let id = ObjectId::new();
        let value = b"Bruce".to_vec();
        let prefix = KeyPrefix::IndexValue(Cow::Borrowed("c"), Cow::Borrowed("name"), &value).encode();
        let key = Key::Index(Cow::Borrowed("c"), Cow::Borrowed("name"), b"Bruce".to_vec(), id);
        assert!(key.encode().starts_with(&prefix));
    }

    #[test]
    fn index_value_prefix_does_not_match_longer_value() {
        let id = ObjectId::new();
        let short = b"Bob".to_vec();
        let prefix = KeyPrefix::IndexValue(Cow::Borrowed("c"), Cow::Borrowed("name"), &short).encode();
        let longer = Key::Index(Cow::Borrowed("c"), Cow::Borrowed("name"), b"Bobby".to_vec(), id);
        assert!(!longer.encode().starts_with(&prefix));
    }
}
