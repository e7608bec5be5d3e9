//! Sortable key encodings per index kind, per spec.md §4.5.
//!
//! Every encoding produces a byte string whose lexicographic
//! (byte-wise) order matches the value's natural order for that kind,
//! so a plain ordered byte-keyed store (see `ejdb-store`) can serve
//! range/prefix scans directly.

use bson::Bson;

/// The five index kinds spec.md §3 names. `Array` is not encoded here —
/// the engine encodes each element with the element's own natural kind
/// and emits one postings entry per element. `Qgram` postings are
/// produced by [`crate::qgram`], not this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum IndexKind {
    String,
    IString,
    Number,
    Array,
    Qgram,
}

/// Encode a scalar value as a sortable key for `kind`. Returns `None`
/// for values that don't apply to the requested kind (e.g. a string
/// value under a `Number` index) — the caller should skip such values
/// rather than create a spurious index entry (spec.md I2: "for missing
/// paths no entry is created", extended here to type-mismatched
/// values).
pub fn encode(kind: IndexKind, value: &Bson) -> Option<Vec<u8>> {
    match kind {
        IndexKind::String => encode_string(value),
        IndexKind::IString => encode_istring(value),
        IndexKind::Number => encode_number(value),
        IndexKind::Array | IndexKind::Qgram => None,
    }
}

fn encode_string(value: &Bson) -> Option<Vec<u8>> {
    match value {
        Bson::String(s) => Some(s.as_bytes().to_vec()),
        _ => None,
    }
}

/// Unicode simple casefold via `str::to_lowercase` — a practical
/// approximation of full Unicode case folding, adequate for
/// case-insensitive equality/prefix matching.
fn encode_istring(value: &Bson) -> Option<Vec<u8>> {
    match value {
        Bson::String(s) => Some(s.to_lowercase().into_bytes()),
        _ => None,
    }
}

/// Offset-binary IEEE-754 encoding: flips the sign bit for positive
/// values and inverts every bit for negative ones, so big-endian byte
/// order matches numeric order across the full `f64` range. Integers
/// are cast to `f64` first (exact up to 2^53; beyond that the cast is
/// lossy, a documented limitation — see DESIGN.md).
fn encode_number(value: &Bson) -> Option<Vec<u8>> {
    let f = match value {
        Bson::Int32(i) => *i as f64,
        Bson::Int64(i) => *i as f64,
        Bson::Double(d) => *d,
        _ => return None,
    };
    Some(order_preserving_f64(f).to_vec())
}

pub fn order_preserving_f64(f: f64) -> [u8; 8] {
    let bits = f.to_bits();
    let flipped = if bits & (1 << 63) != 0 {
        !bits
    } else {
        bits | (1 << 63)
    };
    flipped.to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_preserve_order() {
        let values = [-100.0, -1.5, -0.001, 0.0, 0.001, 1.5, 100.0, 1e30];
        let mut keys: Vec<[u8; 8]> = values.iter().map(|v| order_preserving_f64(*v)).collect();
        let sorted = {
            let mut k = keys.clone();
            k.sort();
            k
        };
        keys.sort();
        assert_eq!(keys, sorted);
        for w in keys.windows(2) {
            assert!(w[0] <= w[1]);
        }
    }

    #[test]
    fn int_and_double_compare_numerically() {
        let int_key = encode_number(&Bson::Int64(10)).unwrap();
        let double_key = encode_number(&Bson::Double(10.5)).unwrap();
        assert!(int_key < double_key);
    }

    #[test]
    fn istring_folds_case() {
        let a = encode_istring(&Bson::String("Hello".into())).unwrap();
        let b = encode_istring(&Bson::String("hello".into())).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn string_kind_rejects_non_string() {
        assert!(encode_string(&Bson::Int32(1)).is_none());
    }
}
