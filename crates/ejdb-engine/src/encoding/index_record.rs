//! Posting-list payload for q-gram (full-text) index entries.
//!
//! A q-gram index key (`Key::Index` with the gram's UTF-8 bytes as
//! `value_bytes`) can be hit by the same document more than once — a
//! gram repeats within a field, or the field is an array of strings.
//! The positions are needed to answer phrase/proximity queries, so the
//! postings value is a list of character offsets rather than an empty
//! marker.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Postings {
    pub positions: Vec<u32>,
}

impl Postings {
    pub fn new(positions: Vec<u32>) -> Self {
        Self { positions }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.positions.len() * 4);
        for p in &self.positions {
            buf.extend_from_slice(&p.to_be_bytes());
        }
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let positions = bytes
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Self { positions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postings_roundtrip() {
        let p = Postings::new(vec![0, 3, 17]);
        assert_eq!(Postings::from_bytes(&p.to_bytes()), p);
    }

    #[test]
    fn empty_postings_roundtrip() {
        let p = Postings::default();
        assert_eq!(Postings::from_bytes(&p.to_bytes()), p);
    }
}
