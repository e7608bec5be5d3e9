//! Full-text q-gram tokenization, per spec.md §4.5/§9: normalize, fold,
//! strip punctuation, emit overlapping 2-character grams with their
//! position so postings can serve exact-substring and phrase queries.

const K: usize = 2;

/// Lowercase and drop characters that aren't alphanumeric or
/// whitespace, collapsing the rest into a single token stream.
pub fn normalize(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// A single gram occurrence: the 2-character gram and its character
/// offset within the normalized string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gram {
    pub text: String,
    pub position: u32,
}

/// Tokenize a raw string value into its overlapping q-gram postings.
/// Strings shorter than `K` characters (after normalization) produce
/// no grams — full-text search on them degrades to no recall, matching
/// the original's documented minimum query length behavior.
pub fn tokenize(value: &str) -> Vec<Gram> {
    let normalized = normalize(value);
    let chars: Vec<char> = normalized.chars().collect();
    if chars.len() < K {
        return Vec::new();
    }
    (0..=chars.len() - K)
        .map(|i| Gram {
            text: chars[i..i + K].iter().collect(),
            position: i as u32,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_punctuation_and_folds_case() {
        assert_eq!(normalize("Hello, World!"), "hello world");
    }

    #[test]
    fn tokenize_emits_overlapping_grams_with_positions() {
        let grams = tokenize("abcd");
        assert_eq!(
            grams,
            vec![
                Gram { text: "ab".into(), position: 0 },
                Gram { text: "bc".into(), position: 1 },
                Gram { text: "cd".into(), position: 2 },
            ]
        );
    }

    #[test]
    fn tokenize_short_string_produces_nothing() {
        assert!(tokenize("a").is_empty());
    }

    #[test]
    fn tokenize_recalls_substring_positions() {
        let grams = tokenize("the quick brown fox");
        assert!(grams.iter().any(|g| g.text == "qu"));
    }
}
