//! Citation key generation
//!
//! A key is built from three fragments:
//!
//! | Fragment | Source | Fallback |
//! |----------|--------|----------|
//! | author | first author's surname, lower-cased, at most 4 characters | `anon` |
//! | year | four-digit publication year | `nd` |
//! | title | first letter (upper-cased) of every significant title word | empty |
//!
//! Title words are split on whitespace and hyphens, stripped of
//! punctuation, and skipped when they are stop-words (see `STOP_WORDS`).
//!
//! `{author: "Watson", year: 1953, title: "The Structure of DNA"}` gives the
//! root key `wats1953SD`. When a root key is already taken the numeric
//! suffixes 2, 3, 4, ... are tried in order.

use std::collections::HashSet;

use crate::models::Metadata;

/// Author fragment used when no author is known
pub const ANONYMOUS: &str = "anon";

/// Year fragment used when no year is known ("no date")
pub const NO_DATE: &str = "nd";

/// Maximum number of characters taken from the surname
const AUTHOR_FRAGMENT_LEN: usize = 4;

/// Title words that never contribute a letter
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "by", "for", "from", "in", "into", "of", "on", "or", "the",
    "to", "with",
];

/// Generate a key for `metadata` that is not in `existing`
///
/// Deterministic: the same metadata and key set always give the same key.
pub fn generate(metadata: &Metadata, existing: &HashSet<String>) -> String {
    unique_key(&root_key(metadata), existing)
}

/// The key candidate before collision suffixing
pub fn root_key(metadata: &Metadata) -> String {
    let mut key = author_fragment(metadata);
    key.push_str(&year_fragment(metadata));
    key.push_str(&title_fragment(metadata));
    key
}

/// Probe `root`, `root2`, `root3`, ... until an unused key is found
pub fn unique_key(root: &str, existing: &HashSet<String>) -> String {
    if !existing.contains(root) {
        return root.to_string();
    }

    (2u64..)
        .map(|n| format!("{}{}", root, n))
        .find(|candidate| !existing.contains(candidate))
        .unwrap_or_else(|| root.to_string())
}

/// Check that a key can be used as a filename stem
///
/// Rejects empty keys, path separators, a leading dot and control
/// characters.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && !key
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control())
}

fn author_fragment(metadata: &Metadata) -> String {
    let fragment: String = metadata
        .first_author_surname()
        .unwrap_or_default()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .take(AUTHOR_FRAGMENT_LEN)
        .collect();

    if fragment.is_empty() {
        ANONYMOUS.to_string()
    } else {
        fragment
    }
}

fn year_fragment(metadata: &Metadata) -> String {
    metadata.year().unwrap_or_else(|| NO_DATE.to_string())
}

fn title_fragment(metadata: &Metadata) -> String {
    let Some(title) = metadata.title() else {
        return String::new();
    };

    title
        .split(|c: char| c.is_whitespace() || c == '-')
        .map(|word| word.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
        .filter(|word| !word.is_empty() && !is_stop_word(word))
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

fn is_stop_word(word: &str) -> bool {
    let lower = word.to_lowercase();
    STOP_WORDS.contains(&lower.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(value: serde_json::Value) -> Metadata {
        Metadata::from_value(value).unwrap()
    }

    fn watson() -> Metadata {
        metadata(json!({
            "author": "Watson",
            "year": 1953,
            "title": "The Structure of DNA"
        }))
    }

    fn keys(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_watson_root_key() {
        assert_eq!(root_key(&watson()), "wats1953SD");
        assert_eq!(generate(&watson(), &HashSet::new()), "wats1953SD");
    }

    #[test]
    fn test_collision_appends_two() {
        let existing = keys(&["wats1953SD"]);
        assert_eq!(generate(&watson(), &existing), "wats1953SD2");
    }

    #[test]
    fn test_probing_is_increasing() {
        let existing = keys(&["wats1953SD", "wats1953SD2", "wats1953SD3"]);
        assert_eq!(generate(&watson(), &existing), "wats1953SD4");

        // A gap is filled before higher suffixes
        let existing = keys(&["wats1953SD", "wats1953SD3"]);
        assert_eq!(generate(&watson(), &existing), "wats1953SD2");
    }

    #[test]
    fn test_determinism() {
        let m = watson();
        let first = generate(&m, &HashSet::new());
        for _ in 0..10 {
            assert_eq!(generate(&m, &HashSet::new()), first);
        }
    }

    #[test]
    fn test_empty_metadata() {
        assert_eq!(root_key(&Metadata::new()), "anonnd");
        assert_eq!(generate(&Metadata::new(), &keys(&["anonnd"])), "anonnd2");
    }

    #[test]
    fn test_author_case_normalized() {
        let upper = metadata(json!({"author": "WATSON", "year": 1953}));
        let lower = metadata(json!({"author": "watson", "year": 1953}));
        assert_eq!(root_key(&upper), root_key(&lower));
        assert_eq!(root_key(&upper), "wats1953");
    }

    #[test]
    fn test_short_and_accented_surnames() {
        assert_eq!(root_key(&metadata(json!({"author": "Li", "year": 2020}))), "li2020");
        assert_eq!(
            root_key(&metadata(json!({"author": "Müller", "year": 2020}))),
            "müll2020"
        );
        assert_eq!(
            root_key(&metadata(json!({"author": "O'Brien", "year": 2020}))),
            "obri2020"
        );
    }

    #[test]
    fn test_csl_metadata() {
        let m = metadata(json!({
            "author": [{"family": "Watson", "given": "J. D."}, {"family": "Crick"}],
            "issued": {"date-parts": [[1953, 4, 25]]},
            "title": "Molecular Structure of Nucleic Acids: A Structure for Deoxyribose Nucleic Acid"
        }));
        assert_eq!(root_key(&m), "wats1953MSNASDNA");
    }

    #[test]
    fn test_title_rule() {
        let m = metadata(json!({"author": "Knuth", "year": 1974, "title": "Computer Programming as an Art"}));
        assert_eq!(root_key(&m), "knut1974CPA");

        let m = metadata(json!({"author": "Doe", "year": 2000, "title": "Self-organizing maps, revisited!"}));
        assert_eq!(root_key(&m), "doe2000SOMR");

        // Only stop-words: empty fragment
        let m = metadata(json!({"author": "Doe", "year": 2000, "title": "Of The"}));
        assert_eq!(root_key(&m), "doe2000");
    }

    #[test]
    fn test_missing_fragments() {
        let m = metadata(json!({"title": "The Structure of DNA"}));
        assert_eq!(root_key(&m), "anonndSD");

        let m = metadata(json!({"author": "Watson", "title": "DNA"}));
        assert_eq!(root_key(&m), "watsndD");
    }

    #[test]
    fn test_generated_keys_are_valid() {
        let samples = [
            Metadata::new(),
            watson(),
            metadata(json!({"author": "../etc", "title": "/root ./x"})),
        ];
        for m in samples {
            assert!(is_valid_key(&generate(&m, &HashSet::new())));
        }
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("wats1953SD"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key(".hidden"));
        assert!(!is_valid_key("a/b"));
        assert!(!is_valid_key("a\\b"));
        assert!(!is_valid_key("a\nb"));
    }
}
