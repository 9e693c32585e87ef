//! Tokenizer shared by indexing and querying
//!
//! Documents and queries must go through the same normalization, otherwise a
//! query term can never match its posting list. Rules:
//! - Lowercase
//! - Split on non-alphanumeric characters
//! - Drop tokens shorter than 2 bytes

use std::collections::{HashMap, HashSet};

/// Minimum token length in bytes
pub const MIN_TOKEN_LEN: usize = 2;

/// Tokenize text into index terms
///
/// # Example
///
/// ```
/// use quarry_search::tokenizer::tokenize;
///
/// let tokens = tokenize("Building permit: Carport (Bavaria)");
/// assert_eq!(tokens, vec!["building", "permit", "carport", "bavaria"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| s.len() >= MIN_TOKEN_LEN)
        .map(String::from)
        .collect()
}

/// Tokenize and deduplicate, keeping first-occurrence order
///
/// # Example
///
/// ```
/// use quarry_search::tokenizer::tokenize_unique;
///
/// let tokens = tokenize_unique("permit Permit carport PERMIT");
/// assert_eq!(tokens, vec!["permit", "carport"]);
/// ```
pub fn tokenize_unique(text: &str) -> Vec<String> {
    dedup_terms(tokenize(text))
}

/// Deduplicate already-tokenized terms, keeping first-occurrence order
pub fn dedup_terms<I>(terms: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    terms
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Term frequencies of a token stream
pub fn term_frequencies(tokens: &[String]) -> HashMap<&str, u32> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_insert(0) += 1;
    }
    counts
}
