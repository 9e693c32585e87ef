//! Output parser for model query-expansion responses
//!
//! Parses `lex:`, `vec:`, and `hyde:` prefixed lines from model output.
//! Tolerant: ignores invalid lines, falls back gracefully.

use super::{QueryVariant, VariantKind};
use quarry_search::tokenizer::tokenize_unique;
use std::collections::HashSet;

/// Parse model output into typed variants.
///
/// - Lines without a valid `lex:`, `vec:`, or `hyde:` prefix are ignored
/// - Empty text after the prefix is ignored
/// - Returns an empty vec if no valid lines are found (caller handles fallback)
pub fn parse_variants(text: &str) -> Vec<QueryVariant> {
    parse_variants_with_filter(text, None)
}

/// Parse model output, dropping variants that drifted away from the query.
///
/// When `original_query` is provided, each `lex:`/`vec:` variant must contain
/// at least one term of the original query (case-insensitive substring).
/// `hyde:` lines are exempt since hypothetical documents may describe the
/// topic in different vocabulary.
pub fn parse_variants_with_filter(text: &str, original_query: Option<&str>) -> Vec<QueryVariant> {
    let query_terms: Vec<String> = original_query.map(tokenize_unique).unwrap_or_default();

    let mut variants = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let Some((kind, body)) = split_prefix(trimmed) else {
            continue;
        };
        if body.is_empty() {
            continue;
        }

        if !query_terms.is_empty() && kind != VariantKind::Hyde {
            let lower = body.to_lowercase();
            if !query_terms.iter().any(|term| lower.contains(term.as_str())) {
                continue;
            }
        }

        variants.push(QueryVariant::new(kind, body));
    }

    variants
}

/// Match a `lex:`/`vec:`/`hyde:` prefix, ignoring ASCII case
fn split_prefix(line: &str) -> Option<(VariantKind, &str)> {
    [VariantKind::Lex, VariantKind::Vec, VariantKind::Hyde]
        .into_iter()
        .find_map(|kind| {
            let prefix = kind.prefix();
            let head = line.get(..prefix.len())?;
            if !head.eq_ignore_ascii_case(prefix) {
                return None;
            }
            line[prefix.len()..]
                .strip_prefix(':')
                .map(|rest| (kind, rest.trim()))
        })
}

/// Clean a variant list before it is searched.
///
/// Trims text, drops empty variants, variants equal to the original query
/// (case-insensitive) and duplicates of an earlier variant of the same kind,
/// then truncates to `max_variants`.
pub fn sanitize_variants(
    query: &str,
    variants: Vec<QueryVariant>,
    max_variants: usize,
) -> Vec<QueryVariant> {
    let original = normalize(query);
    let mut seen: HashSet<(VariantKind, String)> = HashSet::new();

    variants
        .into_iter()
        .filter_map(|v| {
            let text = v.text.trim();
            if text.is_empty() {
                return None;
            }
            let key = normalize(text);
            if key == original || !seen.insert((v.kind, key)) {
                return None;
            }
            Some(QueryVariant::new(v.kind, text))
        })
        .take(max_variants)
        .collect()
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
