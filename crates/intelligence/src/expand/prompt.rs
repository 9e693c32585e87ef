//! Prompt template for query expansion

/// System prompt for query expansion.
///
/// Instructs the model to output `lex:`, `vec:`, and `hyde:` prefixed lines.
pub const SYSTEM_PROMPT: &str = "\
You are a search query expander for a document retrieval system that combines \
keyword (BM25) search with semantic vector search.

Given a user's search query, generate alternative search variants to improve recall.

Output format (one per line, no other text):
lex: <keyword query for BM25 text search>
vec: <natural language phrase for semantic vector similarity>
hyde: <hypothetical document passage that would answer the query>

Rules:
- Generate at most {max} lines in total
- lex lines: keyword reformulations, synonyms, domain terms
- vec lines: natural language rephrasing for semantic similarity
- hyde lines: 50-200 chars, what the ideal matching passage looks like
- Do NOT repeat the original query verbatim
- Do NOT include any explanation, numbering, or markdown
- Output ONLY lines starting with lex:, vec:, or hyde:";

/// Build the system prompt for a variant budget
pub fn system_prompt(max_variants: usize) -> String {
    SYSTEM_PROMPT.replace("{max}", &max_variants.to_string())
}

/// Build the messages array for an OpenAI-compatible chat completions request.
pub fn build_messages(query: &str, max_variants: usize) -> serde_json::Value {
    serde_json::json!([
        {"role": "system", "content": system_prompt(max_variants)},
        {"role": "user", "content": query}
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_mentions_prefixes() {
        assert!(SYSTEM_PROMPT.contains("lex:"));
        assert!(SYSTEM_PROMPT.contains("vec:"));
        assert!(SYSTEM_PROMPT.contains("hyde:"));
    }

    #[test]
    fn test_system_prompt_fills_budget() {
        let prompt = system_prompt(4);
        assert!(prompt.contains("at most 4 lines"));
        assert!(!prompt.contains("{max}"));
    }

    #[test]
    fn test_build_messages_structure() {
        let messages = build_messages("carport permit", 3);
        let arr = messages.as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[0]["role"], "system");
        assert_eq!(arr[1]["role"], "user");
        assert_eq!(arr[1]["content"], "carport permit");
    }
}
