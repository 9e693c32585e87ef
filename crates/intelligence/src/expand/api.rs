//! API-based query expander using an OpenAI-compatible endpoint
//!
//! Calls `{endpoint}/chat/completions` with the expansion prompt and parses
//! the response into typed variants.

use super::parser::{parse_variants_with_filter, sanitize_variants};
use super::{QueryExpander, QueryVariant};
use quarry_core::BackendError;

/// Query expander that calls an OpenAI-compatible chat completions endpoint.
///
/// Works with Ollama, vLLM, llama.cpp server, OpenAI, and other compatible providers.
#[allow(dead_code)] // fields used behind #[cfg(feature = "expand")]
pub struct ApiExpander {
    /// Full URL to the chat completions endpoint
    url: String,
    /// Model name to request
    model: String,
    /// Optional bearer token
    api_key: Option<String>,
    /// Request timeout
    timeout: std::time::Duration,
    /// Sampling temperature (default: 0.7)
    temperature: f32,
    /// Maximum response tokens (default: 400)
    max_tokens: u32,
}

/// Default expansion temperature; moderate creativity for query variations.
const DEFAULT_EXPAND_TEMPERATURE: f32 = 0.7;
/// Default max tokens for expansion responses.
const DEFAULT_EXPAND_MAX_TOKENS: u32 = 400;

impl ApiExpander {
    /// Create a new ApiExpander.
    ///
    /// `endpoint` should be the base URL (e.g. "http://localhost:11434/v1").
    /// The `/chat/completions` path is appended automatically.
    pub fn new(endpoint: &str, model: &str, api_key: Option<&str>, timeout_ms: u64) -> Self {
        let base = endpoint.trim_end_matches('/');
        let url = format!("{}/chat/completions", base);
        Self {
            url,
            model: model.to_string(),
            api_key: api_key.map(|s| s.to_string()),
            timeout: std::time::Duration::from_millis(timeout_ms),
            temperature: DEFAULT_EXPAND_TEMPERATURE,
            max_tokens: DEFAULT_EXPAND_MAX_TOKENS,
        }
    }

    /// Override the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Override the maximum response tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Make the HTTP call and return the raw response text.
    #[cfg(feature = "expand")]
    fn call_api(&self, query: &str, max_variants: usize) -> Result<String, BackendError> {
        use super::prompt::build_messages;

        let body = serde_json::json!({
            "model": self.model,
            "messages": build_messages(query, max_variants),
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        crate::llm_client::call_chat_completions(
            &self.url,
            self.api_key.as_deref(),
            self.timeout,
            &body,
        )
    }

    /// Placeholder for when the `expand` feature is not enabled.
    #[cfg(not(feature = "expand"))]
    fn call_api(&self, _query: &str, _max_variants: usize) -> Result<String, BackendError> {
        Err(BackendError::FeatureDisabled("expand"))
    }
}

impl QueryExpander for ApiExpander {
    fn expand(&self, query: &str, max_variants: usize) -> Result<Vec<QueryVariant>, BackendError> {
        crate::llm_client::retry_once(
            || self.call_api(query, max_variants),
            |text| {
                let parsed = parse_variants_with_filter(text, Some(query));
                sanitize_variants(query, parsed, max_variants)
            },
            |variants| variants.is_empty(),
            || BackendError::Parse("model returned no valid expansion lines after retry".to_string()),
            "expand",
        )
    }
}
