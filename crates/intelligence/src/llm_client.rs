//! Shared HTTP client for language-model and embedding endpoints
//!
//! Provides the JSON POST helper, response extraction for chat completions
//! and embeddings, and the single-retry policy used by `ApiExpander`.
//! All failures map onto [`BackendError`] so callers can degrade instead of
//! failing the request.

use quarry_core::BackendError;

// ============================================================================
// Shared HTTP Client
// ============================================================================

/// POST a JSON body and parse the JSON response.
///
/// Handles:
/// - ureq agent construction with timeout
/// - Bearer token auth header
/// - Mapping transport errors onto `BackendError`
#[cfg(any(feature = "expand", feature = "embed"))]
fn post_json(
    url: &str,
    api_key: Option<&str>,
    timeout: std::time::Duration,
    body: &serde_json::Value,
) -> Result<serde_json::Value, BackendError> {
    let body_bytes = serde_json::to_vec(body)
        .map_err(|e| BackendError::Parse(format!("failed to serialize request: {}", e)))?;

    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build();
    let agent = ureq::Agent::new_with_config(config);

    let mut request = agent.post(url).header("Content-Type", "application/json");

    if let Some(key) = api_key {
        request = request.header("Authorization", &format!("Bearer {}", key));
    }

    let mut response = request.send(&body_bytes[..]).map_err(|e| {
        let msg = e.to_string();
        if msg.contains("timed out") || msg.contains("Timeout") {
            BackendError::Timeout {
                budget_ms: timeout.as_millis() as u64,
            }
        } else {
            BackendError::Unavailable(msg)
        }
    })?;

    let response_text = response
        .body_mut()
        .read_to_string()
        .map_err(|e| BackendError::Unavailable(format!("failed to read response: {}", e)))?;

    serde_json::from_str(&response_text).map_err(|e| {
        BackendError::Parse(format!(
            "invalid JSON response ({}): {}",
            e,
            &response_text[..response_text.len().min(200)]
        ))
    })
}

/// Call an OpenAI-compatible chat completions endpoint.
///
/// Returns `choices[0].message.content`.
#[cfg(feature = "expand")]
pub fn call_chat_completions(
    url: &str,
    api_key: Option<&str>,
    timeout: std::time::Duration,
    body: &serde_json::Value,
) -> Result<String, BackendError> {
    let json = post_json(url, api_key, timeout, body)?;
    extract_chat_content(&json)
}

/// Call an OpenAI-compatible embeddings endpoint.
///
/// Returns `data[0].embedding`.
#[cfg(feature = "embed")]
pub fn call_embeddings(
    url: &str,
    api_key: Option<&str>,
    timeout: std::time::Duration,
    body: &serde_json::Value,
) -> Result<Vec<f32>, BackendError> {
    let json = post_json(url, api_key, timeout, body)?;
    extract_embedding(&json)
}

// ============================================================================
// Response Extraction
// ============================================================================

/// Pull `choices[0].message.content` out of a chat completions response
pub fn extract_chat_content(json: &serde_json::Value) -> Result<String, BackendError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| BackendError::Parse(format!("unexpected response format: {}", short(json))))
}

/// Pull `data[0].embedding` out of an embeddings response
pub fn extract_embedding(json: &serde_json::Value) -> Result<Vec<f32>, BackendError> {
    let values = json
        .get("data")
        .and_then(|d| d.get(0))
        .and_then(|d| d.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| BackendError::Parse(format!("unexpected response format: {}", short(json))))?;

    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| BackendError::Parse("non-numeric embedding component".to_string()))
        })
        .collect()
}

fn short(json: &serde_json::Value) -> String {
    let text = json.to_string();
    text.chars().take(200).collect()
}

// ============================================================================
// Retry Helper
// ============================================================================

/// Execute a model call with a single retry on failure or empty results.
///
/// 1. Calls `call_fn()` to get raw text
/// 2. Calls `parse_fn()` to parse it
/// 3. If parsing succeeds but `is_empty_fn()` returns true, retries once
/// 4. If the call itself fails, retries once
///
/// `FeatureDisabled` is returned immediately since a retry cannot succeed.
/// `operation` is a label for tracing messages (e.g. "expand").
pub fn retry_once<T>(
    call_fn: impl Fn() -> Result<String, BackendError>,
    parse_fn: impl Fn(&str) -> T,
    is_empty_fn: impl Fn(&T) -> bool,
    on_empty_err: impl Fn() -> BackendError,
    operation: &str,
) -> Result<T, BackendError> {
    // First attempt
    match call_fn() {
        Ok(text) => {
            let result = parse_fn(&text);
            if !is_empty_fn(&result) {
                return Ok(result);
            }
            tracing::warn!(
                target: "quarry::llm_client",
                op = operation,
                "First call returned no valid results, retrying"
            );
        }
        Err(e @ BackendError::FeatureDisabled(_)) => return Err(e),
        Err(e) => {
            tracing::warn!(
                target: "quarry::llm_client",
                op = operation,
                error = %e,
                "First call failed, retrying"
            );
        }
    }

    // Retry once
    match call_fn() {
        Ok(text) => {
            let result = parse_fn(&text);
            if is_empty_fn(&result) {
                tracing::warn!(
                    target: "quarry::llm_client",
                    op = operation,
                    "Retry also returned no valid results, falling back"
                );
                Err(on_empty_err())
            } else {
                Ok(result)
            }
        }
        Err(e) => {
            tracing::warn!(
                target: "quarry::llm_client",
                op = operation,
                error = %e,
                "Retry also failed, falling back"
            );
            Err(e)
        }
    }
}
