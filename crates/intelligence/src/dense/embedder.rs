//! Text embedders feeding the in-memory vector backend
//!
//! - `HashEmbedder`: deterministic feature hashing, no model or network
//! - `ApiEmbedder`: OpenAI-compatible `/embeddings` endpoint (feature `embed`)

use quarry_core::BackendError;
use quarry_search::tokenizer::tokenize;
use xxhash_rust::xxh3::xxh3_64;

/// Turns text into a fixed-dimension vector
pub trait Embedder: Send + Sync {
    /// Embed one text
    fn embed(&self, text: &str) -> Result<Vec<f32>, BackendError>;

    /// Output dimension
    fn dimension(&self) -> usize;

    /// Name for debugging and logging
    fn name(&self) -> &str;
}

// ============================================================================
// HashEmbedder
// ============================================================================

/// Default dimension for [`HashEmbedder`]
pub const DEFAULT_HASH_DIMENSION: usize = 256;

/// Feature-hashing embedder
///
/// Each token, and each adjacent token pair, is hashed with xxh3 into one of
/// `dimension` buckets with a sign taken from the hash's top bit. The result
/// is L2-normalized so that dot product equals cosine similarity. Texts with
/// no tokens embed to the zero vector.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        HashEmbedder {
            dimension: DEFAULT_HASH_DIMENSION,
        }
    }
}

impl HashEmbedder {
    /// Create an embedder with the given dimension (minimum 1)
    pub fn new(dimension: usize) -> Self {
        HashEmbedder {
            dimension: dimension.max(1),
        }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let h = xxh3_64(feature.as_bytes());
        let bucket = (h % self.dimension as u64) as usize;
        let sign = if h >> 63 == 1 { -1.0 } else { 1.0 };
        vector[bucket] += sign * weight;
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, BackendError> {
        let tokens = tokenize(text);
        let mut vector = vec![0.0f32; self.dimension];

        for token in &tokens {
            self.add_feature(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.add_feature(&mut vector, &format!("{} {}", pair[0], pair[1]), 0.5);
        }

        normalize_in_place(&mut vector);
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// Scale a vector to unit L2 norm; zero vectors are left untouched
pub fn normalize_in_place(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

// ============================================================================
// ApiEmbedder
// ============================================================================

/// Embedder that calls an OpenAI-compatible `/embeddings` endpoint.
///
/// Works with Ollama, vLLM, llama.cpp server, OpenAI, and other compatible
/// providers. Without the `embed` feature every call reports
/// `BackendError::FeatureDisabled("embed")`.
#[allow(dead_code)] // fields used behind #[cfg(feature = "embed")]
pub struct ApiEmbedder {
    /// Full URL to the embeddings endpoint
    url: String,
    /// Model name to request
    model: String,
    /// Optional bearer token
    api_key: Option<String>,
    /// Request timeout
    timeout: std::time::Duration,
    /// Expected output dimension
    dimension: usize,
}

impl ApiEmbedder {
    /// Create a new ApiEmbedder.
    ///
    /// `endpoint` should be the base URL (e.g. "http://localhost:11434/v1").
    /// The `/embeddings` path is appended automatically.
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: Option<&str>,
        dimension: usize,
        timeout_ms: u64,
    ) -> Self {
        let base = endpoint.trim_end_matches('/');
        ApiEmbedder {
            url: format!("{}/embeddings", base),
            model: model.to_string(),
            api_key: api_key.map(|s| s.to_string()),
            timeout: std::time::Duration::from_millis(timeout_ms),
            dimension,
        }
    }

    #[cfg(feature = "embed")]
    fn call_api(&self, text: &str) -> Result<Vec<f32>, BackendError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });
        let vector = crate::llm_client::call_embeddings(
            &self.url,
            self.api_key.as_deref(),
            self.timeout,
            &body,
        )?;
        if vector.len() != self.dimension {
            return Err(BackendError::Parse(format!(
                "expected {} dimensions, model returned {}",
                self.dimension,
                vector.len()
            )));
        }
        Ok(vector)
    }

    /// Placeholder for when the `embed` feature is not enabled.
    #[cfg(not(feature = "embed"))]
    fn call_api(&self, _text: &str) -> Result<Vec<f32>, BackendError> {
        Err(BackendError::FeatureDisabled("embed"))
    }
}

impl Embedder for ApiEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, BackendError> {
        self.call_api(text)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "api"
    }
}
