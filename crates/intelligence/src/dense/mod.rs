//! Dense retrieval adapter
//!
//! The orchestrator talks to an external vector-similarity store only through
//! the [`DenseBackend`] capability trait. [`DenseRetriever`] wraps a backend
//! and turns whatever it returns into well-formed `RetrievalHit`s:
//!
//! 1. non-finite scores are dropped
//! 2. duplicate doc ids keep their best score
//! 3. sort by raw score descending, ties by doc_id ascending
//! 4. truncate to `top_k`, clamp scores into `[0, 1]`, assign ranks `1..`
//!
//! The adapter never returns `Err`. Timeouts and backend failures come back
//! as an empty [`DenseOutcome`] carrying the `BackendError`.
//!
//! Swapping vector stores means writing another `DenseBackend`; nothing in
//! fusion or orchestration changes.

pub mod embedder;
pub mod memory;

pub use embedder::{ApiEmbedder, Embedder, HashEmbedder};
pub use memory::InMemoryVectorBackend;

use crate::bounded::run_bounded;
use quarry_core::{BackendError, RetrievalHit, Source};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Raw result from a vector-similarity backend
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDoc {
    /// Document identifier
    pub doc_id: String,
    /// Backend similarity; higher is more similar
    pub score: f32,
}

impl ScoredDoc {
    /// Create a scored doc
    pub fn new(doc_id: impl Into<String>, score: f32) -> Self {
        ScoredDoc {
            doc_id: doc_id.into(),
            score,
        }
    }
}

/// Capability interface over an embedding-similarity backend
///
/// Implementations are synchronous; the adapter moves calls onto the
/// blocking pool and enforces the budget.
pub trait DenseBackend: Send + Sync {
    /// Nearest documents for `query`, at most `top_k`
    fn search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredDoc>, BackendError>;

    /// Name for debugging and logging
    fn name(&self) -> &str;
}

/// Result of one dense retrieval call
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DenseOutcome {
    /// Normalized hits (empty on failure)
    pub hits: Vec<RetrievalHit>,
    /// Set when the backend failed or timed out
    pub error: Option<BackendError>,
}

impl DenseOutcome {
    /// True when the backend answered in time
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Convert into a `Result`, discarding hits on failure
    pub fn into_result(self) -> Result<Vec<RetrievalHit>, BackendError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.hits),
        }
    }
}

/// Timeout-bounded adapter over a [`DenseBackend`]
#[derive(Clone)]
pub struct DenseRetriever {
    backend: Arc<dyn DenseBackend>,
}

impl std::fmt::Debug for DenseRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenseRetriever")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl DenseRetriever {
    /// Wrap a backend
    pub fn new(backend: Arc<dyn DenseBackend>) -> Self {
        DenseRetriever { backend }
    }

    /// Name of the wrapped backend
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Search under `budget`; never fails.
    pub async fn search(&self, query: &str, top_k: usize, budget: Duration) -> DenseOutcome {
        if top_k == 0 {
            return DenseOutcome::default();
        }

        let backend = Arc::clone(&self.backend);
        let text = query.to_string();
        let result = run_bounded(budget, move || backend.search(&text, top_k)).await;

        match result {
            Ok(raw) => {
                let hits = normalize_hits(raw, top_k);
                debug!(
                    target: "quarry::dense",
                    backend = self.backend.name(),
                    hits = hits.len(),
                    "Dense search"
                );
                DenseOutcome { hits, error: None }
            }
            Err(e) => {
                warn!(
                    target: "quarry::dense",
                    backend = self.backend.name(),
                    error = %e,
                    "Dense search degraded"
                );
                DenseOutcome {
                    hits: Vec::new(),
                    error: Some(e),
                }
            }
        }
    }
}

/// Turn raw backend output into ranked dense hits
pub fn normalize_hits(raw: Vec<ScoredDoc>, top_k: usize) -> Vec<RetrievalHit> {
    let mut best: HashMap<String, f32> = HashMap::new();
    for doc in raw {
        if !doc.score.is_finite() {
            continue;
        }
        best.entry(doc.doc_id)
            .and_modify(|s| *s = s.max(doc.score))
            .or_insert(doc.score);
    }

    let mut docs: Vec<(String, f32)> = best.into_iter().collect();
    docs.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    docs.truncate(top_k);

    docs.into_iter()
        .enumerate()
        .map(|(i, (doc_id, score))| {
            RetrievalHit::new(doc_id, score.clamp(0.0, 1.0), (i + 1) as u32, Source::Dense)
        })
        .collect()
}
