//! Shared fixtures for orchestrator tests
#![allow(dead_code)]

use quarry_core::BackendError;
use quarry_intelligence::{DenseBackend, QueryExpander, QueryVariant, ScoredDoc};
use quarry_search::SparseIndex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Route test logs through the test writer; honors RUST_LOG
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn permit_corpus() -> Arc<SparseIndex> {
    let index = Arc::new(SparseIndex::new());
    index
        .index_pairs(vec![
            ("d1", "building permit carport bavaria"),
            ("d2", "solar panel roof installation"),
            ("d3", "garage exemption rules for small structures"),
            ("d4", "permit fees and carport size limits"),
            ("d5", "roof tiles and gutter repair"),
        ])
        .unwrap();
    index
}

/// Backend returning a fixed list and counting calls
pub struct FixedBackend {
    docs: Vec<ScoredDoc>,
    pub calls: AtomicUsize,
}

impl FixedBackend {
    pub fn new(docs: &[(&str, f32)]) -> Arc<Self> {
        Arc::new(FixedBackend {
            docs: docs.iter().map(|(id, s)| ScoredDoc::new(*id, *s)).collect(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DenseBackend for FixedBackend {
    fn search(&self, _query: &str, top_k: usize) -> Result<Vec<ScoredDoc>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.docs.iter().take(top_k).cloned().collect())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Backend that sleeps longer than any test budget
pub struct SlowBackend {
    pub delay: Duration,
}

impl DenseBackend for SlowBackend {
    fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<ScoredDoc>, BackendError> {
        std::thread::sleep(self.delay);
        Ok(vec![ScoredDoc::new("d2", 0.99)])
    }

    fn name(&self) -> &str {
        "slow"
    }
}

/// Backend that is always down
pub struct DownBackend;

impl DenseBackend for DownBackend {
    fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<ScoredDoc>, BackendError> {
        Err(BackendError::Unavailable("connection refused".to_string()))
    }

    fn name(&self) -> &str {
        "down"
    }
}

/// Expander that sleeps past its budget
pub struct SlowExpander {
    pub delay: Duration,
}

impl QueryExpander for SlowExpander {
    fn expand(&self, query: &str, _max: usize) -> Result<Vec<QueryVariant>, BackendError> {
        std::thread::sleep(self.delay);
        Ok(vec![QueryVariant::new(
            quarry_intelligence::VariantKind::Lex,
            format!("{} garage", query),
        )])
    }
}

/// Expander that always fails
pub struct DownExpander;

impl QueryExpander for DownExpander {
    fn expand(&self, _query: &str, _max: usize) -> Result<Vec<QueryVariant>, BackendError> {
        Err(BackendError::Unavailable("model offline".to_string()))
    }
}

pub fn ids(response: &quarry_intelligence::RetrievalResponse) -> Vec<String> {
    response.doc_ids()
}

/// Hybrid config with budgets loose enough for slow CI machines
pub fn hybrid(stage: quarry_core::Stage) -> quarry_core::FeatureFlagConfig {
    quarry_core::FeatureFlagConfig::hybrid(stage).with_timeouts(2_000, 2_000)
}

/// Sparse-only config with a loose sparse budget
pub fn sparse_only(stage: quarry_core::Stage) -> quarry_core::FeatureFlagConfig {
    quarry_core::FeatureFlagConfig::sparse_only(stage).with_timeouts(2_000, 2_000)
}
