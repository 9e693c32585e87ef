//! Quarry - hybrid sparse + dense retrieval
//!
//! Quarry answers a text query with a ranked list of document ids. A BM25
//! index is always queried; a dense (embedding) backend and language-model
//! query expansion are added behind feature flags and rolled out by
//! percentage. Branches run concurrently under per-branch timeouts, results
//! are merged with weighted Reciprocal Rank Fusion, and a branch that fails
//! or times out degrades the response instead of failing it.
//!
//! # Quick Start
//!
//! ```
//! use quarry::{FeatureFlagConfig, HybridRetriever, SparseIndex, Stage};
//! use std::sync::Arc;
//!
//! let index = Arc::new(SparseIndex::new());
//! index
//!     .index_pairs(vec![
//!         ("d1", "building permit carport bavaria"),
//!         ("d2", "solar panel roof installation"),
//!     ])
//!     .unwrap();
//!
//! let retriever = HybridRetriever::new(index);
//! let config = FeatureFlagConfig::sparse_only(Stage::Production);
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! let response = rt.block_on(retriever.retrieve("carport permit", &config)).unwrap();
//! assert_eq!(response.hits[0].doc_id, "d1");
//! assert!(!response.degraded);
//! ```
//!
//! # Architecture
//!
//! - [`core`]: errors, shared types, feature flags
//! - [`search`]: tokenizer, BM25 index, rank fusion
//! - [`intelligence`]: dense adapter, query expansion, orchestrator, metrics
//! - [`eval`]: offline ranking metrics and rollout gating

pub use quarry_core as core;
pub use quarry_eval as eval;
pub use quarry_intelligence as intelligence;
pub use quarry_search as search;

pub use quarry_core::{
    BackendError, FeatureFlagConfig, FlagFile, FusedResult, QuarryError, Result, RetrievalHit,
    Source, Stage,
};
pub use quarry_eval::{EvaluationCase, EvaluationReport, Evaluator, RolloutGate};
pub use quarry_intelligence::{
    BoundedExpander, DenseBackend, DenseRetriever, HybridRetriever, MetricsSink, QueryExpander,
    RetrievalPlan, RetrievalResponse, RetrievalState,
};
pub use quarry_search::{Document, SparseIndex};
