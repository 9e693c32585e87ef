//! Hybrid retrieval for quarry
//!
//! Everything that sits on top of the sparse index: the dense retrieval
//! adapter, query expansion, plan selection, metrics and the
//! `HybridRetriever` orchestrator that ties them together.
//!
//! This crate provides:
//! - DenseBackend trait, DenseRetriever adapter, in-memory cosine backend
//! - Embedder trait with HashEmbedder and ApiEmbedder (feature `embed`)
//! - QueryExpander trait, BoundedExpander, ApiExpander (feature `expand`)
//! - RetrievalPlan selection with stable rollout routing
//! - MetricsSink with tracing and in-memory implementations
//! - HybridRetriever: concurrent, timeout-bounded retrieval with RRF fusion
//!
//! # Usage
//!
//! ```ignore
//! use quarry_intelligence::{DenseRetriever, HybridRetriever};
//!
//! let retriever = HybridRetriever::new(index).with_dense(DenseRetriever::new(backend));
//! let response = retriever.retrieve("carport permit", &config).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bounded;
pub mod dense;
pub mod expand;
pub mod hybrid;
pub mod llm_client;
pub mod metrics;
pub mod plan;
pub mod state;

// Re-export commonly used types
pub use dense::{
    ApiEmbedder, DenseBackend, DenseOutcome, DenseRetriever, Embedder, HashEmbedder,
    InMemoryVectorBackend, ScoredDoc,
};
pub use expand::{
    ApiExpander, BoundedExpander, ExpansionOutcome, QueryExpander, QueryVariant, StaticExpander,
    VariantKind,
};
pub use hybrid::{HybridRetriever, RetrievalResponse};
pub use metrics::{
    BranchReport, BranchStatus, ExpansionReport, InMemoryMetrics, MetricsSink, MetricsSnapshot,
    QueryKind, RetrievalSummary, TracingMetrics,
};
pub use plan::RetrievalPlan;
pub use state::RetrievalState;
