//! Query expansion
//!
//! This module provides the `QueryExpander` trait and types for expanding
//! a natural language query into typed search variants (lex/vec/hyde).
//! The orchestrator searches each variant alongside the original query and
//! fuses everything with weighted RRF.
//!
//! # Variant Kinds
//!
//! | Kind | Purpose | Searched by |
//! |------|---------|-------------|
//! | `Lex` | Keyword reformulations | sparse only |
//! | `Vec` | Semantic rephrasings | sparse + dense |
//! | `Hyde` | Hypothetical document text | dense only |

pub mod api;
pub mod fixed;
pub mod parser;
pub mod prompt;

pub use api::ApiExpander;
pub use fixed::StaticExpander;

use crate::bounded::run_bounded;
use quarry_core::BackendError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Kind of expanded query; decides which branches search it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantKind {
    /// Keyword reformulation
    Lex,
    /// Semantic rephrasing
    Vec,
    /// Hypothetical document text (HyDE)
    Hyde,
}

impl VariantKind {
    /// Whether the sparse index searches this kind
    pub fn searches_sparse(&self) -> bool {
        matches!(self, VariantKind::Lex | VariantKind::Vec)
    }

    /// Whether the dense backend searches this kind
    pub fn searches_dense(&self) -> bool {
        matches!(self, VariantKind::Vec | VariantKind::Hyde)
    }

    /// Line prefix used in model output
    pub fn prefix(&self) -> &'static str {
        match self {
            VariantKind::Lex => "lex",
            VariantKind::Vec => "vec",
            VariantKind::Hyde => "hyde",
        }
    }
}

/// A single expanded query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryVariant {
    /// How this variant is searched
    pub kind: VariantKind,
    /// Variant text
    pub text: String,
}

impl QueryVariant {
    /// Create a variant
    pub fn new(kind: VariantKind, text: impl Into<String>) -> Self {
        QueryVariant {
            kind,
            text: text.into(),
        }
    }
}

/// Trait for query expansion implementations.
///
/// The trait is object-safe for use as `Arc<dyn QueryExpander>`.
///
/// # Implementations
///
/// - `ApiExpander`: calls an OpenAI-compatible endpoint
/// - `StaticExpander`: returns a fixed list
pub trait QueryExpander: Send + Sync {
    /// Expand a query into at most `max_variants` typed variants
    fn expand(&self, query: &str, max_variants: usize)
        -> Result<Vec<QueryVariant>, BackendError>;
}

// ============================================================================
// BoundedExpander
// ============================================================================

/// Result of a bounded expansion
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExpansionOutcome {
    /// Cleaned variants (empty on failure)
    pub variants: Vec<QueryVariant>,
    /// Set when the expander failed or timed out
    pub error: Option<BackendError>,
}

/// Timeout-bounded wrapper around a [`QueryExpander`]
///
/// Whatever the inner expander returns is cleaned with
/// [`parser::sanitize_variants`]. Failure or timeout yields no variants and
/// never blocks the pipeline past its budget.
#[derive(Clone)]
pub struct BoundedExpander {
    inner: Arc<dyn QueryExpander>,
}

impl std::fmt::Debug for BoundedExpander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedExpander").finish_non_exhaustive()
    }
}

impl BoundedExpander {
    /// Wrap an expander
    pub fn new(inner: Arc<dyn QueryExpander>) -> Self {
        BoundedExpander { inner }
    }

    /// Expand under `budget`; never fails.
    pub async fn expand(&self, query: &str, max_variants: usize, budget: Duration) -> ExpansionOutcome {
        if max_variants == 0 {
            return ExpansionOutcome::default();
        }

        let inner = Arc::clone(&self.inner);
        let text = query.to_string();
        let result = run_bounded(budget, move || inner.expand(&text, max_variants)).await;

        match result {
            Ok(raw) => {
                let variants = parser::sanitize_variants(query, raw, max_variants);
                debug!(
                    target: "quarry::expand",
                    variants = variants.len(),
                    "Query expanded"
                );
                ExpansionOutcome {
                    variants,
                    error: None,
                }
            }
            Err(e) => {
                warn!(
                    target: "quarry::expand",
                    error = %e,
                    "Query expansion skipped"
                );
                ExpansionOutcome {
                    variants: Vec::new(),
                    error: Some(e),
                }
            }
        }
    }
}
