//! Invocation plan selection
//!
//! The plan is a pure function of the feature flags, the attached backends
//! and the routing key's rollout bucket. Routing hashes the key with xxh3 so
//! a given session lands in the same A/B arm on every call and every host.

use quarry_core::FeatureFlagConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use xxhash_rust::xxh3::xxh3_64;

/// Which branches a retrieval call runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalPlan {
    /// Sparse branch only
    SparseOnly,
    /// Sparse and dense for the original query
    Hybrid,
    /// Hybrid plus one branch per expanded variant and index
    HybridExpansion,
}

impl RetrievalPlan {
    /// Select the plan for one call.
    ///
    /// - `SparseOnly` when hybrid is disabled, no dense backend is attached,
    ///   or the routing key falls outside the rollout
    /// - `HybridExpansion` when expansion is enabled and an expander is attached
    /// - `Hybrid` otherwise
    pub fn select(
        config: &FeatureFlagConfig,
        routing_key: &str,
        has_dense: bool,
        has_expander: bool,
    ) -> Self {
        if !config.enable_hybrid || !has_dense || !in_rollout(routing_key, config.rollout_percentage)
        {
            return RetrievalPlan::SparseOnly;
        }
        if config.enable_query_expansion && has_expander {
            RetrievalPlan::HybridExpansion
        } else {
            RetrievalPlan::Hybrid
        }
    }

    /// Whether dense branches run
    pub fn uses_dense(&self) -> bool {
        !matches!(self, RetrievalPlan::SparseOnly)
    }

    /// Whether the expander runs
    pub fn uses_expansion(&self) -> bool {
        matches!(self, RetrievalPlan::HybridExpansion)
    }

    /// Name for logging
    pub fn name(&self) -> &'static str {
        match self {
            RetrievalPlan::SparseOnly => "sparse_only",
            RetrievalPlan::Hybrid => "hybrid",
            RetrievalPlan::HybridExpansion => "hybrid_expansion",
        }
    }
}

impl fmt::Display for RetrievalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rollout bucket of a routing key, in `0..100`
pub fn rollout_bucket(routing_key: &str) -> u8 {
    (xxh3_64(routing_key.as_bytes()) % 100) as u8
}

/// Whether a routing key is inside a rollout of `percentage`
pub fn in_rollout(routing_key: &str, percentage: u8) -> bool {
    rollout_bucket(routing_key) < percentage
}
