//! Shared retrieval types
//!
//! - Source: which retrieval branch produced a hit
//! - RetrievalHit: a ranked hit from a single branch
//! - FusedResult: a hit after Reciprocal Rank Fusion

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// Source
// ============================================================================

/// Retrieval branch that produced a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Lexical BM25 search
    Sparse,
    /// Embedding similarity search
    Dense,
}

impl Source {
    /// Stable lowercase name for logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            Source::Sparse => "sparse",
            Source::Dense => "dense",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// RetrievalHit
// ============================================================================

/// A single ranked hit produced by one retrieval branch
///
/// `score` is non-negative and `rank` starts at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    /// Document identifier
    pub doc_id: String,
    /// Branch-local relevance score (higher = more relevant)
    pub score: f32,
    /// 1-indexed position within the branch's result list
    pub rank: u32,
    /// Branch that produced the hit
    pub source: Source,
}

impl RetrievalHit {
    /// Create a new hit
    pub fn new(doc_id: impl Into<String>, score: f32, rank: u32, source: Source) -> Self {
        RetrievalHit {
            doc_id: doc_id.into(),
            score,
            rank,
            source,
        }
    }
}

// ============================================================================
// FusedResult
// ============================================================================

/// A hit after rank fusion
///
/// Lists of fused results are ordered by
/// `(fused_score desc, best contributing rank asc, doc_id asc)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    /// Document identifier
    pub doc_id: String,
    /// Accumulated weighted reciprocal rank score
    pub fused_score: f32,
    /// 1-indexed position in the fused list
    pub rank: u32,
    /// Lowest rank this document held in any contributing list
    pub best_rank: u32,
    /// Branches whose lists contained this document
    pub contributing_sources: BTreeSet<Source>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_names() {
        assert_eq!(Source::Sparse.name(), "sparse");
        assert_eq!(Source::Dense.to_string(), "dense");
        assert!(Source::Sparse < Source::Dense);
    }

    #[test]
    fn test_source_serde_lowercase() {
        let json = serde_json::to_string(&Source::Dense).unwrap();
        assert_eq!(json, "\"dense\"");
        let back: Source = serde_json::from_str("\"sparse\"").unwrap();
        assert_eq!(back, Source::Sparse);
    }

    #[test]
    fn test_retrieval_hit_new() {
        let hit = RetrievalHit::new("d1", 0.5, 1, Source::Sparse);
        assert_eq!(hit.doc_id, "d1");
        assert_eq!(hit.rank, 1);
        assert_eq!(hit.source, Source::Sparse);
    }
}
