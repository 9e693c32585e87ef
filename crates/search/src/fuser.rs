//! Fusion infrastructure for combining ranked lists
//!
//! This module provides:
//! - RankedList: one branch's hits plus its fusion weight
//! - Fuser trait for pluggable fusion algorithms
//! - RRFFuser: weighted Reciprocal Rank Fusion
//! - normalize_weights: rescale list weights to sum to 1
//!
//! Fusion is a pure function of completed branch output; it takes no locks
//! and tolerates any mix of empty lists.

use quarry_core::{FusedResult, RetrievalHit, Source};
use std::collections::{BTreeSet, HashMap, HashSet};

// ============================================================================
// RankedList
// ============================================================================

/// A ranked list from one retrieval branch
#[derive(Debug, Clone, PartialEq)]
pub struct RankedList {
    /// Branch that produced the list
    pub source: Source,
    /// Fusion weight (w_l)
    pub weight: f32,
    /// Hits in rank order; position in this vector is the rank
    pub hits: Vec<RetrievalHit>,
}

impl RankedList {
    /// Create a new ranked list
    pub fn new(source: Source, weight: f32, hits: Vec<RetrievalHit>) -> Self {
        RankedList {
            source,
            weight,
            hits,
        }
    }
}

/// Rescale weights so they sum to 1.
///
/// No-op when the weights sum to zero (or to something non-finite).
pub fn normalize_weights(lists: &mut [RankedList]) {
    let total: f32 = lists.iter().map(|l| l.weight).sum();
    if total > 0.0 && total.is_finite() {
        for list in lists.iter_mut() {
            list.weight /= total;
        }
    }
}

// ============================================================================
// Fuser Trait
// ============================================================================

/// Pluggable fusion interface
///
/// # Thread Safety
///
/// Fusers must be Send + Sync for concurrent search operations.
pub trait Fuser: Send + Sync {
    /// Merge ranked lists into one list truncated to `top_k` items
    fn fuse(&self, lists: &[RankedList], top_k: usize) -> Vec<FusedResult>;

    /// Name for debugging and logging
    fn name(&self) -> &str;
}

// ============================================================================
// RRFFuser
// ============================================================================

/// Weighted Reciprocal Rank Fusion (RRF)
///
/// fused_score(d) = sum over lists l containing d of w_l / (k_rrf + rank_l(d))
///
/// `rank_l(d)` is the 1-indexed position of d's first occurrence in list l;
/// later duplicates within the same list are ignored. A document missing
/// from a list simply gets nothing from it.
///
/// # Example
///
/// ```text
/// Given (weights 1.0, k_rrf = 60):
///   - List A: [doc1, doc2, doc3]
///   - List B: [doc2, doc4, doc1]
///
/// RRF scores:
///   doc1: 1/61 + 1/63 = 0.0323
///   doc2: 1/62 + 1/61 = 0.0325  <- highest
///   doc3: 1/63        = 0.0159
///   doc4: 1/62        = 0.0161
///
/// Final ranking: [doc2, doc1, doc4, doc3]
/// ```
///
/// # Ordering
///
/// 1. fused score descending
/// 2. best (lowest) rank among contributing lists ascending
/// 3. doc_id ascending
#[derive(Debug, Clone)]
pub struct RRFFuser {
    /// Smoothing constant (default 60)
    k_rrf: u32,
}

impl Default for RRFFuser {
    fn default() -> Self {
        RRFFuser { k_rrf: 60 }
    }
}

impl RRFFuser {
    /// Create a new RRFFuser with custom k value
    pub fn new(k_rrf: u32) -> Self {
        RRFFuser { k_rrf }
    }

    /// Get the k parameter
    pub fn k_rrf(&self) -> u32 {
        self.k_rrf
    }
}

/// Per-document accumulator
struct Accum {
    score: f32,
    best_rank: u32,
    sources: BTreeSet<Source>,
}

impl Fuser for RRFFuser {
    fn fuse(&self, lists: &[RankedList], top_k: usize) -> Vec<FusedResult> {
        if top_k == 0 {
            return Vec::new();
        }

        let mut accums: HashMap<&str, Accum> = HashMap::new();

        for list in lists {
            let mut seen: HashSet<&str> = HashSet::new();
            for (i, hit) in list.hits.iter().enumerate() {
                if !seen.insert(hit.doc_id.as_str()) {
                    continue;
                }
                let rank = (i + 1) as u32;
                let contribution = list.weight / (self.k_rrf as f32 + rank as f32);
                let entry = accums.entry(hit.doc_id.as_str()).or_insert(Accum {
                    score: 0.0,
                    best_rank: u32::MAX,
                    sources: BTreeSet::new(),
                });
                entry.score += contribution;
                entry.best_rank = entry.best_rank.min(rank);
                entry.sources.insert(list.source);
            }
        }

        let mut scored: Vec<(&str, Accum)> = accums.into_iter().collect();
        scored.sort_by(|a, b| {
            b.1.score
                .total_cmp(&a.1.score)
                .then_with(|| a.1.best_rank.cmp(&b.1.best_rank))
                .then_with(|| a.0.cmp(b.0))
        });

        scored
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(i, (doc_id, accum))| FusedResult {
                doc_id: doc_id.to_string(),
                fused_score: accum.score,
                rank: (i + 1) as u32,
                best_rank: accum.best_rank,
                contributing_sources: accum.sources,
            })
            .collect()
    }

    fn name(&self) -> &str {
        "rrf"
    }
}

/// Convenience wrapper: weighted RRF with the given constant
pub fn rrf_fuse(lists: &[RankedList], rrf_k: u32, top_k: usize) -> Vec<FusedResult> {
    RRFFuser::new(rrf_k).fuse(lists, top_k)
}

// ============================================================================
// Tests
// ============================================================================
