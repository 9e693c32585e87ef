//! BM25 scoring
//!
//! This module provides:
//! - Bm25Params: the k1/b tuning knobs
//! - ScorerContext: corpus-level statistics needed for IDF and length normalization
//! - Bm25Scorer: per-term BM25 contribution
//!
//! # BM25 Formula
//!
//! For each distinct query term t present in document d:
//! score += IDF(t) * (tf * (k1 + 1)) / (tf + k1 * (1 - b + b * dl/avgdl))
//!
//! Where:
//! - tf = term frequency in d
//! - dl = length of d in tokens
//! - avgdl = average document length
//! - IDF(t) = ln((N - df + 0.5) / (df + 0.5) + 1)

use quarry_core::FeatureFlagConfig;

// ============================================================================
// Bm25Params
// ============================================================================

/// BM25 tuning parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term frequency saturation (default 1.5)
    pub k1: f32,
    /// Length normalization strength (default 0.75)
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Bm25Params { k1: 1.5, b: 0.75 }
    }
}

impl Bm25Params {
    /// Create custom parameters
    pub fn new(k1: f32, b: f32) -> Self {
        Bm25Params { k1, b }
    }
}

impl From<&FeatureFlagConfig> for Bm25Params {
    fn from(config: &FeatureFlagConfig) -> Self {
        Bm25Params::new(config.bm25_k1, config.bm25_b)
    }
}

// ============================================================================
// ScorerContext
// ============================================================================

/// Corpus-level statistics for one index snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScorerContext {
    /// Total documents in the corpus (N)
    pub total_docs: usize,
    /// Average document length in tokens
    pub avg_doc_len: f32,
}

impl ScorerContext {
    /// Create a new context
    pub fn new(total_docs: usize, avg_doc_len: f32) -> Self {
        ScorerContext {
            total_docs,
            avg_doc_len,
        }
    }

    /// IDF with +1 smoothing inside the log, so it is always positive
    ///
    /// IDF(t) = ln((N - df + 0.5) / (df + 0.5) + 1)
    pub fn idf(&self, doc_freq: usize) -> f32 {
        let n = self.total_docs as f32;
        let df = doc_freq as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// avgdl guarded against an all-empty corpus
    fn effective_avg_len(&self) -> f32 {
        if self.avg_doc_len > 0.0 {
            self.avg_doc_len
        } else {
            1.0
        }
    }
}

// ============================================================================
// Bm25Scorer
// ============================================================================

/// Stateless BM25 term scorer
#[derive(Debug, Clone, Copy, Default)]
pub struct Bm25Scorer {
    params: Bm25Params,
}

impl Bm25Scorer {
    /// Create a scorer with the given parameters
    pub fn new(params: Bm25Params) -> Self {
        Bm25Scorer { params }
    }

    /// Parameters in use
    pub fn params(&self) -> Bm25Params {
        self.params
    }

    /// Contribution of one query term to one document's score
    ///
    /// Returns 0.0 when `tf == 0`.
    pub fn term_score(&self, tf: u32, doc_len: u32, idf: f32, ctx: &ScorerContext) -> f32 {
        if tf == 0 {
            return 0.0;
        }
        let tf = tf as f32;
        let Bm25Params { k1, b } = self.params;
        let norm = 1.0 - b + b * doc_len as f32 / ctx.effective_avg_len();
        idf * (tf * (k1 + 1.0)) / (tf + k1 * norm)
    }

    /// Name for debugging and logging
    pub fn name(&self) -> &str {
        "bm25"
    }
}
