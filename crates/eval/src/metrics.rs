//! Ranking quality metrics
//!
//! All functions take the retrieval order as doc ids and the graded ground
//! truth of one case. A document is relevant when its relevance is `> 0`;
//! documents missing from the ground truth have relevance 0.
//!
//! - DCG@K  = sum over i in 1..=K of rel_i / log2(i + 1)
//! - NDCG@K = DCG@K / IDCG@K, 0 when IDCG@K is 0
//! - RR@K   = 1 / rank of the first relevant doc in the top K, else 0
//! - Recall@K = relevant docs in the top K / all relevant docs, 0 when there are none

use std::collections::BTreeMap;

/// Graded relevance judgments of one case
pub type GroundTruth = BTreeMap<String, f32>;

fn relevance(ground_truth: &GroundTruth, doc_id: &str) -> f64 {
    ground_truth.get(doc_id).copied().unwrap_or(0.0) as f64
}

fn discount(position: usize) -> f64 {
    // position is 0-based; rank i = position + 1
    ((position + 2) as f64).log2()
}

/// Discounted cumulative gain of the first `k` retrieved docs
pub fn dcg_at_k(retrieved: &[String], ground_truth: &GroundTruth, k: usize) -> f64 {
    retrieved
        .iter()
        .take(k)
        .enumerate()
        .map(|(i, id)| relevance(ground_truth, id) / discount(i))
        .sum()
}

/// DCG of the ideal ordering (ground truth sorted by relevance)
pub fn ideal_dcg_at_k(ground_truth: &GroundTruth, k: usize) -> f64 {
    let mut grades: Vec<f64> = ground_truth.values().map(|r| *r as f64).collect();
    grades.sort_by(|a, b| b.total_cmp(a));
    grades
        .into_iter()
        .take(k)
        .enumerate()
        .map(|(i, rel)| rel / discount(i))
        .sum()
}

/// Normalized DCG; 0 when no ideal gain is possible
pub fn ndcg_at_k(retrieved: &[String], ground_truth: &GroundTruth, k: usize) -> f64 {
    let ideal = ideal_dcg_at_k(ground_truth, k);
    if ideal <= 0.0 {
        return 0.0;
    }
    dcg_at_k(retrieved, ground_truth, k) / ideal
}

/// Reciprocal rank of the first relevant doc within the top `k`
pub fn reciprocal_rank(retrieved: &[String], ground_truth: &GroundTruth, k: usize) -> f64 {
    retrieved
        .iter()
        .take(k)
        .position(|id| relevance(ground_truth, id) > 0.0)
        .map(|i| 1.0 / (i + 1) as f64)
        .unwrap_or(0.0)
}

/// Share of relevant docs that appear in the top `k`
pub fn recall_at_k(retrieved: &[String], ground_truth: &GroundTruth, k: usize) -> f64 {
    let relevant = ground_truth.values().filter(|r| **r > 0.0).count();
    if relevant == 0 {
        return 0.0;
    }
    let found = retrieved
        .iter()
        .take(k)
        .filter(|id| relevance(ground_truth, id) > 0.0)
        .count();
    found as f64 / relevant as f64
}
