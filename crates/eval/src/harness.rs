//! Offline evaluation harness
//!
//! Runs labeled cases through a [`HybridRetriever`] under a given
//! configuration and aggregates NDCG@10, MRR and Recall@10. Two
//! configurations can be compared on the same cases, and a
//! [`RolloutGate`] decides whether the candidate may take more traffic.
//!
//! The configuration under test is always evaluated at full rollout so a
//! partially rolled-out hybrid config is measured as hybrid on every case.

use crate::case::EvaluationCase;
use crate::metrics::{ndcg_at_k, recall_at_k, reciprocal_rank};
use quarry_core::{FeatureFlagConfig, Result};
use quarry_intelligence::HybridRetriever;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Cutoff for NDCG and recall
pub const EVAL_CUTOFF: usize = 10;

// ============================================================================
// Reports
// ============================================================================

/// Scores of a single case
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryEvaluation {
    /// Case query
    pub query: String,
    /// NDCG@10 of the fused ranking
    pub ndcg_at_10: f64,
    /// Reciprocal rank within the configured top_k
    pub reciprocal_rank: f64,
    /// Recall@10
    pub recall_at_10: f64,
    /// Retrieval reported degradation
    pub degraded: bool,
    /// Retrieval wall time
    pub latency_ms: u64,
}

/// Aggregate scores over a case set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    /// Mean NDCG@10
    pub ndcg_at_10: f64,
    /// Mean reciprocal rank within the configured top_k
    pub mrr: f64,
    /// Mean Recall@10
    pub recall_at_10: f64,
    /// Number of cases evaluated
    pub queries: usize,
    /// Cases answered by a degraded retrieval
    pub degraded_queries: usize,
    /// Per-case scores in case order
    pub per_query: Vec<QueryEvaluation>,
}

impl EvaluationReport {
    fn from_queries(per_query: Vec<QueryEvaluation>) -> Self {
        let queries = per_query.len();
        let mean = |f: fn(&QueryEvaluation) -> f64| {
            if queries == 0 {
                0.0
            } else {
                per_query.iter().map(f).sum::<f64>() / queries as f64
            }
        };
        EvaluationReport {
            ndcg_at_10: mean(|q| q.ndcg_at_10),
            mrr: mean(|q| q.reciprocal_rank),
            recall_at_10: mean(|q| q.recall_at_10),
            queries,
            degraded_queries: per_query.iter().filter(|q| q.degraded).count(),
            per_query,
        }
    }
}

/// Baseline vs candidate on the same cases
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    /// Report for the current configuration
    pub baseline: EvaluationReport,
    /// Report for the proposed configuration
    pub candidate: EvaluationReport,
}

impl Comparison {
    /// candidate - baseline
    pub fn ndcg_delta(&self) -> f64 {
        self.candidate.ndcg_at_10 - self.baseline.ndcg_at_10
    }

    /// candidate - baseline
    pub fn mrr_delta(&self) -> f64 {
        self.candidate.mrr - self.baseline.mrr
    }

    /// candidate - baseline
    pub fn recall_delta(&self) -> f64 {
        self.candidate.recall_at_10 - self.baseline.recall_at_10
    }
}

// ============================================================================
// Evaluator
// ============================================================================

/// Runs cases through a retriever
#[derive(Debug, Clone)]
pub struct Evaluator {
    retriever: HybridRetriever,
}

impl Evaluator {
    /// Evaluate with the given retriever and its backends
    pub fn new(retriever: HybridRetriever) -> Self {
        Evaluator { retriever }
    }

    /// Evaluate `config` on every case
    ///
    /// # Errors
    ///
    /// Fatal retrieval errors (invalid config, index not ready) abort the
    /// run. Degraded responses are scored as they are and counted.
    pub async fn evaluate(
        &self,
        config: &FeatureFlagConfig,
        cases: &[EvaluationCase],
    ) -> Result<EvaluationReport> {
        let config = config.clone().with_rollout(100);
        let start = Instant::now();
        let mut per_query = Vec::with_capacity(cases.len());

        for case in cases {
            case.validate()?;
            let response = self.retriever.retrieve(&case.query, &config).await?;
            let ids = response.doc_ids();
            let scored = QueryEvaluation {
                query: case.query.clone(),
                ndcg_at_10: ndcg_at_k(&ids, &case.ground_truth, EVAL_CUTOFF),
                reciprocal_rank: reciprocal_rank(&ids, &case.ground_truth, config.top_k),
                recall_at_10: recall_at_k(&ids, &case.ground_truth, EVAL_CUTOFF),
                degraded: response.degraded,
                latency_ms: response.latency_ms,
            };
            debug!(
                target: "quarry::eval",
                query = %scored.query,
                ndcg = scored.ndcg_at_10,
                rr = scored.reciprocal_rank,
                degraded = scored.degraded,
                "Case evaluated"
            );
            per_query.push(scored);
        }

        let report = EvaluationReport::from_queries(per_query);
        info!(
            target: "quarry::eval",
            stage = %config.stage,
            hybrid = config.enable_hybrid,
            expansion = config.enable_query_expansion,
            queries = report.queries,
            ndcg_at_10 = report.ndcg_at_10,
            mrr = report.mrr,
            recall_at_10 = report.recall_at_10,
            degraded = report.degraded_queries,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Evaluation complete"
        );
        Ok(report)
    }

    /// Evaluate two configurations on the same cases
    pub async fn compare(
        &self,
        baseline: &FeatureFlagConfig,
        candidate: &FeatureFlagConfig,
        cases: &[EvaluationCase],
    ) -> Result<Comparison> {
        let baseline = self.evaluate(baseline, cases).await?;
        let candidate = self.evaluate(candidate, cases).await?;
        Ok(Comparison {
            baseline,
            candidate,
        })
    }
}

// ============================================================================
// RolloutGate
// ============================================================================

/// Blocks a rollout increase when NDCG@10 regresses too far
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RolloutGate {
    /// Largest tolerated drop in NDCG@10
    pub max_ndcg_regression: f64,
}

impl Default for RolloutGate {
    fn default() -> Self {
        RolloutGate {
            max_ndcg_regression: 0.0,
        }
    }
}

impl RolloutGate {
    /// Gate with the given tolerance; negative values are treated as 0
    pub fn new(max_ndcg_regression: f64) -> Self {
        RolloutGate {
            max_ndcg_regression: max_ndcg_regression.max(0.0),
        }
    }

    /// True when candidate NDCG@10 >= baseline NDCG@10 - max regression
    pub fn approves(&self, comparison: &Comparison) -> bool {
        let floor = comparison.baseline.ndcg_at_10 - self.max_ndcg_regression;
        let approved = comparison.candidate.ndcg_at_10 >= floor;
        if !approved {
            warn!(
                target: "quarry::eval",
                baseline = comparison.baseline.ndcg_at_10,
                candidate = comparison.candidate.ndcg_at_10,
                max_regression = self.max_ndcg_regression,
                "Rollout blocked by NDCG regression"
            );
        }
        approved
    }

    /// Next rollout percentage: `current + step` (capped at 100) when
    /// approved, otherwise `current`
    pub fn next_rollout(&self, comparison: &Comparison, current: u8, step: u8) -> u8 {
        if self.approves(comparison) {
            current.saturating_add(step).min(100)
        } else {
            current
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(ndcg: f64) -> EvaluationReport {
        EvaluationReport {
            ndcg_at_10: ndcg,
            mrr: 0.0,
            recall_at_10: 0.0,
            queries: 1,
            degraded_queries: 0,
            per_query: Vec::new(),
        }
    }

    fn comparison(baseline: f64, candidate: f64) -> Comparison {
        Comparison {
            baseline: report(baseline),
            candidate: report(candidate),
        }
    }

    #[test]
    fn test_empty_report_is_zero() {
        let report = EvaluationReport::from_queries(Vec::new());
        assert_eq!(report.queries, 0);
        assert_eq!(report.ndcg_at_10, 0.0);
        assert_eq!(report.mrr, 0.0);
        assert_eq!(report.recall_at_10, 0.0);
    }

    #[test]
    fn test_report_means() {
        let q = |ndcg: f64, degraded: bool| QueryEvaluation {
            query: "q".into(),
            ndcg_at_10: ndcg,
            reciprocal_rank: ndcg,
            recall_at_10: 1.0,
            degraded,
            latency_ms: 0,
        };
        let report = EvaluationReport::from_queries(vec![q(1.0, false), q(0.5, true)]);
        assert_eq!(report.ndcg_at_10, 0.75);
        assert_eq!(report.mrr, 0.75);
        assert_eq!(report.recall_at_10, 1.0);
        assert_eq!(report.degraded_queries, 1);
    }

    #[test]
    fn test_deltas() {
        let c = comparison(0.5, 0.75);
        assert_eq!(c.ndcg_delta(), 0.25);
        assert_eq!(c.mrr_delta(), 0.0);
    }

    #[test]
    fn test_gate_thresholds() {
        let gate = RolloutGate::new(0.05);
        assert!(gate.approves(&comparison(0.80, 0.80)));
        assert!(gate.approves(&comparison(0.80, 0.76)));
        assert!(!gate.approves(&comparison(0.80, 0.70)));
        assert!(RolloutGate::default().approves(&comparison(0.5, 0.5)));
        assert!(!RolloutGate::default().approves(&comparison(0.5, 0.49)));
    }

    #[test]
    fn test_negative_tolerance_clamped() {
        assert_eq!(RolloutGate::new(-1.0).max_ndcg_regression, 0.0);
    }

    #[test]
    fn test_next_rollout() {
        let gate = RolloutGate::new(0.0);
        assert_eq!(gate.next_rollout(&comparison(0.5, 0.6), 10, 20), 30);
        assert_eq!(gate.next_rollout(&comparison(0.5, 0.6), 90, 20), 100);
        assert_eq!(gate.next_rollout(&comparison(0.5, 0.4), 10, 20), 10);
    }
}
