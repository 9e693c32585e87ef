//! Graceful degradation tests
//!
//! A failed or timed-out optional branch must never fail the call. The
//! response is flagged `degraded` and, when only the dense branch is lost,
//! matches the sparse-only answer exactly.

mod common;

use common::*;
use quarry_core::{FeatureFlagConfig, Source, Stage};
use quarry_intelligence::{
    BoundedExpander, BranchStatus, DenseRetriever, HybridRetriever, InMemoryMetrics,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

fn hybrid_config() -> FeatureFlagConfig {
    // Generous sparse budget so only the dense branch can miss
    FeatureFlagConfig::hybrid(Stage::Development).with_timeouts(2_000, 30)
}

// ============================================================================
// Dense branch failures
// ============================================================================

#[tokio::test]
async fn test_dense_timeout_equals_sparse_only() {
    init_tracing();
    let index = permit_corpus();

    let baseline = HybridRetriever::new(Arc::clone(&index))
        .retrieve("carport permit", &sparse_only(Stage::Development))
        .await
        .unwrap();

    let retriever = HybridRetriever::new(index).with_dense(DenseRetriever::new(Arc::new(
        SlowBackend {
            delay: Duration::from_millis(500),
        },
    )));
    let degraded = retriever
        .retrieve("carport permit", &hybrid_config())
        .await
        .unwrap();

    assert!(degraded.degraded);
    assert!(!baseline.degraded);
    assert_eq!(degraded.hits, baseline.hits);
    assert_eq!(degraded.sources_used, BTreeSet::from([Source::Sparse]));

    let dense = degraded
        .branches
        .iter()
        .find(|b| b.label == "dense:original")
        .unwrap();
    assert_eq!(dense.status, BranchStatus::TimedOut);
    assert_eq!(dense.hit_count, 0);
}

#[tokio::test]
async fn test_dense_timeout_bounds_latency() {
    let retriever = HybridRetriever::new(permit_corpus()).with_dense(DenseRetriever::new(
        Arc::new(SlowBackend {
            delay: Duration::from_millis(600),
        }),
    ));
    let response = retriever
        .retrieve("carport permit", &hybrid_config())
        .await
        .unwrap();

    // Returned long before the slow backend would have answered
    assert!(response.latency_ms < 500, "latency {}ms", response.latency_ms);
    assert!(response.degraded);
}

#[tokio::test]
async fn test_dense_unavailable_degrades() {
    let retriever =
        HybridRetriever::new(permit_corpus()).with_dense(DenseRetriever::new(Arc::new(DownBackend)));
    let response = retriever
        .retrieve("carport permit", &hybrid_config())
        .await
        .unwrap();

    assert!(response.degraded);
    assert_eq!(ids(&response)[0], "d1");
    let dense = &response.branches[1];
    assert!(matches!(dense.status, BranchStatus::Failed(_)));
}

#[tokio::test]
async fn test_healthy_hybrid_not_degraded() {
    let backend = FixedBackend::new(&[("d4", 0.9), ("d1", 0.8)]);
    let retriever = HybridRetriever::new(permit_corpus()).with_dense(DenseRetriever::new(backend));
    let response = retriever
        .retrieve("carport permit", &hybrid_config())
        .await
        .unwrap();

    assert!(!response.degraded);
    assert_eq!(
        response.sources_used,
        BTreeSet::from([Source::Sparse, Source::Dense])
    );
    assert!(response.branches.iter().all(|b| b.status.is_completed()));
}

#[tokio::test]
async fn test_sparse_timeout_degrades_without_failing() {
    let backend = FixedBackend::new(&[("d2", 0.9)]);
    let retriever = HybridRetriever::new(permit_corpus()).with_dense(DenseRetriever::new(backend));

    // Make the sparse budget impossible to meet while dense has room
    let config = FeatureFlagConfig::hybrid(Stage::Development).with_timeouts(1, 2_000);

    let response = retriever.retrieve("carport permit", &config).await.unwrap();
    // Whether or not the sparse task beat 1ms, the call succeeds
    if response.degraded {
        assert_eq!(response.sources_used, BTreeSet::from([Source::Dense]));
        assert_eq!(ids(&response), vec!["d2"]);
    }
}

// ============================================================================
// Expansion failures
// ============================================================================

#[tokio::test]
async fn test_expansion_timeout_falls_back_to_hybrid() {
    let backend = FixedBackend::new(&[("d4", 0.9)]);
    let plain = HybridRetriever::new(permit_corpus())
        .with_dense(DenseRetriever::new(backend.clone()))
        .retrieve("carport permit", &hybrid_config())
        .await
        .unwrap();

    let mut config = hybrid_config().with_query_expansion();
    config.expansion_timeout_ms = 20;
    let retriever = HybridRetriever::new(permit_corpus())
        .with_dense(DenseRetriever::new(backend))
        .with_expander(BoundedExpander::new(Arc::new(SlowExpander {
            delay: Duration::from_millis(400),
        })));
    let response = retriever.retrieve("carport permit", &config).await.unwrap();

    assert!(response.degraded);
    let expansion = response.expansion.as_ref().unwrap();
    assert_eq!(expansion.status, BranchStatus::TimedOut);
    assert_eq!(expansion.variant_count, 0);
    // Only the original-query branches ran
    assert_eq!(response.branches.len(), 2);
    assert_eq!(response.hits, plain.hits);
}

#[tokio::test]
async fn test_expansion_failure_counts_in_metrics() {
    let metrics = Arc::new(InMemoryMetrics::new());
    let retriever = HybridRetriever::new(permit_corpus())
        .with_dense(DenseRetriever::new(Arc::new(DownBackend)))
        .with_expander(BoundedExpander::new(Arc::new(DownExpander)))
        .with_metrics(metrics.clone());

    let config = hybrid_config().with_query_expansion();
    let response = retriever.retrieve("carport permit", &config).await.unwrap();
    assert!(response.degraded);
    assert!(!response.hits.is_empty());

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.requests, 1);
    assert_eq!(snapshot.degraded_responses, 1);
    assert_eq!(snapshot.branch_failures, 1);
    assert_eq!(snapshot.expansion_failures, 1);
    assert_eq!(metrics.recent_branches().len(), 2);
}

// ============================================================================
// Call deadline
// ============================================================================

#[tokio::test]
async fn test_call_deadline_caps_slow_expander_and_dense() {
    init_tracing();
    let config = FeatureFlagConfig::hybrid(Stage::Development)
        .with_query_expansion()
        .with_timeouts(100, 2_000)
        .with_deadline(300);
    let retriever = HybridRetriever::new(permit_corpus())
        .with_dense(DenseRetriever::new(Arc::new(SlowBackend {
            delay: Duration::from_secs(2),
        })))
        .with_expander(BoundedExpander::new(Arc::new(SlowExpander {
            delay: Duration::from_secs(2),
        })));

    let response = retriever.retrieve("carport permit", &config).await.unwrap();

    // Expansion budget + dense budget would be 2.2s; one deadline covers both
    assert!(
        response.latency_ms <= 350,
        "latency {}ms exceeds the 300ms deadline",
        response.latency_ms
    );
    assert!(response.degraded);
    assert_eq!(
        response.expansion.as_ref().unwrap().status,
        BranchStatus::TimedOut
    );
    let dense = response
        .branches
        .iter()
        .find(|b| b.label == "dense:original")
        .unwrap();
    assert_eq!(dense.status, BranchStatus::TimedOut);
    assert_eq!(response.hits[0].doc_id, "d1");
    assert_eq!(response.sources_used, BTreeSet::from([Source::Sparse]));
}

#[tokio::test]
async fn test_deadline_leaves_sparse_budget_when_expansion_has_none() {
    // deadline == sparse budget: expansion gets nothing, sparse keeps its time
    let config = FeatureFlagConfig::hybrid(Stage::Development)
        .with_query_expansion()
        .with_timeouts(1_000, 1_000)
        .with_deadline(1_000);
    let retriever = HybridRetriever::new(permit_corpus())
        .with_dense(DenseRetriever::new(FixedBackend::new(&[("d4", 0.9)])))
        .with_expander(BoundedExpander::new(Arc::new(SlowExpander {
            delay: Duration::from_millis(200),
        })));

    let response = retriever.retrieve("carport permit", &config).await.unwrap();

    assert!(response.degraded);
    assert_eq!(
        response.expansion.as_ref().unwrap().status,
        BranchStatus::TimedOut
    );
    assert!(response.branches.iter().all(|b| b.status.is_completed()));
    assert!(response.doc_ids().contains(&"d1".to_string()));
}
