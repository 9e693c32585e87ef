//! Evaluation harness against a small permit corpus

use quarry_core::{BackendError, FeatureFlagConfig, QuarryError, Stage};
use quarry_eval::{load_cases, EvaluationCase, Evaluator, RolloutGate};
use quarry_intelligence::{DenseBackend, DenseRetriever, HybridRetriever, ScoredDoc};
use quarry_search::SparseIndex;
use std::io::Write;
use std::sync::Arc;

fn corpus() -> Arc<SparseIndex> {
    let index = Arc::new(SparseIndex::new());
    index
        .index_pairs(vec![
            ("d1", "building permit carport bavaria"),
            ("d2", "solar panel roof installation"),
            ("d3", "garage exemption rules for small structures"),
            ("d4", "permit fees and carport size limits"),
            ("d5", "roof tiles and gutter repair"),
        ])
        .unwrap();
    index
}

struct Fixed(Vec<ScoredDoc>);

impl DenseBackend for Fixed {
    fn search(&self, _query: &str, top_k: usize) -> Result<Vec<ScoredDoc>, BackendError> {
        Ok(self.0.iter().take(top_k).cloned().collect())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

struct Down;

impl DenseBackend for Down {
    fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<ScoredDoc>, BackendError> {
        Err(BackendError::Unavailable("connection refused".to_string()))
    }

    fn name(&self) -> &str {
        "down"
    }
}

fn with_dense(backend: impl DenseBackend + 'static) -> Evaluator {
    let retriever =
        HybridRetriever::new(corpus()).with_dense(DenseRetriever::new(Arc::new(backend)));
    Evaluator::new(retriever)
}

fn baseline() -> FeatureFlagConfig {
    FeatureFlagConfig::sparse_only(Stage::Staging).with_timeouts(2_000, 2_000)
}

fn candidate() -> FeatureFlagConfig {
    FeatureFlagConfig::hybrid(Stage::Staging).with_timeouts(2_000, 2_000)
}

fn cases() -> Vec<EvaluationCase> {
    vec![
        EvaluationCase::new("carport permit", [("d1", 1.0), ("d4", 0.5)]),
        EvaluationCase::new("garage rules", [("d3", 1.0)]),
    ]
}

#[tokio::test]
async fn sparse_baseline_is_ideal_on_lexical_cases() {
    let evaluator = Evaluator::new(HybridRetriever::new(corpus()));
    let report = evaluator.evaluate(&baseline(), &cases()).await.unwrap();

    assert_eq!(report.queries, 2);
    assert_eq!(report.degraded_queries, 0);
    assert!((report.ndcg_at_10 - 1.0).abs() < 1e-9);
    assert!((report.mrr - 1.0).abs() < 1e-9);
    assert!((report.recall_at_10 - 1.0).abs() < 1e-9);
    assert_eq!(report.per_query[1].query, "garage rules");
}

#[tokio::test]
async fn noisy_dense_branch_is_blocked_by_gate() {
    // Dense always puts d5 first, which is never relevant
    let evaluator = with_dense(Fixed(vec![ScoredDoc::new("d5", 0.9)]));
    let comparison = evaluator
        .compare(&baseline(), &candidate(), &cases())
        .await
        .unwrap();

    assert!(comparison.ndcg_delta() < -0.2);
    assert!((comparison.candidate.mrr - 0.5).abs() < 1e-9);
    // Recall is unchanged: the relevant docs are still in the top 10
    assert!(comparison.recall_delta().abs() < 1e-9);
    assert!(!RolloutGate::new(0.05).approves(&comparison));
    assert_eq!(RolloutGate::new(0.05).next_rollout(&comparison, 10, 10), 10);
}

#[tokio::test]
async fn semantic_match_improves_ndcg() {
    // "shed" shares no term with the corpus; only the dense branch finds d3
    let cases = vec![EvaluationCase::new("shed", [("d3", 1.0)])];
    let evaluator = with_dense(Fixed(vec![ScoredDoc::new("d3", 0.8)]));
    let comparison = evaluator
        .compare(&baseline(), &candidate(), &cases)
        .await
        .unwrap();

    assert_eq!(comparison.baseline.ndcg_at_10, 0.0);
    assert!((comparison.candidate.ndcg_at_10 - 1.0).abs() < 1e-9);
    assert!(comparison.ndcg_delta() > 0.9);
    assert!(RolloutGate::default().approves(&comparison));
}

#[tokio::test]
async fn partial_rollout_is_evaluated_as_full_treatment() {
    let cases = vec![EvaluationCase::new("shed", [("d3", 1.0)])];
    let evaluator = with_dense(Fixed(vec![ScoredDoc::new("d3", 0.8)]));
    let report = evaluator
        .evaluate(&candidate().with_rollout(0), &cases)
        .await
        .unwrap();
    assert!((report.ndcg_at_10 - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn degraded_candidate_scores_like_baseline() {
    let evaluator = with_dense(Down);
    let comparison = evaluator
        .compare(&baseline(), &candidate(), &cases())
        .await
        .unwrap();

    assert_eq!(comparison.candidate.degraded_queries, 2);
    assert_eq!(comparison.baseline.degraded_queries, 0);
    assert_eq!(comparison.ndcg_delta(), 0.0);
    assert_eq!(comparison.mrr_delta(), 0.0);
}

#[tokio::test]
async fn cases_without_relevant_docs_score_zero() {
    let evaluator = Evaluator::new(HybridRetriever::new(corpus()));
    let cases = vec![EvaluationCase::new("solar roof", [("d2", 0.0)])];
    let report = evaluator.evaluate(&baseline(), &cases).await.unwrap();
    assert_eq!(report.ndcg_at_10, 0.0);
    assert_eq!(report.mrr, 0.0);
    assert_eq!(report.recall_at_10, 0.0);
}

#[tokio::test]
async fn empty_case_set_reports_zeros() {
    let evaluator = Evaluator::new(HybridRetriever::new(corpus()));
    let report = evaluator.evaluate(&baseline(), &[]).await.unwrap();
    assert_eq!(report.queries, 0);
    assert_eq!(report.ndcg_at_10, 0.0);
}

#[tokio::test]
async fn unready_index_aborts_evaluation() {
    let evaluator = Evaluator::new(HybridRetriever::new(Arc::new(SparseIndex::new())));
    let err = evaluator.evaluate(&baseline(), &cases()).await.unwrap_err();
    assert!(matches!(err, QuarryError::IndexNotReady));
}

#[tokio::test]
async fn invalid_case_aborts_evaluation() {
    let evaluator = Evaluator::new(HybridRetriever::new(corpus()));
    let cases = vec![EvaluationCase::new("carport", [("d1", 2.0)])];
    let err = evaluator.evaluate(&baseline(), &cases).await.unwrap_err();
    assert!(err.is_config());
}

#[tokio::test]
async fn cases_loaded_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[{{"query": "carport permit", "ground_truth": {{"d1": 1.0, "d2": 0.0}}}}]"#
    )
    .unwrap();
    let cases = load_cases(file.path()).unwrap();

    let evaluator = Evaluator::new(HybridRetriever::new(corpus()));
    let report = evaluator.evaluate(&baseline(), &cases).await.unwrap();
    assert!((report.ndcg_at_10 - 1.0).abs() < 1e-9);
}
