//! Hybrid retrieval orchestrator
//!
//! `HybridRetriever` is the single entry point. One call walks the state
//! machine in [`crate::state`]:
//!
//! ```text
//!   query + FeatureFlagConfig
//!        │
//!        ▼
//!  ┌──────────────────────────────────────────────┐
//!  │ INIT: validate config, take sparse snapshot  │──► FAILED (typed error)
//!  └──────────────────────┬───────────────────────┘
//!                         ▼
//!  ┌──────────────────────────────────────────────┐
//!  │ EXPANDING (hybrid+expansion plan only)       │  bounded by expansion_budget_ms
//!  └──────────────────────┬───────────────────────┘
//!                         ▼
//!  ┌──────────────────────────────────────────────┐
//!  │ RETRIEVING: one task per (query, index)      │  each bounded by its own budget
//!  │   sparse:original  dense:original  ...       │
//!  └──────────────────────┬───────────────────────┘
//!                         ▼  fan-in barrier
//!  ┌──────────────────────────────────────────────┐
//!  │ FUSING: weighted RRF over completed branches │
//!  └──────────────────────┬───────────────────────┘
//!                         ▼
//!                 RetrievalResponse (DONE)
//! ```
//!
//! The whole call runs under one deadline
//! (`FeatureFlagConfig::retrieval_deadline_ms`). Expansion and every branch
//! budget are clamped to what is left of it, and the fan-in barrier gives up
//! at the deadline: branches still pending are reported `TimedOut` and fusion
//! proceeds with whatever completed.
//!
//! The retriever is stateless across calls; it holds only `Arc`s to the
//! index, the backends and the metrics sink.

use crate::bounded::{run_bounded, CallDeadline};
use crate::dense::DenseRetriever;
use crate::expand::{BoundedExpander, QueryVariant};
use crate::metrics::{
    BranchReport, BranchStatus, ExpansionReport, MetricsSink, QueryKind, RetrievalSummary,
    TracingMetrics,
};
use crate::plan::RetrievalPlan;
use crate::state::{RetrievalState, StateTrace};
use quarry_core::{BackendError, FeatureFlagConfig, FusedResult, Result, RetrievalHit, Source};
use quarry_search::tokenizer::tokenize;
use quarry_search::{normalize_weights, rrf_fuse, Bm25Index, Bm25Params, RankedList, SparseIndex};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

// ============================================================================
// Response
// ============================================================================

/// Output of one retrieval call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResponse {
    /// Fused hits, best first, at most `top_k`
    pub hits: Vec<FusedResult>,
    /// True when any branch or the expander failed or timed out
    pub degraded: bool,
    /// Sources with at least one completed branch
    pub sources_used: BTreeSet<Source>,
    /// End-to-end wall time
    pub latency_ms: u64,
    /// Plan that ran
    pub plan: RetrievalPlan,
    /// One report per dispatched branch, in dispatch order
    pub branches: Vec<BranchReport>,
    /// Expansion step, when the plan ran it
    pub expansion: Option<ExpansionReport>,
    /// States visited, starting with `Init`
    pub states: Vec<RetrievalState>,
}

impl RetrievalResponse {
    /// Doc ids in rank order
    pub fn doc_ids(&self) -> Vec<String> {
        self.hits.iter().map(|h| h.doc_id.clone()).collect()
    }
}

// ============================================================================
// Branches
// ============================================================================

/// One unit of fan-out work
#[derive(Debug, Clone)]
struct BranchSpec {
    source: Source,
    query_kind: QueryKind,
    text: String,
    label: String,
    weight: f32,
}

/// Build the branch list for a plan.
///
/// Raw weight = source weight x query weight, where the original query uses
/// `original_query_weight` and variants use 1.0.
fn plan_branches(
    plan: RetrievalPlan,
    query: &str,
    variants: &[QueryVariant],
    config: &FeatureFlagConfig,
) -> Vec<BranchSpec> {
    let mut branches = vec![BranchSpec {
        source: Source::Sparse,
        query_kind: QueryKind::Original,
        text: query.to_string(),
        label: "sparse:original".to_string(),
        weight: config.sparse_weight * config.original_query_weight,
    }];

    if !plan.uses_dense() {
        return branches;
    }

    branches.push(BranchSpec {
        source: Source::Dense,
        query_kind: QueryKind::Original,
        text: query.to_string(),
        label: "dense:original".to_string(),
        weight: config.dense_weight * config.original_query_weight,
    });

    for (i, variant) in variants.iter().enumerate() {
        let kind = QueryKind::Variant(variant.kind);
        let tag = format!("{}#{}", variant.kind.prefix(), i + 1);
        if variant.kind.searches_sparse() {
            branches.push(BranchSpec {
                source: Source::Sparse,
                query_kind: kind,
                text: variant.text.clone(),
                label: format!("sparse:{}", tag),
                weight: config.sparse_weight,
            });
        }
        if variant.kind.searches_dense() {
            branches.push(BranchSpec {
                source: Source::Dense,
                query_kind: kind,
                text: variant.text.clone(),
                label: format!("dense:{}", tag),
                weight: config.dense_weight,
            });
        }
    }

    branches
}

// ============================================================================
// HybridRetriever
// ============================================================================

/// Hybrid retrieval orchestrator
///
/// # Example
///
/// ```
/// use quarry_core::{FeatureFlagConfig, Stage};
/// use quarry_intelligence::HybridRetriever;
/// use quarry_search::SparseIndex;
/// use std::sync::Arc;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let index = Arc::new(SparseIndex::new());
/// index.index_pairs(vec![
///     ("d1", "building permit carport bavaria"),
///     ("d2", "solar panel roof installation"),
/// ])?;
///
/// let retriever = HybridRetriever::new(index);
/// let config = FeatureFlagConfig::sparse_only(Stage::Development);
/// let response = retriever.retrieve("carport permit", &config).await?;
/// assert_eq!(response.hits[0].doc_id, "d1");
/// assert!(!response.degraded);
/// # Ok::<(), quarry_core::QuarryError>(())
/// # }).unwrap();
/// ```
#[derive(Clone)]
pub struct HybridRetriever {
    sparse: Arc<SparseIndex>,
    dense: Option<DenseRetriever>,
    expander: Option<BoundedExpander>,
    metrics: Arc<dyn MetricsSink>,
}

impl std::fmt::Debug for HybridRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridRetriever")
            .field("sparse_version", &self.sparse.version())
            .field("dense", &self.dense)
            .field("expander", &self.expander.is_some())
            .finish()
    }
}

impl HybridRetriever {
    /// Create a retriever over a sparse index, with tracing metrics
    pub fn new(sparse: Arc<SparseIndex>) -> Self {
        HybridRetriever {
            sparse,
            dense: None,
            expander: None,
            metrics: Arc::new(TracingMetrics),
        }
    }

    /// Builder: attach a dense retriever
    pub fn with_dense(mut self, dense: DenseRetriever) -> Self {
        self.dense = Some(dense);
        self
    }

    /// Builder: attach a query expander
    pub fn with_expander(mut self, expander: BoundedExpander) -> Self {
        self.expander = Some(expander);
        self
    }

    /// Builder: set the metrics sink
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// The sparse index this retriever reads
    pub fn sparse_index(&self) -> &Arc<SparseIndex> {
        &self.sparse
    }

    // ========================================================================
    // Retrieval
    // ========================================================================

    /// Retrieve for `query`, routing A/B traffic by the query text
    pub async fn retrieve(&self, query: &str, config: &FeatureFlagConfig) -> Result<RetrievalResponse> {
        self.retrieve_routed(query, config, query).await
    }

    /// Retrieve for `query`, routing A/B traffic by `routing_key`
    ///
    /// # Errors
    ///
    /// - `QuarryError::Config` when `config` fails validation
    /// - `QuarryError::IndexNotReady` before the sparse index is built
    ///
    /// Backend failures never surface here; they set `degraded` instead.
    pub async fn retrieve_routed(
        &self,
        query: &str,
        config: &FeatureFlagConfig,
        routing_key: &str,
    ) -> Result<RetrievalResponse> {
        let start = Instant::now();
        let mut trace = StateTrace::new();

        let snapshot = match self.prepare(config) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                trace.advance(RetrievalState::Failed);
                warn!(target: "quarry::hybrid", error = %e, "Retrieval failed");
                return Err(e);
            }
        };

        let deadline = CallDeadline::new(
            start,
            Duration::from_millis(config.retrieval_deadline_ms()),
        );

        let plan = RetrievalPlan::select(
            config,
            routing_key,
            self.dense.is_some(),
            self.expander.is_some(),
        );

        if query.trim().is_empty() {
            trace.advance(RetrievalState::Done);
            return Ok(RetrievalResponse {
                hits: Vec::new(),
                degraded: false,
                sources_used: BTreeSet::new(),
                latency_ms: start.elapsed().as_millis() as u64,
                plan,
                branches: Vec::new(),
                expansion: None,
                states: trace.into_states(),
            });
        }

        // EXPANDING
        let mut variants = Vec::new();
        let mut expansion = None;
        if plan.uses_expansion() {
            if let Some(expander) = &self.expander {
                trace.advance(RetrievalState::Expanding);
                let began = Instant::now();
                let outcome = expander
                    .expand(
                        query,
                        config.max_expansion_variants,
                        deadline.clamp(Duration::from_millis(config.expansion_budget_ms())),
                    )
                    .await;
                let status = match &outcome.error {
                    None => BranchStatus::Completed,
                    Some(e) if e.is_timeout() => BranchStatus::TimedOut,
                    Some(e) => BranchStatus::Failed(e.to_string()),
                };
                let report = ExpansionReport {
                    latency_ms: began.elapsed().as_millis() as u64,
                    variant_count: outcome.variants.len(),
                    status,
                };
                self.metrics.record_expansion(&report);
                expansion = Some(report);
                variants = outcome.variants;
            }
        }

        // RETRIEVING
        trace.advance(RetrievalState::Retrieving);
        let specs = plan_branches(plan, query, &variants, config);
        let results = self.fan_out(&specs, &snapshot, config, &deadline).await;

        // FUSING
        trace.advance(RetrievalState::Fusing);
        let mut lists = Vec::new();
        let mut branches = Vec::with_capacity(specs.len());
        let mut sources_used = BTreeSet::new();

        for (spec, (result, latency)) in specs.into_iter().zip(results) {
            let status = BranchStatus::from_result(&result);
            let hits = result.unwrap_or_default();
            let report = BranchReport {
                label: spec.label,
                source: spec.source,
                query_kind: spec.query_kind,
                latency_ms: latency.as_millis() as u64,
                hit_count: hits.len(),
                status,
            };
            self.metrics.record_branch(&report);

            if report.status.is_completed() {
                sources_used.insert(spec.source);
                lists.push(RankedList::new(spec.source, spec.weight, hits));
            }
            branches.push(report);
        }

        normalize_weights(&mut lists);
        let hits = rrf_fuse(&lists, config.rrf_k, config.top_k);

        let failed_branches = branches.iter().filter(|b| !b.status.is_completed()).count();
        let expansion_failed = expansion
            .as_ref()
            .is_some_and(|e| !e.status.is_completed());
        let degraded = failed_branches > 0 || expansion_failed;

        trace.advance(RetrievalState::Done);
        let latency_ms = start.elapsed().as_millis() as u64;

        self.metrics.record_retrieval(&RetrievalSummary {
            plan,
            degraded,
            latency_ms,
            hit_count: hits.len(),
            branch_count: branches.len(),
            failed_branches,
            sources_used: sources_used.clone(),
        });

        debug!(
            target: "quarry::hybrid",
            plan = %plan,
            branches = branches.len(),
            hits = hits.len(),
            degraded,
            latency_ms,
            "Retrieval done"
        );

        Ok(RetrievalResponse {
            hits,
            degraded,
            sources_used,
            latency_ms,
            plan,
            branches,
            expansion,
            states: trace.into_states(),
        })
    }

    /// Validate the config and pin the sparse snapshot for this call
    fn prepare(&self, config: &FeatureFlagConfig) -> Result<Arc<Bm25Index>> {
        config.validate()?;
        self.sparse.snapshot()
    }

    /// Run every branch concurrently and wait for all of them.
    ///
    /// Each branch is its own task bounded by its own budget, clamped to the
    /// call deadline. The barrier itself also stops at the deadline; a task
    /// still pending then is aborted and reported as timed out. Results come
    /// back in `specs` order.
    async fn fan_out(
        &self,
        specs: &[BranchSpec],
        snapshot: &Arc<Bm25Index>,
        config: &FeatureFlagConfig,
        deadline: &CallDeadline,
    ) -> Vec<(std::result::Result<Vec<RetrievalHit>, BackendError>, Duration)> {
        let depth = config.top_k;
        let params = Bm25Params::from(config);
        let sparse_budget = deadline.clamp(Duration::from_millis(config.sparse_timeout_ms));
        let dense_budget = deadline.clamp(Duration::from_millis(config.dense_timeout_ms));
        let began = Instant::now();

        let mut handles = Vec::with_capacity(specs.len());
        for spec in specs {
            let text = spec.text.clone();
            let handle = match spec.source {
                Source::Sparse => {
                    let snapshot = Arc::clone(snapshot);
                    tokio::spawn(async move {
                        let began = Instant::now();
                        let result = run_bounded(sparse_budget, move || {
                            Ok(snapshot.search(&tokenize(&text), depth, params))
                        })
                        .await;
                        (result, began.elapsed())
                    })
                }
                Source::Dense => {
                    let dense = self.dense.clone();
                    tokio::spawn(async move {
                        let began = Instant::now();
                        let result = match dense {
                            Some(dense) => {
                                dense.search(&text, depth, dense_budget).await.into_result()
                            }
                            None => Err(BackendError::Unavailable(
                                "no dense backend attached".to_string(),
                            )),
                        };
                        (result, began.elapsed())
                    })
                }
            };
            handles.push(handle);
        }

        let cutoff = deadline.instant();
        let mut results = Vec::with_capacity(handles.len());
        for mut handle in handles {
            let joined = match tokio::time::timeout_at(cutoff, &mut handle).await {
                Ok(Ok(done)) => done,
                Ok(Err(e)) => (
                    Err(BackendError::Unavailable(format!("branch task failed: {}", e))),
                    Duration::ZERO,
                ),
                Err(_) => {
                    handle.abort();
                    (
                        Err(BackendError::Timeout {
                            budget_ms: deadline.total().as_millis() as u64,
                        }),
                        began.elapsed(),
                    )
                }
            };
            results.push(joined);
        }
        results
    }
}
