//! Observability output
//!
//! Every retrieval emits one [`BranchReport`] per branch, an optional
//! [`ExpansionReport`] and one [`RetrievalSummary`] to a [`MetricsSink`].
//! Format and transport belong to the sink:
//! - `TracingMetrics` writes structured `tracing` events (default)
//! - `InMemoryMetrics` keeps counters and a bounded log of recent branches

use crate::expand::VariantKind;
use crate::plan::RetrievalPlan;
use parking_lot::Mutex;
use quarry_core::{BackendError, Source};
use serde::Serialize;
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

// ============================================================================
// Reports
// ============================================================================

/// Which query a branch searched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "variant")]
pub enum QueryKind {
    /// The caller's query
    Original,
    /// An expanded variant
    Variant(VariantKind),
}

/// How a branch or the expander ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchStatus {
    /// Finished within budget
    Completed,
    /// Budget elapsed; output discarded
    TimedOut,
    /// Backend error
    Failed(String),
}

impl BranchStatus {
    /// Status for a finished call
    pub fn from_result<T>(result: &Result<T, BackendError>) -> Self {
        match result {
            Ok(_) => BranchStatus::Completed,
            Err(e) if e.is_timeout() => BranchStatus::TimedOut,
            Err(e) => BranchStatus::Failed(e.to_string()),
        }
    }

    /// True for `Completed`
    pub fn is_completed(&self) -> bool {
        matches!(self, BranchStatus::Completed)
    }
}

/// One retrieval branch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchReport {
    /// Human-readable label, e.g. `sparse:original` or `dense:hyde#2`
    pub label: String,
    /// Index searched
    pub source: Source,
    /// Query searched
    pub query_kind: QueryKind,
    /// Wall time until the branch finished or was abandoned
    pub latency_ms: u64,
    /// Hits contributed to fusion (0 unless completed)
    pub hit_count: usize,
    /// Outcome
    pub status: BranchStatus,
}

/// The expansion step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpansionReport {
    /// Wall time of the expansion call
    pub latency_ms: u64,
    /// Variants kept after cleaning
    pub variant_count: usize,
    /// Outcome
    pub status: BranchStatus,
}

/// One finished retrieval call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalSummary {
    /// Plan that ran
    pub plan: RetrievalPlan,
    /// Any branch or the expander failed
    pub degraded: bool,
    /// End-to-end wall time
    pub latency_ms: u64,
    /// Fused hits returned
    pub hit_count: usize,
    /// Branches dispatched
    pub branch_count: usize,
    /// Branches that timed out or failed
    pub failed_branches: usize,
    /// Sources with at least one completed branch
    pub sources_used: BTreeSet<Source>,
}

// ============================================================================
// MetricsSink
// ============================================================================

/// Observability collaborator
pub trait MetricsSink: Send + Sync {
    /// Called once per branch, after the fan-in barrier
    fn record_branch(&self, report: &BranchReport);

    /// Called once per successful retrieval
    fn record_retrieval(&self, summary: &RetrievalSummary);

    /// Called when the expander ran
    fn record_expansion(&self, _report: &ExpansionReport) {}
}

/// Sink that writes `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetrics;

impl MetricsSink for TracingMetrics {
    fn record_branch(&self, report: &BranchReport) {
        match &report.status {
            BranchStatus::Completed => info!(
                target: "quarry::metrics",
                branch = %report.label,
                latency_ms = report.latency_ms,
                hits = report.hit_count,
                "branch completed"
            ),
            BranchStatus::TimedOut => warn!(
                target: "quarry::metrics",
                branch = %report.label,
                latency_ms = report.latency_ms,
                "branch timed out"
            ),
            BranchStatus::Failed(error) => warn!(
                target: "quarry::metrics",
                branch = %report.label,
                latency_ms = report.latency_ms,
                error = %error,
                "branch failed"
            ),
        }
    }

    fn record_retrieval(&self, summary: &RetrievalSummary) {
        info!(
            target: "quarry::metrics",
            plan = %summary.plan,
            degraded = summary.degraded,
            latency_ms = summary.latency_ms,
            hits = summary.hit_count,
            branches = summary.branch_count,
            failed = summary.failed_branches,
            "retrieval"
        );
    }

    fn record_expansion(&self, report: &ExpansionReport) {
        info!(
            target: "quarry::metrics",
            latency_ms = report.latency_ms,
            variants = report.variant_count,
            completed = report.status.is_completed(),
            "expansion"
        );
    }
}

/// Default capacity of the recent-branch log
pub const DEFAULT_RECENT_BRANCHES: usize = 256;

/// Counter values at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    /// Successful retrieval calls
    pub requests: u64,
    /// Calls answered in degraded mode
    pub degraded_responses: u64,
    /// Branches abandoned on timeout
    pub branch_timeouts: u64,
    /// Branches whose backend was unavailable or errored
    pub branch_failures: u64,
    /// Expansion calls that timed out or failed
    pub expansion_failures: u64,
}

/// Sink that keeps counters in memory
#[derive(Debug)]
pub struct InMemoryMetrics {
    requests: AtomicU64,
    degraded_responses: AtomicU64,
    branch_timeouts: AtomicU64,
    branch_failures: AtomicU64,
    expansion_failures: AtomicU64,
    recent: Mutex<VecDeque<BranchReport>>,
    capacity: usize,
}

impl Default for InMemoryMetrics {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_RECENT_BRANCHES)
    }
}

impl InMemoryMetrics {
    /// Create a sink with the default log capacity
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink keeping at most `capacity` recent branch reports
    pub fn with_capacity(capacity: usize) -> Self {
        InMemoryMetrics {
            requests: AtomicU64::new(0),
            degraded_responses: AtomicU64::new(0),
            branch_timeouts: AtomicU64::new(0),
            branch_failures: AtomicU64::new(0),
            expansion_failures: AtomicU64::new(0),
            recent: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Current counter values
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            degraded_responses: self.degraded_responses.load(Ordering::Relaxed),
            branch_timeouts: self.branch_timeouts.load(Ordering::Relaxed),
            branch_failures: self.branch_failures.load(Ordering::Relaxed),
            expansion_failures: self.expansion_failures.load(Ordering::Relaxed),
        }
    }

    /// Most recent branch reports, oldest first
    pub fn recent_branches(&self) -> Vec<BranchReport> {
        self.recent.lock().iter().cloned().collect()
    }
}

impl MetricsSink for InMemoryMetrics {
    fn record_branch(&self, report: &BranchReport) {
        match report.status {
            BranchStatus::Completed => {}
            BranchStatus::TimedOut => {
                self.branch_timeouts.fetch_add(1, Ordering::Relaxed);
            }
            BranchStatus::Failed(_) => {
                self.branch_failures.fetch_add(1, Ordering::Relaxed);
            }
        }

        if self.capacity == 0 {
            return;
        }
        let mut recent = self.recent.lock();
        if recent.len() == self.capacity {
            recent.pop_front();
        }
        recent.push_back(report.clone());
    }

    fn record_retrieval(&self, summary: &RetrievalSummary) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if summary.degraded {
            self.degraded_responses.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_expansion(&self, report: &ExpansionReport) {
        if !report.status.is_completed() {
            self.expansion_failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}
