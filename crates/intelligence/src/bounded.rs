//! Timeout-bounded execution of blocking backend calls
//!
//! Backends are synchronous (`Send + Sync` traits). Each call runs on
//! tokio's blocking pool and the caller waits at most `budget` for it.
//! A call that overruns is abandoned: it keeps running on the pool until it
//! returns, but its output is dropped.

use quarry_core::BackendError;
use std::time::{Duration, Instant};

/// Wall-clock deadline shared by every stage of one retrieval call
#[derive(Debug, Clone, Copy)]
pub struct CallDeadline {
    at: Instant,
    total: Duration,
}

impl CallDeadline {
    /// Deadline `total` after `start`
    pub fn new(start: Instant, total: Duration) -> Self {
        CallDeadline {
            at: start + total,
            total,
        }
    }

    /// Time left; zero once expired
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// `budget`, shortened so it ends no later than the deadline
    pub fn clamp(&self, budget: Duration) -> Duration {
        budget.min(self.remaining())
    }

    /// Full length of the deadline
    pub fn total(&self) -> Duration {
        self.total
    }

    /// The deadline as a tokio instant, for `timeout_at`
    pub fn instant(&self) -> tokio::time::Instant {
        tokio::time::Instant::from_std(self.at)
    }
}

/// Run `f` on the blocking pool, giving up after `budget`.
///
/// # Errors
///
/// - `BackendError::Timeout` when the budget elapses first
/// - `BackendError::Unavailable` when the task panics or is cancelled
/// - whatever `f` itself returns
pub async fn run_bounded<T, F>(budget: Duration, f: F) -> Result<T, BackendError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, BackendError> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(f);
    match tokio::time::timeout(budget, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(BackendError::Unavailable(format!(
            "backend task failed: {}",
            join_err
        ))),
        Err(_) => Err(BackendError::Timeout {
            budget_ms: budget.as_millis() as u64,
        }),
    }
}
