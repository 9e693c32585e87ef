//! Sparse index with copy-on-write reindexing
//!
//! `SparseIndex` owns the current [`Bm25Index`] snapshot behind an
//! `RwLock<Option<Arc<_>>>`. Rebuilding happens outside the lock; only the
//! final pointer swap takes the write lock, so:
//! - readers never observe a partially built index
//! - in-flight queries finish against the snapshot they started with
//! - a query issued before the first `index()` completes fails with
//!   `QuarryError::IndexNotReady`

use crate::index::{Bm25Index, Document};
use crate::scorer::Bm25Params;
use crate::tokenizer::tokenize;
use parking_lot::{Condvar, Mutex, RwLock};
use quarry_core::{QuarryError, Result, RetrievalHit};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Thread-safe handle to the current BM25 snapshot
#[derive(Debug, Default)]
pub struct SparseIndex {
    current: RwLock<Option<Arc<Bm25Index>>>,
    /// Number of completed swaps; 0 means never indexed
    version: AtomicU64,
    /// Guards waiters on `swapped`
    swap_lock: Mutex<()>,
    /// Signalled after every swap
    swapped: Condvar,
    params: Bm25Params,
}

impl SparseIndex {
    /// Create an index that is not ready until the first `index()` call
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index with non-default BM25 parameters for `search()`
    pub fn with_params(params: Bm25Params) -> Self {
        SparseIndex {
            params,
            ..Default::default()
        }
    }

    /// Default BM25 parameters used by `search()`
    pub fn params(&self) -> Bm25Params {
        self.params
    }

    // ========================================================================
    // Write path
    // ========================================================================

    /// Build a new snapshot from `corpus` and swap it in atomically.
    ///
    /// Returns the new version. On error the previous snapshot stays live.
    pub fn index<I>(&self, corpus: I) -> Result<u64>
    where
        I: IntoIterator<Item = Document>,
    {
        let start = Instant::now();
        let built = Arc::new(Bm25Index::build(corpus)?);
        let docs = built.document_count();
        let terms = built.term_count();

        *self.current.write() = Some(built);
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        {
            let _guard = self.swap_lock.lock();
            self.swapped.notify_all();
        }

        info!(
            target: "quarry::sparse",
            version,
            docs,
            terms,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Sparse index swapped in"
        );
        Ok(version)
    }

    /// Index `(doc_id, content)` pairs as supplied by a corpus connector
    pub fn index_pairs<I, K, C>(&self, pairs: I) -> Result<u64>
    where
        I: IntoIterator<Item = (K, C)>,
        K: Into<String>,
        C: Into<String>,
    {
        self.index(pairs.into_iter().map(|(id, content)| Document::new(id, content)))
    }

    // ========================================================================
    // Version watermark
    // ========================================================================

    /// Number of completed index builds
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// True once the first `index()` call has completed
    pub fn is_ready(&self) -> bool {
        self.current.read().is_some()
    }

    /// Block until `version` swaps have completed or `timeout` elapses.
    ///
    /// Sleeps on a condition variable signalled by `index()`. Returns true
    /// if the version was reached.
    pub fn wait_for_version(&self, version: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.swap_lock.lock();
        while self.version() < version {
            if self.swapped.wait_until(&mut guard, deadline).timed_out() {
                return self.version() >= version;
            }
        }
        true
    }

    // ========================================================================
    // Read path
    // ========================================================================

    /// Current snapshot, shared with any in-flight readers
    ///
    /// # Errors
    ///
    /// `QuarryError::IndexNotReady` before the first successful `index()`.
    pub fn snapshot(&self) -> Result<Arc<Bm25Index>> {
        self.current
            .read()
            .as_ref()
            .map(Arc::clone)
            .ok_or(QuarryError::IndexNotReady)
    }

    /// Search pre-tokenized query terms with the default parameters
    pub fn search(&self, query_terms: &[String], top_k: usize) -> Result<Vec<RetrievalHit>> {
        self.search_with(query_terms, top_k, self.params)
    }

    /// Search pre-tokenized query terms with explicit parameters
    pub fn search_with(
        &self,
        query_terms: &[String],
        top_k: usize,
        params: Bm25Params,
    ) -> Result<Vec<RetrievalHit>> {
        let snapshot = self.snapshot()?;
        let hits = snapshot.search(query_terms, top_k, params);
        debug!(
            target: "quarry::sparse",
            terms = query_terms.len(),
            hits = hits.len(),
            "Sparse search"
        );
        Ok(hits)
    }

    /// Tokenize raw query text, then search
    pub fn search_text(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalHit>> {
        self.search(&tokenize(query), top_k)
    }
}

// ============================================================================
// Tests
// ============================================================================
