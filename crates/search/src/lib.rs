//! Sparse retrieval and rank fusion for quarry
//!
//! This crate provides:
//! - Basic tokenizer shared by indexing and querying
//! - Bm25Index: immutable inverted index over one corpus version
//! - Bm25Scorer / ScorerContext: BM25 term scoring
//! - SparseIndex: copy-on-write handle used by the orchestrator
//! - Fuser trait and RRFFuser: weighted Reciprocal Rank Fusion
//!
//! # Usage
//!
//! ```
//! use quarry_search::SparseIndex;
//!
//! let index = SparseIndex::new();
//! index.index_pairs(vec![
//!     ("d1", "building permit carport bavaria"),
//!     ("d2", "solar panel roof installation"),
//! ])?;
//! let hits = index.search_text("carport permit", 10)?;
//! assert_eq!(hits[0].doc_id, "d1");
//! # Ok::<(), quarry_core::QuarryError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fuser;
pub mod index;
pub mod scorer;
pub mod sparse;
pub mod tokenizer;

// Re-export commonly used types
pub use fuser::{normalize_weights, rrf_fuse, Fuser, RRFFuser, RankedList};
pub use index::{Bm25Index, Document, Posting, PostingList};
pub use scorer::{Bm25Params, Bm25Scorer, ScorerContext};
pub use sparse::SparseIndex;
pub use tokenizer::{tokenize, tokenize_unique};
