//! Immutable BM25 inverted index
//!
//! This module provides:
//! - Document: corpus unit handed to the indexer
//! - Posting / PostingList: per-term document statistics
//! - Bm25Index: a fully built, read-only index snapshot
//!
//! A `Bm25Index` is never mutated after [`Bm25Index::build`] returns.
//! Reindexing builds a new one and swaps it in (see `SparseIndex`), so
//! readers holding an `Arc<Bm25Index>` always see a complete corpus version.

use crate::scorer::{Bm25Params, Bm25Scorer, ScorerContext};
use crate::tokenizer::{dedup_terms, term_frequencies, tokenize};
use quarry_core::{QuarryError, Result, RetrievalHit, Source};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Document
// ============================================================================

/// A document in the corpus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier within the corpus
    pub doc_id: String,
    /// Raw text content
    pub content: String,
    /// Number of index tokens in `content`
    pub token_count: u32,
}

impl Document {
    /// Create a document; `token_count` is computed with the index tokenizer
    pub fn new(doc_id: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let token_count = tokenize(&content).len() as u32;
        Document {
            doc_id: doc_id.into(),
            content,
            token_count,
        }
    }
}

impl<I: Into<String>, C: Into<String>> From<(I, C)> for Document {
    fn from((doc_id, content): (I, C)) -> Self {
        Document::new(doc_id, content)
    }
}

// ============================================================================
// PostingList
// ============================================================================

/// Entry in a posting list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    /// Ordinal of the document within the snapshot
    pub doc: u32,
    /// Term frequency in this document
    pub tf: u32,
}

/// Documents containing a term, in ascending ordinal order
#[derive(Debug, Clone, Default)]
pub struct PostingList {
    /// Document entries
    pub entries: Vec<Posting>,
}

impl PostingList {
    /// Number of documents containing this term (document frequency)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if posting list is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Bm25Index
// ============================================================================

/// Read-only BM25 index over one corpus version
#[derive(Debug, Clone, Default)]
pub struct Bm25Index {
    /// Term -> posting list
    postings: HashMap<String, PostingList>,
    /// Ordinal -> doc_id
    doc_ids: Vec<String>,
    /// Ordinal -> document length in tokens
    doc_lengths: Vec<u32>,
    /// doc_id -> ordinal
    ordinals: HashMap<String, u32>,
    /// Average document length in tokens
    avg_doc_len: f32,
}

impl Bm25Index {
    /// Build an index over a corpus.
    ///
    /// An empty corpus yields an index that answers every query with `[]`.
    ///
    /// # Errors
    ///
    /// Returns `QuarryError::InvalidCorpus` if two documents share a `doc_id`.
    pub fn build<I>(corpus: I) -> Result<Self>
    where
        I: IntoIterator<Item = Document>,
    {
        let mut index = Bm25Index::default();
        let mut total_len: u64 = 0;

        for doc in corpus {
            if index.ordinals.contains_key(&doc.doc_id) {
                return Err(QuarryError::InvalidCorpus(format!(
                    "duplicate doc_id '{}'",
                    doc.doc_id
                )));
            }

            let ordinal = index.doc_ids.len() as u32;
            let tokens = tokenize(&doc.content);
            let doc_len = tokens.len() as u32;

            for (term, tf) in term_frequencies(&tokens) {
                index
                    .postings
                    .entry(term.to_string())
                    .or_default()
                    .entries
                    .push(Posting { doc: ordinal, tf });
            }

            total_len += doc_len as u64;
            index.ordinals.insert(doc.doc_id.clone(), ordinal);
            index.doc_ids.push(doc.doc_id);
            index.doc_lengths.push(doc_len);
        }

        if !index.doc_ids.is_empty() {
            index.avg_doc_len = total_len as f32 / index.doc_ids.len() as f32;
        }
        Ok(index)
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Number of indexed documents (N)
    pub fn document_count(&self) -> usize {
        self.doc_ids.len()
    }

    /// Average document length in tokens
    pub fn average_document_length(&self) -> f32 {
        self.avg_doc_len
    }

    /// Length of a document in tokens, if indexed
    pub fn document_length(&self, doc_id: &str) -> Option<u32> {
        self.ordinals
            .get(doc_id)
            .map(|&ord| self.doc_lengths[ord as usize])
    }

    /// Number of documents containing `term`
    pub fn doc_freq(&self, term: &str) -> usize {
        self.postings.get(term).map(PostingList::len).unwrap_or(0)
    }

    /// Posting list for a term
    pub fn lookup(&self, term: &str) -> Option<&PostingList> {
        self.postings.get(term)
    }

    /// Number of distinct terms
    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    /// Check whether a document is indexed
    pub fn contains(&self, doc_id: &str) -> bool {
        self.ordinals.contains_key(doc_id)
    }

    /// Corpus statistics for the scorer
    pub fn scorer_context(&self) -> ScorerContext {
        ScorerContext::new(self.document_count(), self.avg_doc_len)
    }

    // ========================================================================
    // Query
    // ========================================================================

    /// Score every document containing at least one query term.
    ///
    /// Query terms are deduplicated (first occurrence wins) and terms absent
    /// from the corpus contribute nothing. Results are sorted by score
    /// descending, ties broken by `doc_id` ascending, and truncated to
    /// `top_k`. Summation always follows query-term order, so repeated calls
    /// produce bit-identical scores.
    pub fn search(
        &self,
        query_terms: &[String],
        top_k: usize,
        params: Bm25Params,
    ) -> Vec<RetrievalHit> {
        if top_k == 0 || self.doc_ids.is_empty() {
            return Vec::new();
        }

        let scorer = Bm25Scorer::new(params);
        let ctx = self.scorer_context();
        let mut scores: HashMap<u32, f32> = HashMap::new();

        for term in dedup_terms(query_terms.iter().cloned()) {
            let Some(postings) = self.postings.get(&term) else {
                continue;
            };
            let idf = ctx.idf(postings.len());
            for posting in &postings.entries {
                let doc_len = self.doc_lengths[posting.doc as usize];
                *scores.entry(posting.doc).or_insert(0.0) +=
                    scorer.term_score(posting.tf, doc_len, idf, &ctx);
            }
        }

        let mut scored: Vec<(u32, f32)> = scores.into_iter().collect();
        scored.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| self.doc_ids[a.0 as usize].cmp(&self.doc_ids[b.0 as usize]))
        });
        scored.truncate(top_k);

        scored
            .into_iter()
            .enumerate()
            .map(|(i, (ord, score))| {
                RetrievalHit::new(
                    self.doc_ids[ord as usize].clone(),
                    score,
                    (i + 1) as u32,
                    Source::Sparse,
                )
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
