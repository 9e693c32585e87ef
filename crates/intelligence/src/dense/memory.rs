//! Brute-force in-memory vector backend
//!
//! Stores one embedding per document and answers queries by exhaustive
//! cosine similarity. Suitable for small corpora, offline evaluation and
//! tests; production deployments plug in an external store through
//! [`DenseBackend`](super::DenseBackend).

use super::embedder::Embedder;
use super::{DenseBackend, ScoredDoc};
use parking_lot::RwLock;
use quarry_core::BackendError;
use std::collections::HashMap;
use std::sync::Arc;

/// Cosine similarity: dot(a,b) / (||a|| * ||b||)
///
/// Range: [-1, 1], higher = more similar.
/// Returns 0.0 if either vector has zero norm or the dimensions differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Stored embeddings plus a doc_id -> row index
#[derive(Default)]
struct VectorTable {
    rows: Vec<(String, Vec<f32>)>,
    slots: HashMap<String, usize>,
}

impl VectorTable {
    fn upsert(&mut self, doc_id: String, vector: Vec<f32>) {
        match self.slots.get(&doc_id) {
            Some(&slot) => self.rows[slot].1 = vector,
            None => {
                self.slots.insert(doc_id.clone(), self.rows.len());
                self.rows.push((doc_id, vector));
            }
        }
    }
}

/// Exhaustive cosine-similarity backend
pub struct InMemoryVectorBackend {
    embedder: Arc<dyn Embedder>,
    entries: RwLock<VectorTable>,
}

impl InMemoryVectorBackend {
    /// Create an empty backend
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        InMemoryVectorBackend {
            embedder,
            entries: RwLock::new(VectorTable::default()),
        }
    }

    /// Embed and store every `(doc_id, content)` pair
    pub fn from_corpus<I, K, C>(embedder: Arc<dyn Embedder>, pairs: I) -> Result<Self, BackendError>
    where
        I: IntoIterator<Item = (K, C)>,
        K: Into<String>,
        C: AsRef<str>,
    {
        let backend = Self::new(embedder);
        for (doc_id, content) in pairs {
            backend.insert(doc_id, content.as_ref())?;
        }
        Ok(backend)
    }

    /// Embed and store one document, replacing any previous embedding
    pub fn insert(&self, doc_id: impl Into<String>, content: &str) -> Result<(), BackendError> {
        let doc_id = doc_id.into();
        let vector = self.embedder.embed(content)?;
        self.entries.write().upsert(doc_id, vector);
        Ok(())
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.entries.read().rows.len()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.read().rows.is_empty()
    }
}

impl DenseBackend for InMemoryVectorBackend {
    fn search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredDoc>, BackendError> {
        let query_vec = self.embedder.embed(query)?;
        let entries = self.entries.read();

        // Orthogonal or opposing documents are not neighbors
        let mut scored: Vec<ScoredDoc> = entries
            .rows
            .iter()
            .map(|(id, v)| ScoredDoc::new(id.clone(), cosine_similarity(&query_vec, v)))
            .filter(|d| d.score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.doc_id.cmp(&b.doc_id)));
        scored.truncate(top_k);
        Ok(scored)
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dense::HashEmbedder;

    fn backend() -> InMemoryVectorBackend {
        InMemoryVectorBackend::from_corpus(
            Arc::new(HashEmbedder::new(512)),
            vec![
                ("d1", "building permit carport bavaria"),
                ("d2", "solar panel roof installation"),
                ("d3", "carport roof repair"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_search_ranks_by_similarity() {
        let backend = backend();
        assert_eq!(backend.len(), 3);
        let results = backend.search("carport permit bavaria", 10).unwrap();
        assert_eq!(results[0].doc_id, "d1");
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_search_truncates() {
        let backend = backend();
        assert!(backend.search("carport roof", 1).unwrap().len() <= 1);
    }

    #[test]
    fn test_insert_replaces_existing() {
        let backend = backend();
        backend.insert("d2", "carport permit bavaria").unwrap();
        assert_eq!(backend.len(), 3);
        let results = backend.search("carport permit bavaria", 10).unwrap();
        assert_eq!(results[0].doc_id, "d2");
        assert!((results[0].score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_from_corpus_keeps_one_row_per_doc() {
        let pairs: Vec<(String, String)> = (0..2_000)
            .map(|i| (format!("doc{}", i % 500), format!("permit number {}", i)))
            .collect();
        let backend =
            InMemoryVectorBackend::from_corpus(Arc::new(HashEmbedder::new(1024)), pairs).unwrap();
        assert_eq!(backend.len(), 500);

        // Last write wins: doc7 was last embedded from i = 1507
        let results = backend.search("permit number 1507", 500).unwrap();
        assert_eq!(results[0].doc_id, "doc7");
        assert!((results[0].score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_backend() {
        let backend = InMemoryVectorBackend::new(Arc::new(HashEmbedder::default()));
        assert!(backend.is_empty());
        assert!(backend.search("anything", 5).unwrap().is_empty());
    }
}
