//! Property tests for BM25 ranking and RRF fusion

use proptest::prelude::*;
use quarry_core::{RetrievalHit, Source};
use quarry_search::{rrf_fuse, RankedList, SparseIndex};
use std::collections::HashSet;

fn ranked(source: Source, weight: f32, ids: &[String]) -> RankedList {
    let hits = ids
        .iter()
        .enumerate()
        .map(|(i, id)| RetrievalHit::new(id.clone(), 1.0, (i + 1) as u32, source))
        .collect();
    RankedList::new(source, weight, hits)
}

fn unique_ids() -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("[a-z]{1,6}", 0..20).prop_map(|s| {
        let mut v: Vec<String> = s.into_iter().collect();
        v.sort();
        v
    })
}

proptest! {
    #[test]
    fn fused_output_is_sorted_and_contiguous(
        a in prop::collection::vec("[a-e]{1,2}", 0..15),
        b in prop::collection::vec("[a-e]{1,2}", 0..15),
        wa in 0.01f32..1.0,
        wb in 0.01f32..1.0,
        top_k in 0usize..20,
    ) {
        let lists = vec![ranked(Source::Sparse, wa, &a), ranked(Source::Dense, wb, &b)];
        let fused = rrf_fuse(&lists, 60, top_k);

        let union: HashSet<&String> = a.iter().chain(b.iter()).collect();
        prop_assert_eq!(fused.len(), union.len().min(top_k));

        for (i, r) in fused.iter().enumerate() {
            prop_assert_eq!(r.rank, (i + 1) as u32);
            prop_assert!(r.fused_score > 0.0);
        }
        for w in fused.windows(2) {
            prop_assert!(w[0].fused_score >= w[1].fused_score);
        }
    }

    #[test]
    fn fusing_list_with_itself_keeps_order(ids in unique_ids()) {
        // Shuffle deterministically by reversing so rank order != id order
        let mut order = ids.clone();
        order.reverse();
        let list = ranked(Source::Sparse, 1.0, &order);
        let fused = rrf_fuse(&[list.clone(), list], 60, order.len());
        let got: Vec<String> = fused.into_iter().map(|r| r.doc_id).collect();
        prop_assert_eq!(got, order);
    }

    #[test]
    fn bm25_hits_are_sorted_and_bounded(
        docs in prop::collection::vec("[a-d ]{0,30}", 1..12),
        query in "[a-d ]{0,12}",
        top_k in 1usize..15,
    ) {
        let index = SparseIndex::new();
        index
            .index_pairs(docs.iter().enumerate().map(|(i, d)| (format!("d{:02}", i), d.clone())))
            .unwrap();
        let hits = index.search_text(&query, top_k).unwrap();

        prop_assert!(hits.len() <= top_k.min(docs.len()));
        for w in hits.windows(2) {
            prop_assert!(
                w[0].score > w[1].score
                    || (w[0].score == w[1].score && w[0].doc_id < w[1].doc_id)
            );
        }
        prop_assert!(hits.iter().all(|h| h.score > 0.0 && h.score.is_finite()));
    }

    #[test]
    fn bm25_score_grows_with_term_frequency(
        filler in prop::collection::vec("[e-h]{2,5}", 0..8),
        others in prop::collection::vec("[e-h]{2,5}( [e-h]{2,5}){0,6}", 0..5),
        lo in 1usize..4,
        extra in 1usize..5,
    ) {
        // Two documents identical except that "hi" repeats the query term more
        let doc = |reps: usize| {
            let mut words = filler.clone();
            words.extend(std::iter::repeat("carport".to_string()).take(reps));
            words.join(" ")
        };
        let mut corpus = vec![
            ("lo".to_string(), doc(lo)),
            ("hi".to_string(), doc(lo + extra)),
        ];
        corpus.extend(others.iter().enumerate().map(|(i, d)| (format!("o{}", i), d.clone())));

        let index = SparseIndex::new();
        index.index_pairs(corpus).unwrap();
        let hits = index.search_text("carport", 10).unwrap();

        let score = |id: &str| hits.iter().find(|h| h.doc_id == id).map(|h| h.score);
        let (hi, lo) = (score("hi").unwrap(), score("lo").unwrap());
        prop_assert!(hi >= lo, "hi={} lo={}", hi, lo);
        prop_assert_eq!(hits[0].doc_id.as_str(), "hi");
    }
}
