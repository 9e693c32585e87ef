//! Offline evaluation for quarry retrieval configurations
//!
//! - [`metrics`]: NDCG@K, reciprocal rank and Recall@K over graded judgments
//! - [`case`]: labeled cases and their JSON loader
//! - [`harness`]: run cases through a retriever, compare configs, gate rollouts

#![warn(missing_docs)]

pub mod case;
pub mod harness;
pub mod metrics;

pub use case::{cases_from_json_str, load_cases, EvaluationCase};
pub use harness::{
    Comparison, EvaluationReport, Evaluator, QueryEvaluation, RolloutGate, EVAL_CUTOFF,
};
pub use metrics::{dcg_at_k, ideal_dcg_at_k, ndcg_at_k, recall_at_k, reciprocal_rank, GroundTruth};
