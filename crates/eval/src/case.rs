//! Labeled evaluation cases
//!
//! Cases are stored as a JSON array:
//!
//! ```json
//! [
//!   {"query": "carport permit", "ground_truth": {"d1": 1.0, "d2": 0.0}}
//! ]
//! ```

use crate::metrics::GroundTruth;
use quarry_core::{QuarryError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One query with graded relevance judgments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationCase {
    /// Query text
    pub query: String,
    /// doc_id -> relevance in `[0, 1]`
    pub ground_truth: GroundTruth,
}

impl EvaluationCase {
    /// Create a case
    pub fn new<I, K>(query: impl Into<String>, judgments: I) -> Self
    where
        I: IntoIterator<Item = (K, f32)>,
        K: Into<String>,
    {
        EvaluationCase {
            query: query.into(),
            ground_truth: judgments.into_iter().map(|(k, r)| (k.into(), r)).collect(),
        }
    }

    /// Reject relevance values outside `[0, 1]`
    pub fn validate(&self) -> Result<()> {
        for (doc_id, relevance) in &self.ground_truth {
            if !relevance.is_finite() || !(0.0..=1.0).contains(relevance) {
                return Err(QuarryError::config(format!(
                    "relevance for '{}' in case '{}' must be in [0, 1], got {}",
                    doc_id, self.query, relevance
                )));
            }
        }
        Ok(())
    }
}

/// Parse and validate cases from a JSON string
pub fn cases_from_json_str(content: &str) -> Result<Vec<EvaluationCase>> {
    let cases: Vec<EvaluationCase> = serde_json::from_str(content)?;
    for case in &cases {
        case.validate()?;
    }
    Ok(cases)
}

/// Load and validate cases from a JSON file
pub fn load_cases(path: &Path) -> Result<Vec<EvaluationCase>> {
    let content = std::fs::read_to_string(path)?;
    cases_from_json_str(&content)
}
