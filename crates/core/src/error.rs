//! Error types for quarry
//!
//! Two families of errors exist:
//! - [`QuarryError`]: fatal conditions returned to the caller as `Err`
//!   (bad configuration, index not ready, invalid corpus).
//! - [`BackendError`]: non-fatal failures of an optional branch (dense
//!   retrieval, query expansion). These never cross the orchestrator
//!   boundary as `Err`; they are recorded in response metadata instead.
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use thiserror::Error;

/// Result type alias for quarry operations
pub type Result<T> = std::result::Result<T, QuarryError>;

/// Fatal errors surfaced to the caller
#[derive(Debug, Error)]
pub enum QuarryError {
    /// Invalid or contradictory feature-flag combination
    #[error("Configuration error: {0}")]
    Config(String),

    /// Query issued before the sparse index finished building
    #[error("Sparse index is not ready: index() has not completed")]
    IndexNotReady,

    /// Corpus handed to the indexer violates an invariant (e.g. duplicate doc_id)
    #[error("Invalid corpus: {0}")]
    InvalidCorpus(String),

    /// I/O error while reading configuration or evaluation data
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl QuarryError {
    /// Build a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        QuarryError::Config(msg.into())
    }

    /// True for configuration errors
    pub fn is_config(&self) -> bool {
        matches!(self, QuarryError::Config(_))
    }
}

impl From<serde_json::Error> for QuarryError {
    fn from(e: serde_json::Error) -> Self {
        QuarryError::Serialization(e.to_string())
    }
}

/// Non-fatal failure of an external backend (embedding store, language model)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The call did not complete within its budget
    #[error("backend timed out after {budget_ms}ms")]
    Timeout {
        /// Budget the call was given
        budget_ms: u64,
    },

    /// Backend unreachable, refused the connection, or returned an error
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Backend answered but the response could not be interpreted
    #[error("parse error: {0}")]
    Parse(String),

    /// Required cargo feature is not compiled in
    #[error("feature '{0}' not enabled")]
    FeatureDisabled(&'static str),
}

impl BackendError {
    /// True when the failure was a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, BackendError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config() {
        let err = QuarryError::config("expansion requires hybrid");
        let msg = err.to_string();
        assert!(msg.contains("Configuration error"));
        assert!(msg.contains("expansion requires hybrid"));
        assert!(err.is_config());
    }

    #[test]
    fn test_error_display_index_not_ready() {
        let msg = QuarryError::IndexNotReady.to_string();
        assert!(msg.contains("not ready"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: QuarryError = io_err.into();
        assert!(matches!(err, QuarryError::Io(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: QuarryError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, QuarryError::Serialization(_)));
    }

    #[test]
    fn test_backend_error_display() {
        assert_eq!(
            BackendError::Timeout { budget_ms: 150 }.to_string(),
            "backend timed out after 150ms"
        );
        assert!(BackendError::Timeout { budget_ms: 1 }.is_timeout());
        assert!(!BackendError::Unavailable("down".into()).is_timeout());
        assert_eq!(
            BackendError::FeatureDisabled("embed").to_string(),
            "feature 'embed' not enabled"
        );
    }
}
