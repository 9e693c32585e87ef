//! Fixed-output query expander

use super::{QueryExpander, QueryVariant};
use quarry_core::BackendError;

/// Expander that always returns the same variants.
///
/// Useful offline, in evaluation runs that must not depend on a live model,
/// and in tests of the multi-query pipeline.
#[derive(Debug, Clone, Default)]
pub struct StaticExpander {
    variants: Vec<QueryVariant>,
}

impl StaticExpander {
    /// Create an expander returning `variants`
    pub fn new(variants: Vec<QueryVariant>) -> Self {
        StaticExpander { variants }
    }
}

impl QueryExpander for StaticExpander {
    fn expand(&self, _query: &str, max_variants: usize) -> Result<Vec<QueryVariant>, BackendError> {
        Ok(self.variants.iter().take(max_variants).cloned().collect())
    }
}
