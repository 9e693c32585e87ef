//! Feature-flag configuration via `quarry.toml`
//!
//! A [`FeatureFlagConfig`] is loaded once per deployment stage and passed by
//! reference into every retrieval call. There is no process-wide flag state:
//! two requests may run against two different configs side by side, which is
//! how A/B evaluation compares a baseline with a candidate.
//!
//! The flag file holds one table per stage:
//!
//! ```toml
//! [development]
//! enable_hybrid = true
//!
//! [production]
//! enable_hybrid = true
//! rollout_percentage = 10
//! ```

use crate::error::{QuarryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Config file name conventionally used for the stage flag file.
pub const CONFIG_FILE_NAME: &str = "quarry.toml";

// ============================================================================
// Stage
// ============================================================================

/// Deployment stage a configuration belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Local development
    #[default]
    Development,
    /// Pre-production
    Staging,
    /// Live traffic
    Production,
}

impl Stage {
    /// All stages in promotion order
    pub fn all() -> [Stage; 3] {
        [Stage::Development, Stage::Staging, Stage::Production]
    }

    /// Lowercase stage name (matches the flag-file table name)
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Development => "development",
            Stage::Staging => "staging",
            Stage::Production => "production",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = QuarryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Stage::Development),
            "staging" => Ok(Stage::Staging),
            "production" | "prod" => Ok(Stage::Production),
            other => Err(QuarryError::config(format!(
                "Unknown stage '{}'. Expected \"development\", \"staging\" or \"production\".",
                other
            ))),
        }
    }
}

// ============================================================================
// FeatureFlagConfig
// ============================================================================

/// Stage-scoped settings controlling which branches run and their budgets.
///
/// Every field has a default so partial TOML tables are valid. Loaders
/// always call [`FeatureFlagConfig::validate`]; a config that made it
/// through a loader is safe to share across requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureFlagConfig {
    /// Deployment stage
    pub stage: Stage,
    /// Run the dense branch alongside sparse
    pub enable_hybrid: bool,
    /// Widen recall with language-model query variants (requires hybrid)
    pub enable_query_expansion: bool,
    /// Share of traffic (0-100) routed to hybrid instead of sparse-only
    pub rollout_percentage: u8,
    /// BM25 term-frequency saturation
    pub bm25_k1: f32,
    /// BM25 length normalization
    pub bm25_b: f32,
    /// RRF smoothing constant
    pub rrf_k: u32,
    /// Budget for the sparse branch
    pub sparse_timeout_ms: u64,
    /// Budget for the dense branch
    pub dense_timeout_ms: u64,
    /// Budget for query expansion
    pub expansion_timeout_ms: u64,
    /// Hard deadline for the whole call; derived from the budgets when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
    /// Maximum number of expanded variants to search
    pub max_expansion_variants: usize,
    /// Number of fused results returned
    pub top_k: usize,
    /// Fusion weight of sparse lists
    pub sparse_weight: f32,
    /// Fusion weight of dense lists
    pub dense_weight: f32,
    /// Multiplier applied to the original query's lists (variants weigh 1.0)
    pub original_query_weight: f32,
}

impl Default for FeatureFlagConfig {
    fn default() -> Self {
        FeatureFlagConfig {
            stage: Stage::Development,
            enable_hybrid: false,
            enable_query_expansion: false,
            rollout_percentage: 100,
            bm25_k1: 1.5,
            bm25_b: 0.75,
            rrf_k: 60,
            sparse_timeout_ms: 50,
            dense_timeout_ms: 150,
            expansion_timeout_ms: 200,
            deadline_ms: None,
            max_expansion_variants: 3,
            top_k: 10,
            sparse_weight: 0.4,
            dense_weight: 0.6,
            original_query_weight: 2.0,
        }
    }
}

impl FeatureFlagConfig {
    /// Sparse-only configuration for a stage
    pub fn sparse_only(stage: Stage) -> Self {
        FeatureFlagConfig {
            stage,
            ..Default::default()
        }
    }

    /// Hybrid (sparse + dense) configuration for a stage, fully rolled out
    pub fn hybrid(stage: Stage) -> Self {
        FeatureFlagConfig {
            stage,
            enable_hybrid: true,
            rollout_percentage: 100,
            ..Default::default()
        }
    }

    /// Builder: enable query expansion (also enables hybrid)
    pub fn with_query_expansion(mut self) -> Self {
        self.enable_hybrid = true;
        self.enable_query_expansion = true;
        self
    }

    /// Builder: set rollout percentage
    pub fn with_rollout(mut self, percentage: u8) -> Self {
        self.rollout_percentage = percentage;
        self
    }

    /// Builder: set top_k
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Builder: set branch timeouts
    pub fn with_timeouts(mut self, sparse_ms: u64, dense_ms: u64) -> Self {
        self.sparse_timeout_ms = sparse_ms;
        self.dense_timeout_ms = dense_ms;
        self
    }

    /// Builder: cap the whole call at `ms`
    pub fn with_deadline(mut self, ms: u64) -> Self {
        self.deadline_ms = Some(ms);
        self
    }

    /// Hard deadline for one retrieval call.
    ///
    /// `deadline_ms` when set, otherwise the expansion budget (only when
    /// expansion is enabled) plus the slowest branch budget.
    pub fn retrieval_deadline_ms(&self) -> u64 {
        self.deadline_ms.unwrap_or_else(|| {
            let expansion = if self.enable_query_expansion {
                self.expansion_timeout_ms
            } else {
                0
            };
            expansion + self.sparse_timeout_ms.max(self.dense_timeout_ms)
        })
    }

    /// Expansion budget inside the call deadline.
    ///
    /// Expansion never eats into the sparse budget, so the original sparse
    /// branch always gets its full `sparse_timeout_ms`.
    pub fn expansion_budget_ms(&self) -> u64 {
        self.expansion_timeout_ms.min(
            self.retrieval_deadline_ms()
                .saturating_sub(self.sparse_timeout_ms),
        )
    }

    /// Check the configuration for invalid or contradictory settings.
    ///
    /// # Errors
    ///
    /// Returns `QuarryError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.enable_query_expansion && !self.enable_hybrid {
            return Err(QuarryError::config(
                "enable_query_expansion requires enable_hybrid",
            ));
        }
        if self.rollout_percentage > 100 {
            return Err(QuarryError::config(format!(
                "rollout_percentage must be within [0, 100], got {}",
                self.rollout_percentage
            )));
        }
        if !self.bm25_k1.is_finite() || self.bm25_k1 < 0.0 {
            return Err(QuarryError::config(format!(
                "bm25_k1 must be a non-negative number, got {}",
                self.bm25_k1
            )));
        }
        if !(0.0..=1.0).contains(&self.bm25_b) {
            return Err(QuarryError::config(format!(
                "bm25_b must be within [0, 1], got {}",
                self.bm25_b
            )));
        }
        if self.rrf_k == 0 {
            return Err(QuarryError::config("rrf_k must be positive"));
        }
        if self.top_k == 0 {
            return Err(QuarryError::config("top_k must be positive"));
        }
        for (name, value) in [
            ("sparse_timeout_ms", self.sparse_timeout_ms),
            ("dense_timeout_ms", self.dense_timeout_ms),
            ("expansion_timeout_ms", self.expansion_timeout_ms),
        ] {
            if value == 0 {
                return Err(QuarryError::config(format!("{} must be positive", name)));
            }
        }
        if let Some(deadline) = self.deadline_ms {
            if deadline < self.sparse_timeout_ms {
                return Err(QuarryError::config(format!(
                    "deadline_ms ({}) must be at least sparse_timeout_ms ({})",
                    deadline, self.sparse_timeout_ms
                )));
            }
        }
        for (name, value) in [
            ("sparse_weight", self.sparse_weight),
            ("dense_weight", self.dense_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(QuarryError::config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if self.sparse_weight == 0.0 && self.dense_weight == 0.0 {
            return Err(QuarryError::config(
                "sparse_weight and dense_weight cannot both be zero",
            ));
        }
        if !self.original_query_weight.is_finite() || self.original_query_weight <= 0.0 {
            return Err(QuarryError::config(format!(
                "original_query_weight must be positive, got {}",
                self.original_query_weight
            )));
        }
        Ok(())
    }

    /// Parse and validate a single config table.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: FeatureFlagConfig = toml::from_str(content)
            .map_err(|e| QuarryError::config(format!("Failed to parse flags: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// FlagFile
// ============================================================================

/// Stage-scoped flag file: one optional table per stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlagFile {
    /// `[development]` table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub development: Option<FeatureFlagConfig>,
    /// `[staging]` table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging: Option<FeatureFlagConfig>,
    /// `[production]` table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production: Option<FeatureFlagConfig>,
}

impl FlagFile {
    /// Parse a flag file from TOML text.
    ///
    /// Every present stage table is validated eagerly so a bad production
    /// table fails at load time, not on the first production request.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: FlagFile = toml::from_str(content)
            .map_err(|e| QuarryError::config(format!("Failed to parse flag file: {}", e)))?;
        for stage in Stage::all() {
            if file.table(stage).is_some() {
                file.for_stage(stage)?;
            }
        }
        Ok(file)
    }

    /// Read and parse a flag file from a path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            QuarryError::config(format!(
                "Failed to read flag file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            QuarryError::Config(msg) => {
                QuarryError::Config(format!("{} ({})", msg, path.display()))
            }
            other => other,
        })
    }

    fn table(&self, stage: Stage) -> Option<&FeatureFlagConfig> {
        match stage {
            Stage::Development => self.development.as_ref(),
            Stage::Staging => self.staging.as_ref(),
            Stage::Production => self.production.as_ref(),
        }
    }

    /// Validated config for a stage.
    ///
    /// The returned config's `stage` is always the table it came from.
    pub fn for_stage(&self, stage: Stage) -> Result<FeatureFlagConfig> {
        let mut config = self.table(stage).cloned().ok_or_else(|| {
            QuarryError::config(format!("No [{}] table in flag file", stage))
        })?;
        config.stage = stage;
        config.validate().map_err(|e| match e {
            QuarryError::Config(msg) => QuarryError::Config(format!("[{}] {}", stage, msg)),
            other => other,
        })?;
        Ok(config)
    }

    /// Returns the default flag file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Quarry retrieval feature flags, one table per deployment stage.
#
# Recognized keys (all optional):
#   enable_hybrid          = false   # run the dense branch alongside BM25
#   enable_query_expansion = false   # requires enable_hybrid
#   rollout_percentage     = 100     # share of traffic routed to hybrid
#   bm25_k1 = 1.5, bm25_b = 0.75, rrf_k = 60
#   sparse_timeout_ms = 50, dense_timeout_ms = 150, expansion_timeout_ms = 200
#   deadline_ms = 350                # whole-call cap; derived from the budgets if unset
#   max_expansion_variants = 3, top_k = 10
#   sparse_weight = 0.4, dense_weight = 0.6, original_query_weight = 2.0

[development]
enable_hybrid = true
enable_query_expansion = true

[staging]
enable_hybrid = true

[production]
enable_hybrid = true
rollout_percentage = 0
"#
    }

    /// Write the default flag file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }
}
