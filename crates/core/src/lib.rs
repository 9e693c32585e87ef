//! Core types for quarry
//!
//! This crate defines the foundational types shared by every layer:
//! - QuarryError / BackendError: fatal and non-fatal error taxonomy
//! - Source, RetrievalHit, FusedResult: ranked retrieval output
//! - FeatureFlagConfig, Stage, FlagFile: stage-scoped feature flags

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod types;

pub use config::{FeatureFlagConfig, FlagFile, Stage, CONFIG_FILE_NAME};
pub use error::{BackendError, QuarryError, Result};
pub use types::{FusedResult, RetrievalHit, Source};
