//! Mental health ETL configuration loading and validation.
//!
//! This crate provides:
//! - The typed `PipelineConfig` every stage receives
//! - Config resolution (CLI → env → file → defaults)
//! - Semantic validation with warnings

pub mod pipeline;
pub mod resolve;
pub mod validate;

pub use pipeline::{PipelineConfig, RetrySettings};
pub use resolve::{resolve_config, ConfigOverrides, ConfigSource, ResolvedConfig};
pub use validate::{ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// Upper bound on records per run.
pub const MAX_RECORD_COUNT: usize = 10_000_000;

/// Upper bound on driver retries per stage.
pub const MAX_RETRIES: u32 = 5;
