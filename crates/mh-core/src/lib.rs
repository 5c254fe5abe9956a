//! Mental health ETL core.
//!
//! Three stages, each a function of `(PipelineConfig, input path) -> output path`:
//!
//! ```text
//! generate  ──raw_mental_health.csv──▶  transform  ──clean_mental_health.csv──▶  persist
//!                                                                                  │
//!                                                         mental_health_final.parquet
//! ```
//!
//! The [`pipeline`] driver runs them in order with a bounded retry policy;
//! any other orchestrator can call the stage functions directly. The
//! [`report`] module is the reader side used by dashboards.

pub mod artifact;
pub mod exit_codes;
pub mod generate;
pub mod logging;
pub mod persist;
pub mod pipeline;
pub mod report;
pub mod transform;

pub use exit_codes::ExitCode;
pub use generate::{generate, generate_records};
pub use persist::persist;
pub use pipeline::{Pipeline, PipelineError, PipelineOutcome, RetryPolicy, Stage};
pub use transform::{age_group, risk_category, transform, transform_records};
