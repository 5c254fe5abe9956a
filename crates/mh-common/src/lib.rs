//! Mental health ETL common types, IDs, and errors.
//!
//! This crate provides the data contract shared by every pipeline stage:
//! - Raw and enriched record types
//! - Closed categorical sets with stable labels
//! - Column layout and schema versioning
//! - The unified stage error type
//! - Run identifiers

pub mod error;
pub mod id;
pub mod record;
pub mod schema;

pub use error::{Error, ErrorKind, Result};
pub use id::RunId;
pub use record::{
    AgeGroup, DestressMethod, EnrichedRecord, Gender, RawRecord, RiskCategory, Sector,
    StressSource,
};
pub use schema::{ENRICHED_COLUMNS, RAW_COLUMNS, SCHEMA_VERSION};
