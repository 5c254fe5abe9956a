//! Mental health ETL columnar storage.
//!
//! This crate provides:
//! - The Arrow schema of the final enriched table
//! - Batched, atomically committed Parquet writer with compression
//! - Parquet reader with strict and column-level decoding

pub mod reader;
pub mod schema;
pub mod writer;

pub use reader::{column, parse_label, read_records, read_table, ParquetTable, ReadError};
pub use schema::{
    final_schema, final_schema_ref, TableName, METADATA_SCHEMA_VERSION, METADATA_TABLE,
};
pub use writer::{
    records_to_batch, BatchedWriter, CompressionKind, WriteError, WriteStats, WriterConfig,
};

/// Default batch size for buffered writes.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default maximum rows per Parquet row group.
pub const DEFAULT_ROW_GROUP_SIZE: usize = 64 * 1024;
