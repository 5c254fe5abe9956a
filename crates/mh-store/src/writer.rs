//! Batched Parquet writer.
//!
//! Rows are buffered and flushed as Arrow record batches. Output goes to a
//! sibling `*.tmp` file that is fsynced and renamed over the final path only
//! in [`BatchedWriter::finish`]; a writer dropped before `finish` removes its
//! temp file, so a failed write never leaves a complete-looking artifact.

use crate::schema::final_schema_ref;
use crate::{DEFAULT_BATCH_SIZE, DEFAULT_ROW_GROUP_SIZE};
use arrow::array::{ArrayRef, Float64Array, StringArray, UInt32Array, UInt64Array, UInt8Array};
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use mh_common::EnrichedRecord;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from Parquet writing.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("writer already finished")]
    Finished,
}

impl From<WriteError> for mh_common::Error {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::Io(e) => mh_common::Error::Io(e),
            other => mh_common::Error::Persistence(other.to_string()),
        }
    }
}

/// Compression codec for Parquet pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionKind {
    #[default]
    Zstd,
    Snappy,
    Uncompressed,
}

impl CompressionKind {
    fn to_parquet(self) -> Compression {
        match self {
            CompressionKind::Zstd => Compression::ZSTD(ZstdLevel::default()),
            CompressionKind::Snappy => Compression::SNAPPY,
            CompressionKind::Uncompressed => Compression::UNCOMPRESSED,
        }
    }
}

/// Writer configuration.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Rows buffered before a record batch is flushed.
    pub batch_size: usize,

    /// Maximum rows per Parquet row group.
    pub max_row_group_size: usize,

    pub compression: CompressionKind,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_row_group_size: DEFAULT_ROW_GROUP_SIZE,
            compression: CompressionKind::default(),
        }
    }
}

impl WriterConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_compression(mut self, compression: CompressionKind) -> Self {
        self.compression = compression;
        self
    }

    fn properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression.to_parquet())
            .set_max_row_group_size(self.max_row_group_size.max(1))
            .build()
    }
}

/// Summary of a committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteStats {
    pub path: PathBuf,
    pub rows: usize,
    pub batches: usize,
}

/// Convert records into one Arrow batch with the final schema.
pub fn records_to_batch(
    schema: &SchemaRef,
    records: &[EnrichedRecord],
) -> Result<RecordBatch, ArrowError> {
    let labels = |label: fn(&EnrichedRecord) -> &'static str| -> ArrayRef {
        Arc::new(StringArray::from_iter_values(records.iter().map(label)))
    };
    let ids = UInt64Array::from_iter_values(records.iter().map(|r| r.id));
    let ages = UInt32Array::from_iter_values(records.iter().map(|r| r.age));
    let stress = UInt8Array::from_iter_values(records.iter().map(|r| r.stress_level));
    let sleep = Float64Array::from_iter_values(records.iter().map(|r| r.sleep_hours));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(ids),
        Arc::new(ages),
        labels(|r| r.gender.label()),
        labels(|r| r.sector.label()),
        Arc::new(stress),
        labels(|r| r.stress_source.label()),
        labels(|r| r.destress_method.label()),
        Arc::new(sleep),
        labels(|r| r.age_group.label()),
        labels(|r| r.risk_category.label()),
    ];
    RecordBatch::try_new(schema.clone(), columns)
}

/// Buffered Parquet writer with atomic commit.
pub struct BatchedWriter {
    final_path: PathBuf,
    tmp_path: PathBuf,
    schema: SchemaRef,
    config: WriterConfig,
    writer: Option<ArrowWriter<File>>,
    buffer: Vec<EnrichedRecord>,
    rows: usize,
    batches: usize,
    committed: bool,
}

impl BatchedWriter {
    /// Open a writer targeting `path`. Parent directories are created.
    pub fn create(path: &Path, config: WriterConfig) -> Result<Self, WriteError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = tmp_path_for(path);
        let file = File::create(&tmp_path)?;
        let schema = final_schema_ref();
        let writer = ArrowWriter::try_new(file, schema.clone(), Some(config.properties()))?;

        debug!(path = %tmp_path.display(), "parquet writer opened");

        Ok(Self {
            final_path: path.to_path_buf(),
            tmp_path,
            schema,
            buffer: Vec::with_capacity(config.batch_size),
            config,
            writer: Some(writer),
            rows: 0,
            batches: 0,
            committed: false,
        })
    }

    /// Buffer one record, flushing when the batch is full.
    pub fn write(&mut self, record: EnrichedRecord) -> Result<(), WriteError> {
        self.buffer.push(record);
        if self.buffer.len() >= self.config.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Buffer every record from `records`.
    pub fn write_all<I>(&mut self, records: I) -> Result<(), WriteError>
    where
        I: IntoIterator<Item = EnrichedRecord>,
    {
        for record in records {
            self.write(record)?;
        }
        Ok(())
    }

    /// Flush buffered rows as a record batch.
    pub fn flush(&mut self) -> Result<(), WriteError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let writer = self.writer.as_mut().ok_or(WriteError::Finished)?;
        let batch = records_to_batch(&self.schema, &self.buffer)?;
        writer.write(&batch)?;
        self.rows += batch.num_rows();
        self.batches += 1;
        debug!(rows = batch.num_rows(), total = self.rows, "parquet batch flushed");
        self.buffer.clear();
        Ok(())
    }

    /// Flush, close the file footer, fsync, and rename over the final path.
    pub fn finish(mut self) -> Result<WriteStats, WriteError> {
        self.flush()?;
        let writer = self.writer.take().ok_or(WriteError::Finished)?;
        writer.close()?;

        File::open(&self.tmp_path)?.sync_all()?;
        fs::rename(&self.tmp_path, &self.final_path)?;
        self.committed = true;

        info!(
            path = %self.final_path.display(),
            rows = self.rows,
            batches = self.batches,
            "parquet artifact committed"
        );

        Ok(WriteStats {
            path: self.final_path.clone(),
            rows: self.rows,
            batches: self.batches,
        })
    }
}

impl Drop for BatchedWriter {
    fn drop(&mut self) {
        if !self.committed && self.tmp_path.exists() {
            if let Err(e) = fs::remove_file(&self.tmp_path) {
                warn!(
                    error = %e,
                    path = %self.tmp_path.display(),
                    "failed to remove temp parquet file"
                );
            }
        }
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
