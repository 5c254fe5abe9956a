//! Parquet reader for the final table.

use crate::schema::METADATA_SCHEMA_VERSION;
use arrow::array::{Array, Float64Array, StringArray, UInt32Array, UInt64Array, UInt8Array};
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use mh_common::schema::{
    COL_AGE, COL_AGE_GROUP, COL_DESTRESS_METHOD, COL_GENDER, COL_ID, COL_RISK_CATEGORY, COL_SECTOR,
    COL_SLEEP_HOURS, COL_STRESS_LEVEL, COL_STRESS_SOURCE,
};
use mh_common::EnrichedRecord;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::errors::ParquetError;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Errors from Parquet reading and decoding.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("parquet artifact not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("missing column '{0}'")]
    MissingColumn(String),

    #[error("column '{column}' has type {actual}, expected {expected}")]
    ColumnType {
        column: String,
        expected: &'static str,
        actual: String,
    },

    #[error("row {row}: value '{value}' is outside the domain of column '{column}'")]
    OutOfDomain {
        column: String,
        value: String,
        row: u64,
    },
}

/// A fully loaded Parquet file.
#[derive(Debug, Clone)]
pub struct ParquetTable {
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
}

impl ParquetTable {
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name().to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.schema.column_with_name(name).is_some()
    }

    /// Schema version recorded by the writer, if any.
    pub fn schema_version(&self) -> Option<&str> {
        self.schema
            .metadata()
            .get(METADATA_SCHEMA_VERSION)
            .map(String::as_str)
    }
}

/// Load every batch of a Parquet file.
pub fn read_table(path: &Path) -> Result<ParquetTable, ReadError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ReadError::Missing(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    debug!(path = %path.display(), batches = batches.len(), "parquet table loaded");

    Ok(ParquetTable { schema, batches })
}

/// Load a Parquet file and decode every row into an [`EnrichedRecord`].
pub fn read_records(path: &Path) -> Result<Vec<EnrichedRecord>, ReadError> {
    let table = read_table(path)?;
    let mut records = Vec::with_capacity(table.num_rows());
    let mut offset = 0u64;
    for batch in &table.batches {
        records.extend(decode_batch(batch, offset)?);
        offset += batch.num_rows() as u64;
    }
    Ok(records)
}

/// Look up a column by name and downcast it to a concrete array type.
pub fn column<'a, T: Array + 'static>(
    batch: &'a RecordBatch,
    name: &str,
) -> Result<&'a T, ReadError> {
    let col = batch
        .column_by_name(name)
        .ok_or_else(|| ReadError::MissingColumn(name.to_string()))?;
    col.as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| ReadError::ColumnType {
            column: name.to_string(),
            expected: std::any::type_name::<T>(),
            actual: col.data_type().to_string(),
        })
}

/// Parse a label column value into its closed set.
pub fn parse_label<T: FromStr>(
    array: &StringArray,
    column: &str,
    index: usize,
    row: u64,
) -> Result<T, ReadError> {
    let value = array.value(index);
    value.parse::<T>().map_err(|_| ReadError::OutOfDomain {
        column: column.to_string(),
        value: value.to_string(),
        row,
    })
}

fn decode_batch(batch: &RecordBatch, offset: u64) -> Result<Vec<EnrichedRecord>, ReadError> {
    let ids = column::<UInt64Array>(batch, COL_ID)?;
    let ages = column::<UInt32Array>(batch, COL_AGE)?;
    let genders = column::<StringArray>(batch, COL_GENDER)?;
    let sectors = column::<StringArray>(batch, COL_SECTOR)?;
    let stress = column::<UInt8Array>(batch, COL_STRESS_LEVEL)?;
    let sources = column::<StringArray>(batch, COL_STRESS_SOURCE)?;
    let methods = column::<StringArray>(batch, COL_DESTRESS_METHOD)?;
    let sleep = column::<Float64Array>(batch, COL_SLEEP_HOURS)?;
    let age_groups = column::<StringArray>(batch, COL_AGE_GROUP)?;
    let risks = column::<StringArray>(batch, COL_RISK_CATEGORY)?;

    (0..batch.num_rows())
        .map(|i| {
            let row = offset + i as u64;
            Ok(EnrichedRecord {
                id: ids.value(i),
                age: ages.value(i),
                gender: parse_label(genders, COL_GENDER, i, row)?,
                sector: parse_label(sectors, COL_SECTOR, i, row)?,
                stress_level: stress.value(i),
                stress_source: parse_label(sources, COL_STRESS_SOURCE, i, row)?,
                destress_method: parse_label(methods, COL_DESTRESS_METHOD, i, row)?,
                sleep_hours: sleep.value(i),
                age_group: parse_label(age_groups, COL_AGE_GROUP, i, row)?,
                risk_category: parse_label(risks, COL_RISK_CATEGORY, i, row)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{BatchedWriter, CompressionKind, WriterConfig};
    use arrow::array::ArrayRef;
    use arrow::datatypes::{DataType, Field, Schema};
    use mh_common::{AgeGroup, DestressMethod, Gender, RiskCategory, Sector, StressSource};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn record(id: u64) -> EnrichedRecord {
        EnrichedRecord {
            id,
            age: 22 + (id % 43) as u32,
            gender: Gender::ALL[(id % 3) as usize],
            sector: Sector::ALL[(id % 6) as usize],
            stress_level: 1 + (id % 10) as u8,
            stress_source: StressSource::ALL[(id % 4) as usize],
            destress_method: DestressMethod::ALL[(id % 4) as usize],
            sleep_hours: 4.0 + id as f64 * 0.125,
            age_group: AgeGroup::ALL[(id % 4) as usize],
            risk_category: RiskCategory::ALL[(id % 3) as usize],
        }
    }

    #[test]
    fn test_roundtrip_preserves_order_and_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("final.parquet");
        let records: Vec<_> = (0..25).map(record).collect();

        let mut writer = BatchedWriter::create(
            &path,
            WriterConfig::default()
                .with_batch_size(7)
                .with_compression(CompressionKind::Snappy),
        )
        .unwrap();
        writer.write_all(records.clone()).unwrap();
        writer.finish().unwrap();

        let loaded = read_records(&path).unwrap();
        assert_eq!(loaded, records);

        let table = read_table(&path).unwrap();
        assert_eq!(table.num_rows(), 25);
        assert_eq!(table.schema_version(), Some(mh_common::SCHEMA_VERSION));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.parquet");
        let err = read_table(&path).unwrap_err();
        assert!(matches!(err, ReadError::Missing(ref missing) if *missing == path));
    }

    #[test]
    fn test_missing_column_detected() {
        let field = Field::new(COL_ID, DataType::UInt64, false);
        let schema = Arc::new(Schema::new(vec![field]));
        let ids: ArrayRef = Arc::new(UInt64Array::from(vec![0u64, 1]));
        let batch = RecordBatch::try_new(schema, vec![ids]).unwrap();

        let err = decode_batch(&batch, 0).unwrap_err();
        assert!(matches!(err, ReadError::MissingColumn(ref c) if c == COL_AGE));
    }

    #[test]
    fn test_wrong_column_type_detected() {
        let field = Field::new(COL_ID, DataType::Utf8, false);
        let schema = Arc::new(Schema::new(vec![field]));
        let ids: ArrayRef = Arc::new(StringArray::from(vec!["a"]));
        let batch = RecordBatch::try_new(schema, vec![ids]).unwrap();

        let err = column::<UInt64Array>(&batch, COL_ID).unwrap_err();
        assert!(matches!(err, ReadError::ColumnType { .. }));
    }

    #[test]
    fn test_unknown_label_is_out_of_domain() {
        let labels = StringArray::from(vec!["Mining"]);
        let err = parse_label::<Sector>(&labels, COL_SECTOR, 0, 12).unwrap_err();
        match err {
            ReadError::OutOfDomain { column, value, row } => {
                assert_eq!(column, COL_SECTOR);
                assert_eq!(value, "Mining");
                assert_eq!(row, 12);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
