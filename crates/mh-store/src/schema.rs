//! Arrow schema for the final table.
//!
//! Column names and order follow `mh_common::ENRICHED_COLUMNS`. Categorical
//! columns are stored as UTF-8 labels; Parquet dictionary-encodes them on
//! disk.

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use mh_common::schema::{
    COL_AGE, COL_AGE_GROUP, COL_DESTRESS_METHOD, COL_GENDER, COL_ID, COL_RISK_CATEGORY, COL_SECTOR,
    COL_SLEEP_HOURS, COL_STRESS_LEVEL, COL_STRESS_SOURCE,
};
use mh_common::SCHEMA_VERSION;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Schema metadata key holding the artifact schema version.
pub const METADATA_SCHEMA_VERSION: &str = "mh.schema_version";

/// Schema metadata key holding the table name.
pub const METADATA_TABLE: &str = "mh.table";

/// Tables written by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    MentalHealthFinal,
}

impl TableName {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::MentalHealthFinal => "mental_health_final",
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema of the final enriched table.
pub fn final_schema() -> Schema {
    let fields = vec![
        Field::new(COL_ID, DataType::UInt64, false),
        Field::new(COL_AGE, DataType::UInt32, false),
        Field::new(COL_GENDER, DataType::Utf8, false),
        Field::new(COL_SECTOR, DataType::Utf8, false),
        Field::new(COL_STRESS_LEVEL, DataType::UInt8, false),
        Field::new(COL_STRESS_SOURCE, DataType::Utf8, false),
        Field::new(COL_DESTRESS_METHOD, DataType::Utf8, false),
        Field::new(COL_SLEEP_HOURS, DataType::Float64, false),
        Field::new(COL_AGE_GROUP, DataType::Utf8, false),
        Field::new(COL_RISK_CATEGORY, DataType::Utf8, false),
    ];

    let metadata = HashMap::from([
        (METADATA_SCHEMA_VERSION.to_string(), SCHEMA_VERSION.to_string()),
        (
            METADATA_TABLE.to_string(),
            TableName::MentalHealthFinal.as_str().to_string(),
        ),
    ]);

    Schema::new_with_metadata(fields, metadata)
}

/// Shared reference to [`final_schema`].
pub fn final_schema_ref() -> SchemaRef {
    Arc::new(final_schema())
}
