//! Reader side of the final artifact.
//!
//! Dashboards consume only the Parquet table. They must tolerate a table
//! without a `gender` column, which is reported under the `unknown`
//! category, and they must turn a missing table into an actionable message
//! instead of a raw I/O failure.

use arrow::array::{Array, StringArray, UInt8Array};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use mh_common::schema::{
    COL_AGE_GROUP, COL_DESTRESS_METHOD, COL_GENDER, COL_RISK_CATEGORY, COL_SECTOR,
    COL_STRESS_LEVEL,
};
use mh_common::schema::is_compatible;
use mh_common::{AgeGroup, DestressMethod, Gender, RiskCategory, Sector, ENRICHED_COLUMNS};
use mh_store::{column, parse_label, read_table, ParquetTable, ReadError};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Columns a dashboard cannot work without.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    COL_SECTOR,
    COL_STRESS_LEVEL,
    COL_AGE_GROUP,
    COL_DESTRESS_METHOD,
    COL_RISK_CATEGORY,
];

/// Errors surfaced to report consumers.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("no final dataset at {}; run `mh-etl run` to build it first", path.display())]
    MissingArtifact { path: PathBuf },

    #[error("final dataset at {} has no '{column}' column", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("failed to read final dataset at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: ReadError,
    },
}

impl ReportError {
    fn from_read(path: &Path, err: ReadError) -> Self {
        match err {
            ReadError::Missing(missing) => ReportError::MissingArtifact { path: missing },
            ReadError::MissingColumn(column) => ReportError::MissingColumn {
                path: path.to_path_buf(),
                column,
            },
            source => ReportError::Read {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

/// Gender as seen by a report; `Unknown` when the column is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GenderLabel {
    Known(Gender),
    Unknown,
}

impl GenderLabel {
    pub const UNKNOWN: &'static str = "unknown";
}

impl fmt::Display for GenderLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenderLabel::Known(g) => f.pad(g.label()),
            GenderLabel::Unknown => f.pad(Self::UNKNOWN),
        }
    }
}

impl Serialize for GenderLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The subset of a final row that the dashboard charts use.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub sector: Sector,
    pub stress_level: u8,
    pub age_group: AgeGroup,
    pub gender: GenderLabel,
    pub destress_method: DestressMethod,
    pub risk_category: RiskCategory,
}

/// Load the final table and decode the report columns.
pub fn load_report_rows(path: &Path) -> Result<Vec<ReportRow>, ReportError> {
    let table = read_table(path).map_err(|e| ReportError::from_read(path, e))?;

    if let Some(missing) = REQUIRED_COLUMNS.iter().find(|c| !table.has_column(c)) {
        return Err(ReportError::MissingColumn {
            path: path.to_path_buf(),
            column: missing.to_string(),
        });
    }
    if !table.has_column(COL_GENDER) {
        warn!(
            path = %path.display(),
            "gender column absent, reporting as '{}'",
            GenderLabel::UNKNOWN
        );
    }

    let mut rows = Vec::with_capacity(table.num_rows());
    let mut offset = 0u64;
    for batch in &table.batches {
        decode_rows(batch, offset, &mut rows).map_err(|e| ReportError::from_read(path, e))?;
        offset += batch.num_rows() as u64;
    }
    debug!(path = %path.display(), rows = rows.len(), "report rows loaded");
    Ok(rows)
}

fn decode_rows(
    batch: &RecordBatch,
    offset: u64,
    out: &mut Vec<ReportRow>,
) -> Result<(), ReadError> {
    let sectors = column::<StringArray>(batch, COL_SECTOR)?;
    let stress = column::<UInt8Array>(batch, COL_STRESS_LEVEL)?;
    let age_groups = column::<StringArray>(batch, COL_AGE_GROUP)?;
    let methods = column::<StringArray>(batch, COL_DESTRESS_METHOD)?;
    let risks = column::<StringArray>(batch, COL_RISK_CATEGORY)?;
    let genders = match batch.column_by_name(COL_GENDER) {
        Some(_) => Some(column::<StringArray>(batch, COL_GENDER)?),
        None => None,
    };

    for i in 0..batch.num_rows() {
        let row = offset + i as u64;
        let gender = match genders {
            Some(array) if !array.is_null(i) => {
                GenderLabel::Known(parse_label(array, COL_GENDER, i, row)?)
            }
            _ => GenderLabel::Unknown,
        };
        out.push(ReportRow {
            sector: parse_label(sectors, COL_SECTOR, i, row)?,
            stress_level: stress.value(i),
            age_group: parse_label(age_groups, COL_AGE_GROUP, i, row)?,
            gender,
            destress_method: parse_label(methods, COL_DESTRESS_METHOD, i, row)?,
            risk_category: parse_label(risks, COL_RISK_CATEGORY, i, row)?,
        });
    }
    Ok(())
}

#[derive(Debug, Default, Clone, Copy)]
struct MeanAcc {
    sum: f64,
    count: usize,
}

impl MeanAcc {
    fn push(&mut self, value: u8) {
        self.sum += f64::from(value);
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Mean stress for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMean {
    pub label: String,
    pub count: usize,
    pub mean_stress: f64,
}

/// One cell of the age group by gender heatmap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixCell {
    pub age_group: AgeGroup,
    pub gender: GenderLabel,
    pub count: usize,
    pub mean_stress: f64,
}

/// Aggregates behind every dashboard chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub record_count: usize,
    pub overall_mean_stress: Option<f64>,
    /// In sector declaration order.
    pub stress_by_sector: Vec<GroupMean>,
    /// In generational order.
    pub stress_by_age_group: Vec<GroupMean>,
    pub stress_by_age_and_gender: Vec<MatrixCell>,
    /// Highest mean stress first.
    pub destress_by_stress: Vec<GroupMean>,
    /// Counts and mean stress per risk tier, High first.
    pub risk_distribution: Vec<GroupMean>,
}

fn group_means<K: Ord + fmt::Display>(groups: BTreeMap<K, MeanAcc>) -> Vec<GroupMean> {
    groups
        .into_iter()
        .map(|(key, acc)| GroupMean {
            label: key.to_string(),
            count: acc.count,
            mean_stress: acc.mean(),
        })
        .collect()
}

/// Aggregate report rows into chart series.
pub fn summarize(rows: &[ReportRow]) -> DashboardSummary {
    let mut overall = MeanAcc::default();
    let mut by_sector: BTreeMap<Sector, MeanAcc> = BTreeMap::new();
    let mut by_age: BTreeMap<AgeGroup, MeanAcc> = BTreeMap::new();
    let mut by_age_gender: BTreeMap<(AgeGroup, GenderLabel), MeanAcc> = BTreeMap::new();
    let mut by_method: BTreeMap<DestressMethod, MeanAcc> = BTreeMap::new();
    let mut by_risk: BTreeMap<RiskCategory, MeanAcc> = BTreeMap::new();

    for row in rows {
        overall.push(row.stress_level);
        by_sector
            .entry(row.sector)
            .or_default()
            .push(row.stress_level);
        by_age
            .entry(row.age_group)
            .or_default()
            .push(row.stress_level);
        by_age_gender
            .entry((row.age_group, row.gender))
            .or_default()
            .push(row.stress_level);
        by_method
            .entry(row.destress_method)
            .or_default()
            .push(row.stress_level);
        by_risk
            .entry(row.risk_category)
            .or_default()
            .push(row.stress_level);
    }

    let mut destress_by_stress = group_means(by_method);
    destress_by_stress.sort_by(|a, b| b.mean_stress.total_cmp(&a.mean_stress));

    DashboardSummary {
        record_count: rows.len(),
        overall_mean_stress: (overall.count > 0).then(|| overall.mean()),
        stress_by_sector: group_means(by_sector),
        stress_by_age_group: group_means(by_age),
        stress_by_age_and_gender: by_age_gender
            .into_iter()
            .map(|((age_group, gender), acc)| MatrixCell {
                age_group,
                gender,
                count: acc.count,
                mean_stress: acc.mean(),
            })
            .collect(),
        destress_by_stress,
        risk_distribution: group_means(by_risk),
    }
}

/// Load and aggregate the final artifact at `path`.
pub fn summarize_artifact(path: &Path) -> Result<DashboardSummary, ReportError> {
    let rows = load_report_rows(path)?;
    Ok(summarize(&rows))
}

fn write_series(f: &mut fmt::Formatter<'_>, title: &str, series: &[GroupMean]) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "{title}")?;
    for GroupMean { label, count, mean_stress } in series {
        writeln!(f, "  {label:<22} {mean_stress:>6.2}  (n={count})")?;
    }
    Ok(())
}

/// Plain-text rendering, one block per chart.
impl fmt::Display for DashboardSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "records: {}", self.record_count)?;
        match self.overall_mean_stress {
            Some(mean) => writeln!(f, "mean stress: {mean:.2}")?,
            None => writeln!(f, "mean stress: n/a")?,
        }

        write_series(f, "stress by sector", &self.stress_by_sector)?;
        write_series(f, "stress by age group", &self.stress_by_age_group)?;

        writeln!(f)?;
        writeln!(f, "stress by age group and gender")?;
        for cell in &self.stress_by_age_and_gender {
            let (age, gender, n) = (cell.age_group.label(), cell.gender, cell.count);
            let mean = cell.mean_stress;
            writeln!(f, "  {age:<22} {gender:<12} {mean:>6.2}  (n={n})")?;
        }

        write_series(f, "destress methods by stress", &self.destress_by_stress)?;
        write_series(f, "risk distribution", &self.risk_distribution)
    }
}

/// Structural check of the final artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectionReport {
    pub path: PathBuf,
    pub rows: usize,
    pub schema_version: Option<String>,
    /// False when the version is unrecorded or has a different major.
    pub schema_compatible: bool,
    pub columns: Vec<String>,
    pub missing_columns: Vec<String>,
    /// Leading rows of the `age_group` and `sector` columns, pretty-printed.
    pub sample: String,
}

impl InspectionReport {
    pub fn is_complete(&self) -> bool {
        self.missing_columns.is_empty()
    }
}

/// List the columns of the final artifact and show a few sample rows.
pub fn inspect(path: &Path, sample_rows: usize) -> Result<InspectionReport, ReportError> {
    let table = read_table(path).map_err(|e| ReportError::from_read(path, e))?;

    let missing_columns = ENRICHED_COLUMNS
        .iter()
        .filter(|c| !table.has_column(c))
        .map(|c| c.to_string())
        .collect();

    Ok(InspectionReport {
        path: path.to_path_buf(),
        rows: table.num_rows(),
        schema_version: table.schema_version().map(str::to_string),
        schema_compatible: table.schema_version().is_some_and(is_compatible),
        columns: table.column_names(),
        missing_columns,
        sample: sample_table(&table, sample_rows).map_err(|e| ReportError::from_read(path, e))?,
    })
}

fn sample_table(table: &ParquetTable, sample_rows: usize) -> Result<String, ReadError> {
    let Some(first) = table.batches.first() else {
        return Ok(String::new());
    };

    let indices: Vec<usize> = [COL_AGE_GROUP, COL_SECTOR]
        .iter()
        .filter_map(|name| first.schema().index_of(name).ok())
        .collect();
    if indices.is_empty() {
        return Ok(String::new());
    }

    let projected = first.project(&indices)?;
    let head = projected.slice(0, sample_rows.min(projected.num_rows()));
    Ok(pretty_format_batches(&[head])?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::ArrayRef;
    use arrow::datatypes::{DataType, Field, Schema};
    use mh_common::{EnrichedRecord, StressSource};
    use mh_store::{BatchedWriter, WriterConfig};
    use parquet::arrow::ArrowWriter;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn known(gender: Gender) -> GenderLabel {
        GenderLabel::Known(gender)
    }

    fn row(sector: Sector, stress: u8, age: AgeGroup, gender: GenderLabel) -> ReportRow {
        ReportRow {
            sector,
            stress_level: stress,
            age_group: age,
            gender,
            destress_method: DestressMethod::Nature,
            risk_category: RiskCategory::Moderate,
        }
    }

    fn record(id: u64, gender: Gender, sector: Sector, stress: u8) -> EnrichedRecord {
        EnrichedRecord {
            id,
            age: 35,
            gender,
            sector,
            stress_level: stress,
            stress_source: StressSource::Workload,
            destress_method: DestressMethod::Sport,
            sleep_hours: 7.0,
            age_group: AgeGroup::Millennials,
            risk_category: crate::transform::risk_category(stress).unwrap(),
        }
    }

    fn write_records(path: &Path, records: Vec<EnrichedRecord>) {
        let mut writer = BatchedWriter::create(path, WriterConfig::default()).unwrap();
        writer.write_all(records).unwrap();
        writer.finish().unwrap();
    }

    /// Bypasses the final schema so tests can drop columns.
    fn write_batch(path: &Path, batch: RecordBatch) {
        let file = std::fs::File::create(path).unwrap();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
    }

    fn table_without_gender() -> RecordBatch {
        let fields = vec![
            Field::new(COL_SECTOR, DataType::Utf8, false),
            Field::new(COL_STRESS_LEVEL, DataType::UInt8, false),
            Field::new(COL_AGE_GROUP, DataType::Utf8, false),
            Field::new(COL_DESTRESS_METHOD, DataType::Utf8, false),
            Field::new(COL_RISK_CATEGORY, DataType::Utf8, false),
        ];
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(vec!["Health", "Retail"])),
            Arc::new(UInt8Array::from(vec![9u8, 3])),
            Arc::new(StringArray::from(vec!["Gen Z (20-29)", "Boomers (50+)"])),
            Arc::new(StringArray::from(vec!["Sport", "Nature"])),
            Arc::new(StringArray::from(vec!["High", "Low"])),
        ];
        RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).unwrap()
    }

    #[test]
    fn test_missing_artifact_is_actionable() {
        let dir = TempDir::new().unwrap();
        let err = load_report_rows(&dir.path().join("mental_health_final.parquet")).unwrap_err();
        assert!(matches!(err, ReportError::MissingArtifact { .. }));
        assert!(err.to_string().contains("mh-etl run"));
    }

    #[test]
    fn test_missing_gender_becomes_unknown() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("final.parquet");
        write_batch(&path, table_without_gender());

        let rows = load_report_rows(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.gender == GenderLabel::Unknown));

        let summary = summarize(&rows);
        assert!(summary
            .stress_by_age_and_gender
            .iter()
            .all(|c| c.gender.to_string() == "unknown"));
    }

    #[test]
    fn test_missing_required_column_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("final.parquet");
        let batch = table_without_gender();
        let without_sector = batch.project(&[1, 2, 3, 4]).unwrap();
        write_batch(&path, without_sector);

        let err = load_report_rows(&path).unwrap_err();
        assert!(
            matches!(err, ReportError::MissingColumn { ref column, .. } if column == COL_SECTOR)
        );
    }

    #[test]
    fn test_summary_orders_series() {
        let rows = vec![
            row(Sector::Retail, 4, AgeGroup::Boomers, known(Gender::Male)),
            row(Sector::Health, 8, AgeGroup::GenZ, known(Gender::Female)),
            row(Sector::Health, 6, AgeGroup::GenZ, known(Gender::Female)),
        ];
        let summary = summarize(&rows);

        assert_eq!(summary.record_count, 3);
        assert_eq!(summary.overall_mean_stress, Some(6.0));

        let sectors: Vec<&str> = summary
            .stress_by_sector
            .iter()
            .map(|g| g.label.as_str())
            .collect();
        assert_eq!(sectors, vec!["Health", "Retail"]);
        assert_eq!(summary.stress_by_sector[0].mean_stress, 7.0);

        let ages: Vec<&str> = summary
            .stress_by_age_group
            .iter()
            .map(|g| g.label.as_str())
            .collect();
        assert_eq!(ages, vec!["Gen Z (20-29)", "Boomers (50+)"]);
        assert_eq!(summary.stress_by_age_and_gender.len(), 2);
    }

    #[test]
    fn test_destress_sorted_descending() {
        let mut rows = vec![
            row(Sector::Retail, 2, AgeGroup::GenX, GenderLabel::Unknown),
            row(Sector::Retail, 9, AgeGroup::GenX, GenderLabel::Unknown),
        ];
        rows[1].destress_method = DestressMethod::VideoGames;
        let summary = summarize(&rows);
        assert_eq!(summary.destress_by_stress[0].label, "Video games");
        assert_eq!(summary.destress_by_stress[1].label, "Nature");
    }

    #[test]
    fn test_empty_summary() {
        let summary = summarize(&[]);
        assert_eq!(summary.record_count, 0);
        assert_eq!(summary.overall_mean_stress, None);
        assert!(summary.to_string().contains("n/a"));
    }

    #[test]
    fn test_text_lists_every_chart() {
        let rows = vec![
            row(Sector::Health, 8, AgeGroup::GenZ, GenderLabel::Unknown),
            row(Sector::Retail, 4, AgeGroup::Boomers, known(Gender::Female)),
        ];
        let text = summarize(&rows).to_string();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "records: 2");
        assert_eq!(lines[1], "mean stress: 6.00");
        for title in [
            "stress by sector",
            "stress by age group",
            "stress by age group and gender",
            "destress methods by stress",
            "risk distribution",
        ] {
            assert!(lines.contains(&title), "missing block {title}");
        }
        let cell = "  Gen Z (20-29)          unknown        8.00  (n=1)";
        assert!(lines.contains(&cell));
    }

    #[test]
    fn test_summary_from_written_artifact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("final.parquet");
        write_records(
            &path,
            vec![
                record(0, Gender::NonBinary, Sector::Finance, 9),
                record(1, Gender::Male, Sector::Finance, 2),
            ],
        );

        let summary = summarize_artifact(&path).unwrap();
        let risks: Vec<(&str, usize)> = summary
            .risk_distribution
            .iter()
            .map(|g| (g.label.as_str(), g.count))
            .collect();
        assert_eq!(risks, vec![("High", 1), ("Low", 1)]);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["stress_by_age_and_gender"][0]["gender"], "Male");
        assert!(summary.to_string().contains("Finance"));
    }

    #[test]
    fn test_inspect_flags_missing_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("final.parquet");
        write_batch(&path, table_without_gender());

        let report = inspect(&path, 5).unwrap();
        assert_eq!(report.rows, 2);
        assert!(!report.is_complete());
        assert!(!report.schema_compatible);
        assert!(report.missing_columns.contains(&COL_GENDER.to_string()));
        assert!(report.sample.contains("Gen Z (20-29)"));
        assert!(report.sample.contains("Health"));
    }
}
