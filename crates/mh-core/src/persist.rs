//! Columnar persistence of the enriched dataset.

use crate::artifact;
use crate::transform::check_id_sequence;
use mh_common::{EnrichedRecord, Result, ENRICHED_COLUMNS};
use mh_config::PipelineConfig;
use mh_store::{BatchedWriter, WriteStats, WriterConfig};
use std::path::{Path, PathBuf};
use tracing::info;

/// Persist the enriched artifact as Parquet with default writer settings.
pub fn persist(config: &PipelineConfig, enriched_path: &Path) -> Result<PathBuf> {
    persist_with(config, enriched_path, WriterConfig::default())
}

/// Persist the enriched artifact using explicit writer settings.
///
/// On any failure the final path is removed so no successful-looking
/// artifact survives.
pub fn persist_with(
    config: &PipelineConfig,
    enriched_path: &Path,
    writer_config: WriterConfig,
) -> Result<PathBuf> {
    let path = config.final_path();
    info!(input = %enriched_path.display(), output = %path.display(), "persisting dataset");

    let result = artifact::read_csv::<EnrichedRecord>(enriched_path, &ENRICHED_COLUMNS)
        .and_then(|records| {
            check_id_sequence(records.iter().map(|r| r.id))?;
            write_parquet(&path, records, writer_config)
        });

    match result {
        Ok(stats) => {
            info!(
                rows = stats.rows,
                batches = stats.batches,
                path = %path.display(),
                "final dataset written"
            );
            Ok(path)
        }
        Err(e) => {
            artifact::discard(&path);
            Err(e)
        }
    }
}

fn write_parquet(
    path: &Path,
    records: Vec<EnrichedRecord>,
    writer_config: WriterConfig,
) -> Result<WriteStats> {
    let mut writer = BatchedWriter::create(path, writer_config)?;
    writer.write_all(records)?;
    Ok(writer.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{generate, transform};
    use mh_common::{Error, ErrorKind};
    use std::fs;
    use tempfile::TempDir;

    fn config(dir: &TempDir, records: usize) -> PipelineConfig {
        PipelineConfig::new(records, 42, dir.path())
    }

    #[test]
    fn test_persist_roundtrips_enriched_rows() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, 120);
        let raw = generate(&cfg).unwrap();
        let enriched = transform(&cfg, &raw).unwrap();

        let final_path = persist_with(&cfg, &enriched, WriterConfig::default().with_batch_size(50))
            .unwrap();
        assert_eq!(final_path, cfg.final_path());

        let expected: Vec<EnrichedRecord> =
            artifact::read_csv(&enriched, &ENRICHED_COLUMNS).unwrap();
        let stored = mh_store::read_records(&final_path).unwrap();
        assert_eq!(stored, expected);
    }

    #[test]
    fn test_missing_input_is_input_contract_error() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, 10);
        let err = persist(&cfg, &cfg.enriched_path()).unwrap_err();
        assert!(matches!(err, Error::ArtifactMissing { .. }));
        assert_eq!(err.kind(), ErrorKind::InputContract);
        assert!(!cfg.final_path().exists());
    }

    #[test]
    fn test_missing_derived_column_removes_stale_output() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, 10);
        fs::write(cfg.final_path(), b"stale").unwrap();
        let header = ENRICHED_COLUMNS[..ENRICHED_COLUMNS.len() - 1].join(",");
        fs::write(cfg.enriched_path(), header + "\n").unwrap();

        let err = persist(&cfg, &cfg.enriched_path()).unwrap_err();
        match err {
            Error::MissingColumn { column, .. } => assert_eq!(column, "risk_category"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!cfg.final_path().exists());
    }

    #[test]
    fn test_empty_dataset_persists_schema() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, 0);
        let raw = generate(&cfg).unwrap();
        let enriched = transform(&cfg, &raw).unwrap();
        let final_path = persist(&cfg, &enriched).unwrap();

        let table = mh_store::read_table(&final_path).unwrap();
        assert_eq!(table.num_rows(), 0);
        assert_eq!(table.column_names(), ENRICHED_COLUMNS.to_vec());
    }
}
