//! CSV artifacts exchanged between stages.
//!
//! Writes are atomic: rows go to a sibling `*.tmp` file which is fsynced and
//! then renamed over the final path. Reads check the header against the
//! required columns before any row is decoded, so a missing column is
//! reported as such rather than as a row-level parse failure.

use mh_common::{record, Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Temp file that is removed on drop unless committed.
struct PendingFile {
    tmp_path: PathBuf,
    final_path: PathBuf,
    committed: bool,
}

impl PendingFile {
    fn new(final_path: &Path) -> Self {
        let mut name = final_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        Self {
            tmp_path: final_path.with_file_name(name),
            final_path: final_path.to_path_buf(),
            committed: false,
        }
    }

    fn commit(mut self) -> io::Result<()> {
        fs::rename(&self.tmp_path, &self.final_path)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if !self.committed && self.tmp_path.exists() {
            if let Err(e) = fs::remove_file(&self.tmp_path) {
                warn!(
                    error = %e,
                    path = %self.tmp_path.display(),
                    "failed to remove temp artifact"
                );
            }
        }
    }
}

/// Write `rows` under an explicit header, atomically replacing `path`.
///
/// The header is written even when `rows` is empty, so an empty dataset
/// still carries its schema.
pub fn write_csv<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let pending = PendingFile::new(path);
    let file = File::create(&pending.tmp_path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::new(file));

    writer.write_record(header).map_err(write_error)?;
    for row in rows {
        writer.serialize(row).map_err(write_error)?;
    }
    writer.flush()?;

    let buffered = writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))?;
    let file = buffered
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))?;
    file.sync_all()?;

    pending.commit()?;
    debug!(path = %path.display(), rows = rows.len(), "csv artifact committed");
    Ok(())
}

/// Read every row of a CSV artifact after checking `required` columns.
///
/// Columns are matched by header name, with surrounding whitespace in the
/// header ignored; extra columns are ignored. Categorical values outside
/// their closed set are reported as `OutOfDomain`. Row numbers in errors are
/// zero-based data rows.
pub fn read_csv<T: DeserializeOwned>(path: &Path, required: &[&str]) -> Result<Vec<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::ArtifactMissing {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(BufReader::new(file));

    let headers = reader
        .headers()
        .map_err(|e| read_error(path, e))?
        .clone();

    if let Some(column) = mh_common::schema::first_missing_column(required, headers.iter()) {
        return Err(Error::MissingColumn {
            path: path.to_path_buf(),
            column: column.to_string(),
        });
    }

    let checked: Vec<(usize, &str)> = headers
        .iter()
        .enumerate()
        .filter(|(_, name)| required.contains(name))
        .collect();

    let mut rows = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result.map_err(|e| read_error(path, e))?;
        check_labels(&checked, &record, row as u64)?;
        let value = record
            .deserialize::<T>(Some(&headers))
            .map_err(|e| decode_error(path, &headers, &record, row as u64, e))?;
        rows.push(value);
    }

    debug!(path = %path.display(), rows = rows.len(), "csv artifact loaded");
    Ok(rows)
}

/// Remove a stale artifact left by an earlier run.
pub fn discard(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => warn!(path = %path.display(), "removed stale artifact after stage failure"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(error = %e, path = %path.display(), "failed to remove stale artifact"),
    }
}

fn write_error(err: csv::Error) -> Error {
    match err.into_kind() {
        csv::ErrorKind::Io(e) => Error::Io(e),
        other => Error::Persistence(format!("csv encoding failed: {other:?}")),
    }
}

fn read_error(path: &Path, err: csv::Error) -> Error {
    if err.is_io_error() {
        if let csv::ErrorKind::Io(e) = err.into_kind() {
            return Error::Io(e);
        }
        return Error::MalformedArtifact {
            path: path.to_path_buf(),
            message: "unreadable".to_string(),
        };
    }
    Error::MalformedArtifact {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn check_labels(columns: &[(usize, &str)], fields: &csv::StringRecord, row: u64) -> Result<()> {
    for &(index, column) in columns {
        let value = fields.get(index).unwrap_or_default();
        if let Some(Err(_)) = record::check_label(column, value) {
            return Err(Error::OutOfDomain {
                column: column.to_string(),
                value: value.to_string(),
                row,
            });
        }
    }
    Ok(())
}

fn decode_error(
    path: &Path,
    headers: &csv::StringRecord,
    record: &csv::StringRecord,
    row: u64,
    err: csv::Error,
) -> Error {
    let field = match err.kind() {
        csv::ErrorKind::Deserialize { err, .. } => err.field(),
        _ => None,
    };

    match field {
        Some(index) => {
            let index = index as usize;
            Error::OutOfDomain {
                column: headers.get(index).unwrap_or("?").to_string(),
                value: record.get(index).unwrap_or_default().to_string(),
                row,
            }
        }
        None => Error::MalformedArtifact {
            path: path.to_path_buf(),
            message: format!("row {row}: {err}"),
        },
    }
}
