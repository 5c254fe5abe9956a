//! Error types for the mental health ETL pipeline.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for pipeline stages.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration and generation errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("record count {requested} exceeds the maximum of {max}")]
    InvalidRecordCount { requested: usize, max: usize },

    #[error("sampling setup failed: {0}")]
    Sampling(String),

    // Input contract errors (20-29)
    #[error("input artifact not found: {}", path.display())]
    ArtifactMissing { path: PathBuf },

    #[error("artifact {} is missing required column '{column}'", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("artifact {} is malformed: {message}", path.display())]
    MalformedArtifact { path: PathBuf, message: String },

    // Domain errors (30-39)
    #[error("row {row}: value '{value}' is outside the domain of column '{column}'")]
    OutOfDomain {
        column: String,
        value: String,
        row: u64,
    },

    #[error("row {row}: id sequence broken, expected {expected}, found {found}")]
    IdSequence { row: u64, expected: u64, found: u64 },

    // Persistence errors (40-49)
    #[error("persistence failed: {0}")]
    Persistence(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Error taxonomy used by callers to decide how to react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Sampling or configuration is invalid.
    Generation,
    /// A required input artifact is missing, unreadable, or lacks columns.
    InputContract,
    /// A value falls outside its declared closed set or numeric range.
    Domain,
    /// Writing the output artifact failed.
    Persistence,
    /// Underlying I/O failure.
    Io,
}

impl Error {
    /// Returns the error code for this error type.
    /// Used for detailed error reporting and process exit codes.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidRecordCount { .. } => 11,
            Error::Sampling(_) => 12,
            Error::ArtifactMissing { .. } => 20,
            Error::MissingColumn { .. } => 21,
            Error::MalformedArtifact { .. } => 22,
            Error::OutOfDomain { .. } => 30,
            Error::IdSequence { .. } => 31,
            Error::Persistence(_) => 40,
            Error::Io(_) => 60,
        }
    }

    /// Returns the taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) | Error::InvalidRecordCount { .. } | Error::Sampling(_) => {
                ErrorKind::Generation
            }
            Error::ArtifactMissing { .. }
            | Error::MissingColumn { .. }
            | Error::MalformedArtifact { .. } => ErrorKind::InputContract,
            Error::OutOfDomain { .. } | Error::IdSequence { .. } => ErrorKind::Domain,
            Error::Persistence(_) => ErrorKind::Persistence,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether a driver may retry the failed stage.
    ///
    /// Only transient I/O conditions qualify; contract and domain errors
    /// will fail identically on every attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}
