//! Exit codes for the mh-etl CLI.
//!
//! Exit codes communicate the failing stage class without requiring output
//! parsing. They are stable.

use mh_common::{Error, ErrorKind};

/// Exit codes for mh-etl operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Every requested stage completed
    Clean = 0,

    /// Configuration could not be resolved or validated
    ConfigError = 10,

    /// Sampling failed or the record count was rejected
    GenerationError = 11,

    /// Input artifact missing, unreadable, or lacking columns
    InputContractError = 12,

    /// Value outside its closed set or numeric range
    DomainError = 13,

    /// Output artifact could not be written
    PersistenceError = 14,

    /// Report consumer found no final artifact
    ArtifactMissing = 15,

    /// I/O error
    IoError = 16,

    /// Internal/unknown error
    InternalError = 99,
}

impl ExitCode {
    /// Map a stage error onto its exit code.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::Config(_) => ExitCode::ConfigError,
            other => match other.kind() {
                ErrorKind::Generation => ExitCode::GenerationError,
                ErrorKind::InputContract => ExitCode::InputContractError,
                ErrorKind::Domain => ExitCode::DomainError,
                ErrorKind::Persistence => ExitCode::PersistenceError,
                ErrorKind::Io => ExitCode::IoError,
            },
        }
    }

    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
