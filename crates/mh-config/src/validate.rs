//! Semantic validation for pipeline configuration.

use crate::pipeline::PipelineConfig;
use crate::{MAX_RECORD_COUNT, MAX_RETRIES};
use thiserror::Error;

/// Longest accepted delay between retries.
const MAX_RETRY_DELAY_SECS: u64 = 3600;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}

impl From<ValidationError> for mh_common::Error {
    fn from(err: ValidationError) -> Self {
        mh_common::Error::Config(err.to_string())
    }
}

/// Outcome of validating a config: hard errors plus advisory warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Return the first error, or the warnings when the config is valid.
    pub fn into_result(self) -> Result<Vec<String>, ValidationError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.warnings),
        }
    }
}

impl PipelineConfig {
    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.record_count > MAX_RECORD_COUNT {
            result.errors.push(ValidationError::InvalidValue {
                field: "record_count",
                message: format!("{} exceeds maximum {}", self.record_count, MAX_RECORD_COUNT),
            });
        } else if self.record_count == 0 {
            result
                .warnings
                .push("record_count is 0; the pipeline will produce empty artifacts".to_string());
        }

        if self.output_dir.as_os_str().is_empty() {
            result.errors.push(ValidationError::InvalidValue {
                field: "output_dir",
                message: "must not be empty".to_string(),
            });
        }

        if self.retry.max_retries > MAX_RETRIES {
            result.errors.push(ValidationError::InvalidValue {
                field: "retry.max_retries",
                message: format!("{} exceeds maximum {}", self.retry.max_retries, MAX_RETRIES),
            });
        }

        if self.retry.retry_delay_secs > MAX_RETRY_DELAY_SECS {
            result.errors.push(ValidationError::InvalidValue {
                field: "retry.retry_delay_secs",
                message: format!(
                    "{} exceeds maximum {}",
                    self.retry.retry_delay_secs, MAX_RETRY_DELAY_SECS
                ),
            });
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RetrySettings;

    #[test]
    fn test_default_config_is_valid() {
        let result = PipelineConfig::default().validate();
        assert!(result.is_ok());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_zero_records_warns_but_passes() {
        let result = PipelineConfig::new(0, 42, "out").validate();
        assert!(result.is_ok());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_oversized_record_count_rejected() {
        let result = PipelineConfig::new(MAX_RECORD_COUNT + 1, 42, "out").validate();
        assert!(matches!(
            result.into_result(),
            Err(ValidationError::InvalidValue {
                field: "record_count",
                ..
            })
        ));
    }

    #[test]
    fn test_retry_bounds_enforced() {
        let config = PipelineConfig::new(10, 42, "out").with_retry(RetrySettings {
            max_retries: 50,
            retry_delay_secs: 1,
        });
        let result = config.validate();
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_empty_output_dir_rejected() {
        let result = PipelineConfig::new(10, 42, "").validate();
        assert!(!result.is_ok());
    }

    #[test]
    fn test_converts_into_config_error() {
        let err: mh_common::Error = ValidationError::ParseError("bad".to_string()).into();
        assert_eq!(err.code(), 10);
    }
}
