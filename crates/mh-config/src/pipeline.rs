//! Pipeline configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default number of simulated employees.
pub const DEFAULT_RECORD_COUNT: usize = 6000;

/// Default random seed.
pub const DEFAULT_SEED: u64 = 42;

/// Default artifact directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "output_data";

/// Raw artifact file name.
pub const RAW_FILE_NAME: &str = "raw_mental_health.csv";

/// Enriched artifact file name.
pub const ENRICHED_FILE_NAME: &str = "clean_mental_health.csv";

/// Final columnar artifact file name.
pub const FINAL_FILE_NAME: &str = "mental_health_final.parquet";

/// Retry settings handed to the pipeline driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retries per stage after the first attempt.
    pub max_retries: u32,

    /// Fixed delay between attempts, in seconds.
    pub retry_delay_secs: u64,
}

impl RetrySettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 1,
            retry_delay_secs: 30,
        }
    }
}

/// Complete pipeline configuration.
///
/// Every stage is a function of this value and its input location, so the
/// same config drives the bundled driver or an external orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of records to generate. Zero yields a valid empty dataset.
    pub record_count: usize,

    /// Seed for the generator's RNG.
    pub seed: u64,

    /// Directory holding all three artifacts.
    pub output_dir: PathBuf,

    #[serde(default)]
    pub retry: RetrySettings,
}

impl PipelineConfig {
    pub fn new(record_count: usize, seed: u64, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            record_count,
            seed,
            output_dir: output_dir.into(),
            retry: RetrySettings::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    pub fn raw_path(&self) -> PathBuf {
        self.output_dir.join(RAW_FILE_NAME)
    }

    pub fn enriched_path(&self) -> PathBuf {
        self.output_dir.join(ENRICHED_FILE_NAME)
    }

    pub fn final_path(&self) -> PathBuf {
        self.output_dir.join(FINAL_FILE_NAME)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_RECORD_COUNT, DEFAULT_SEED, DEFAULT_OUTPUT_DIR)
    }
}
