//! Sequential pipeline driver.
//!
//! Runs generate, transform and persist in order, handing each stage's
//! output path to the next as an explicit argument. A stage that fails with
//! a retryable error is re-run up to `max_retries` times after a fixed
//! delay; any other error aborts the run.

use crate::{generate, persist, transform};
use chrono::{DateTime, Utc};
use mh_common::{Error, RunId};
use mh_config::{PipelineConfig, RetrySettings};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, info_span, warn};

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Generate,
    Transform,
    Persist,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Generate => "generate",
            Stage::Transform => "transform",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            retry_delay: settings.retry_delay(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

/// Result of one successful stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub attempts: u32,
    pub output: PathBuf,
    pub elapsed_ms: u64,
}

/// Result of a successful pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub run_id: RunId,
    pub record_count: usize,
    pub raw_path: PathBuf,
    pub enriched_path: PathBuf,
    pub final_path: PathBuf,
    pub stages: Vec<StageReport>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// A stage failed after exhausting its attempts or on a fatal error.
#[derive(Debug, Error)]
#[error("stage '{stage}' failed after {attempts} attempt(s): {source}")]
pub struct PipelineError {
    pub stage: Stage,
    pub attempts: u32,
    #[source]
    pub source: Error,
}

/// Run `op` under `policy`, retrying only retryable errors.
pub fn run_stage<F>(
    stage: Stage,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<StageReport, PipelineError>
where
    F: FnMut() -> mh_common::Result<PathBuf>,
{
    let started = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match op() {
            Ok(output) => {
                let elapsed_ms = elapsed_ms(started);
                info!(%stage, attempt, elapsed_ms, output = %output.display(), "stage complete");
                return Ok(StageReport {
                    stage,
                    attempts: attempt,
                    output,
                    elapsed_ms,
                });
            }
            Err(ref err) if err.is_retryable() && attempt <= policy.max_retries => {
                warn!(
                    %stage,
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = policy.retry_delay.as_millis() as u64,
                    code = err.code(),
                    error = %err,
                    "retryable error, will retry"
                );
                std::thread::sleep(policy.retry_delay);
            }
            Err(err) => {
                if err.is_retryable() {
                    error!(
                        %stage,
                        attempt,
                        code = err.code(),
                        error = %err,
                        "max retries exhausted"
                    );
                } else {
                    error!(%stage, code = err.code(), error = %err, "fatal stage error");
                }
                return Err(PipelineError {
                    stage,
                    attempts: attempt,
                    source: err,
                });
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Driver for a full generate, transform, persist run.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    policy: RetryPolicy,
}

impl Pipeline {
    /// Build a driver whose retry policy comes from `config.retry`.
    pub fn new(config: PipelineConfig) -> Self {
        let policy = RetryPolicy::from_settings(&config.retry);
        Self { config, policy }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn run(&self) -> Result<PipelineOutcome, PipelineError> {
        let run_id = RunId::new();
        let span = info_span!("pipeline", run_id = %run_id);
        let _guard = span.enter();

        let started_at = Utc::now();
        let started = Instant::now();
        info!(
            records = self.config.record_count,
            seed = self.config.seed,
            output_dir = %self.config.output_dir.display(),
            "pipeline started"
        );

        let config = &self.config;
        let policy = &self.policy;
        let generated = run_stage(Stage::Generate, policy, || generate(config))?;
        let raw_path = generated.output.clone();

        let transformed = run_stage(Stage::Transform, policy, || transform(config, &raw_path))?;
        let enriched_path = transformed.output.clone();

        let persisted = run_stage(Stage::Persist, policy, || persist(config, &enriched_path))?;
        let final_path = persisted.output.clone();

        let elapsed_ms = elapsed_ms(started);
        info!(elapsed_ms, final_path = %final_path.display(), "pipeline finished");

        Ok(PipelineOutcome {
            run_id,
            record_count: config.record_count,
            raw_path,
            enriched_path,
            final_path,
            stages: vec![generated, transformed, persisted],
            started_at,
            elapsed_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io;
    use tempfile::TempDir;

    fn io_error(kind: io::ErrorKind) -> Error {
        Error::Io(io::Error::new(kind, "transient"))
    }

    fn instant_retries(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            retry_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_transient_error_is_retried() {
        let calls = Cell::new(0u32);
        let report = run_stage(Stage::Generate, &instant_retries(1), || {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                Err(io_error(io::ErrorKind::Interrupted))
            } else {
                Ok(PathBuf::from("raw.csv"))
            }
        })
        .unwrap();

        assert_eq!(report.attempts, 2);
        assert_eq!(report.output, PathBuf::from("raw.csv"));
    }

    #[test]
    fn test_retries_are_bounded() {
        let calls = Cell::new(0u32);
        let err = run_stage(Stage::Persist, &instant_retries(2), || {
            calls.set(calls.get() + 1);
            Err(io_error(io::ErrorKind::TimedOut))
        })
        .unwrap_err();

        assert_eq!(calls.get(), 3);
        assert_eq!(err.attempts, 3);
        assert_eq!(err.stage, Stage::Persist);
    }

    #[test]
    fn test_fatal_error_is_not_retried() {
        let calls = Cell::new(0u32);
        let err = run_stage(Stage::Transform, &instant_retries(5), || {
            calls.set(calls.get() + 1);
            Err(Error::MissingColumn {
                path: PathBuf::from("raw.csv"),
                column: "sector".to_string(),
            })
        })
        .unwrap_err();

        assert_eq!(calls.get(), 1);
        assert_eq!(err.attempts, 1);
        assert!(err.to_string().contains("transform"));
    }

    #[test]
    fn test_policy_from_default_settings() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.retry_delay, Duration::from_secs(30));
    }

    #[test]
    fn test_full_run_hands_paths_forward() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::new(50, 42, dir.path());
        let outcome = Pipeline::new(config.clone())
            .with_policy(instant_retries(0))
            .run()
            .unwrap();

        assert_eq!(outcome.raw_path, config.raw_path());
        assert_eq!(outcome.enriched_path, config.enriched_path());
        assert_eq!(outcome.final_path, config.final_path());
        assert_eq!(outcome.stages.len(), 3);
        assert!(outcome.stages.iter().all(|s| s.attempts == 1));
        let stored = mh_store::read_records(&outcome.final_path).unwrap();
        assert_eq!(stored.len(), 50);
    }

    #[test]
    fn test_stage_serializes_snake_case() {
        let json = serde_json::to_string(&Stage::Persist).unwrap();
        assert_eq!(json, "\"persist\"");
    }
}
