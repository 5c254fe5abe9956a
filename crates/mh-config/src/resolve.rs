//! Config resolution: CLI → env → file → defaults.
//!
//! Each field is resolved independently, so a config file can pin the seed
//! while the record count still comes from the command line.

use crate::pipeline::{
    PipelineConfig, RetrySettings, DEFAULT_OUTPUT_DIR, DEFAULT_RECORD_COUNT, DEFAULT_SEED,
};
use crate::validate::ValidationError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the record count.
pub const ENV_RECORDS: &str = "MH_ETL_RECORDS";

/// Environment variable overriding the RNG seed.
pub const ENV_SEED: &str = "MH_ETL_SEED";

/// Environment variable overriding the output directory.
pub const ENV_OUTPUT_DIR: &str = "MH_ETL_OUTPUT_DIR";

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Cli,
    Env,
    File,
    Default,
}

/// Explicit values supplied by the caller (usually CLI flags).
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub record_count: Option<usize>,
    pub seed: Option<u64>,
    pub output_dir: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
}

/// On-disk config file. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    schema_version: Option<String>,
    #[serde(default)]
    record_count: Option<usize>,
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    output_dir: Option<PathBuf>,
    #[serde(default)]
    retry: Option<RetrySettings>,
}

impl ConfigFile {
    fn from_file(path: &Path) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let file: ConfigFile = serde_json::from_str(&content).map_err(|e| {
            ValidationError::ParseError(format!("Invalid JSON in {}: {}", path.display(), e))
        })?;
        if let Some(version) = &file.schema_version {
            if !version_compatible(version) {
                return Err(ValidationError::ParseError(format!(
                    "config schema version {} is not compatible with {}",
                    version,
                    crate::CONFIG_SCHEMA_VERSION
                )));
            }
        }
        Ok(file)
    }
}

fn version_compatible(version: &str) -> bool {
    let major = |v: &str| v.split('.').next().map(str::to_string);
    major(version) == major(crate::CONFIG_SCHEMA_VERSION)
}

/// A resolved config together with the provenance of each field.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: PipelineConfig,
    pub record_count_source: ConfigSource,
    pub seed_source: ConfigSource,
    pub output_dir_source: ConfigSource,
    pub warnings: Vec<String>,
}

/// Resolve config against the process environment.
pub fn resolve_config(overrides: &ConfigOverrides) -> Result<ResolvedConfig, ValidationError> {
    resolve_with_env(overrides, |key| std::env::var(key).ok())
}

/// Resolve config with an injectable environment lookup.
pub fn resolve_with_env<F>(
    overrides: &ConfigOverrides,
    env: F,
) -> Result<ResolvedConfig, ValidationError>
where
    F: Fn(&str) -> Option<String>,
{
    let file = match &overrides.config_file {
        Some(path) => ConfigFile::from_file(path)?,
        None => ConfigFile::default(),
    };

    let env_records = env_parsed::<usize>(&env, ENV_RECORDS, "a non-negative integer")?;
    let env_seed = env_parsed::<u64>(&env, ENV_SEED, "a non-negative integer")?;
    let env_output = env(ENV_OUTPUT_DIR)
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);

    let (record_count, record_count_source) = pick(
        overrides.record_count,
        env_records,
        file.record_count,
        DEFAULT_RECORD_COUNT,
    );
    let (seed, seed_source) = pick(overrides.seed, env_seed, file.seed, DEFAULT_SEED);
    let (output_dir, output_dir_source) = pick(
        overrides.output_dir.clone(),
        env_output,
        file.output_dir,
        PathBuf::from(DEFAULT_OUTPUT_DIR),
    );

    let config = PipelineConfig {
        record_count,
        seed,
        output_dir,
        retry: file.retry.unwrap_or_default(),
    };

    let warnings = config.validate().into_result()?;

    debug!(
        record_count,
        seed,
        ?record_count_source,
        ?seed_source,
        ?output_dir_source,
        "config resolved"
    );

    Ok(ResolvedConfig {
        config,
        record_count_source,
        seed_source,
        output_dir_source,
        warnings,
    })
}

fn env_parsed<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    expected: &str,
) -> Result<Option<T>, ValidationError> {
    match env(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse::<T>().map(Some).map_err(|_| {
                ValidationError::ParseError(format!("{key} must be {expected}, got '{raw}'"))
            })
        }
        _ => Ok(None),
    }
}

fn pick<T>(cli: Option<T>, env: Option<T>, file: Option<T>, default: T) -> (T, ConfigSource) {
    if let Some(v) = cli {
        (v, ConfigSource::Cli)
    } else if let Some(v) = env {
        (v, ConfigSource::Env)
    } else if let Some(v) = file {
        (v, ConfigSource::File)
    } else {
        (default, ConfigSource::Default)
    }
}
