//! mh-etl - mental health ETL pipeline CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};
use mh_config::{resolve_config, ConfigOverrides, PipelineConfig, ValidationError};
use mh_core::exit_codes::ExitCode;
use mh_core::logging::{self, LogFormat};
use mh_core::report::{self, ReportError};
use mh_core::{generate, persist, transform, Pipeline, PipelineError};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Parser)]
#[command(
    name = "mh-etl",
    version,
    about = "Synthetic workplace mental health dataset: generate, enrich, persist"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

#[derive(Args, Debug)]
struct GlobalOpts {
    /// Number of records to generate [env: MH_ETL_RECORDS]
    #[arg(long, global = true)]
    records: Option<usize>,

    /// RNG seed [env: MH_ETL_SEED]
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Directory holding every artifact [env: MH_ETL_OUTPUT_DIR]
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "MH_ETL_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Run generate, transform and persist in order
    Run,
    /// Generate the raw dataset
    Generate,
    /// Enrich a raw dataset with age groups and risk categories
    Transform {
        /// Raw CSV (default: <output-dir>/raw_mental_health.csv)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Persist an enriched dataset as Parquet
    Persist {
        /// Enriched CSV (default: <output-dir>/clean_mental_health.csv)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Verify the final artifact's columns and show sample values
    Inspect {
        /// Parquet file (default: <output-dir>/mental_health_final.parquet)
        #[arg(long)]
        path: Option<PathBuf>,
        /// Rows to sample
        #[arg(long, default_value_t = 5)]
        sample: usize,
    },
    /// Print the dashboard aggregates
    Summary {
        /// Parquet file (default: <output-dir>/mental_health_final.parquet)
        #[arg(long)]
        path: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Config(#[from] ValidationError),

    #[error(transparent)]
    Stage(#[from] mh_common::Error),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Config(_) => ExitCode::ConfigError,
            CliError::Stage(e) => ExitCode::from_error(e),
            CliError::Pipeline(e) => ExitCode::from_error(&e.source),
            CliError::Report(ReportError::MissingArtifact { .. }) => ExitCode::ArtifactMissing,
            CliError::Report(_) => ExitCode::InputContractError,
            CliError::Output(_) => ExitCode::InternalError,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    logging::init(&cli.global.log_level, cli.global.log_format);

    let code = match execute(cli) {
        Ok(()) => ExitCode::Clean,
        Err(err) => {
            let code = err.exit_code();
            error!(exit_code = code.as_i32(), "{err}");
            eprintln!("error: {err}");
            code
        }
    };
    std::process::exit(code.as_i32());
}

fn load_config(global: &GlobalOpts) -> Result<PipelineConfig, CliError> {
    let overrides = ConfigOverrides {
        record_count: global.records,
        seed: global.seed,
        output_dir: global.output_dir.clone(),
        config_file: global.config.clone(),
    };
    let resolved = resolve_config(&overrides)?;
    for warning in &resolved.warnings {
        warn!("{warning}");
    }
    debug!(
        records_from = ?resolved.record_count_source,
        seed_from = ?resolved.seed_source,
        output_dir_from = ?resolved.output_dir_source,
        "configuration loaded"
    );
    Ok(resolved.config)
}

fn execute(cli: Cli) -> Result<(), CliError> {
    let config = load_config(&cli.global)?;

    match cli.command {
        Commands::Run => {
            let outcome = Pipeline::new(config).run()?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Generate => {
            let path = generate(&config)?;
            println!("{}", path.display());
        }
        Commands::Transform { input } => {
            let input = input.unwrap_or_else(|| config.raw_path());
            let path = transform(&config, &input)?;
            println!("{}", path.display());
        }
        Commands::Persist { input } => {
            let input = input.unwrap_or_else(|| config.enriched_path());
            let path = persist(&config, &input)?;
            println!("{}", path.display());
        }
        Commands::Inspect { path, sample } => {
            let path = path.unwrap_or_else(|| config.final_path());
            let inspection = report::inspect(&path, sample)?;
            println!("path: {}", inspection.path.display());
            println!("rows: {}", inspection.rows);
            println!(
                "schema version: {}",
                inspection.schema_version.as_deref().unwrap_or("unrecorded")
            );
            if !inspection.schema_compatible {
                println!(
                    "WARNING schema version is not compatible with {}",
                    mh_common::SCHEMA_VERSION
                );
            }
            println!("columns: {}", inspection.columns.join(", "));
            if !inspection.is_complete() {
                for missing in &inspection.missing_columns {
                    println!("MISSING column: {missing}");
                }
            }
            if !inspection.sample.is_empty() {
                println!("{}", inspection.sample);
            }
        }
        Commands::Summary { path, format } => {
            let path = path.unwrap_or_else(|| config.final_path());
            let summary = report::summarize_artifact(&path)?;
            match format {
                OutputFormat::Text => print!("{summary}"),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
            }
        }
    }
    Ok(())
}
