//! VitalSift CLI - Command-line interface for the export pipeline
//!
//! Commands:
//! - export: extract records from an XML export and write per-metric tables
//! - daily: reduce exported tables to per-day summaries
//! - weekly: reduce exported tables to per-week summaries
//! - intervals: report sampling cadence per exported table

use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use vitalsift::intervals;
use vitalsift::{
    aggregate_daily, aggregate_weekly, extract_and_export, PipelineConfig, PipelineError,
    RecoveryPolicy, PIPELINE_VERSION,
};

/// VitalSift - turn a wearable health export into per-metric tables and summaries
#[derive(Parser)]
#[command(name = "vitalsift")]
#[command(version = PIPELINE_VERSION)]
#[command(about = "Extract, filter and aggregate wearable health exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract records from an XML export and write per-metric CSV tables
    Export {
        /// Source XML document
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for per-metric tables
        #[arg(short, long, default_value = "export")]
        out_dir: PathBuf,

        /// Minimum record count a metric must exceed to be exported
        #[arg(long)]
        min_records: Option<usize>,

        /// Abort on the first malformed fragment instead of skipping it
        #[arg(long)]
        strict: bool,

        /// JSON configuration file (fields default when absent)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reduce exported tables to per-day summaries
    Daily {
        /// Directory holding exported tables
        #[arg(short, long, default_value = "export")]
        export_dir: PathBuf,

        /// Directory for summary tables
        #[arg(short, long, default_value = "aggregated")]
        out_dir: PathBuf,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reduce exported tables to per-week summaries
    Weekly {
        /// Directory holding exported tables
        #[arg(short, long, default_value = "export")]
        export_dir: PathBuf,

        /// Directory for summary tables
        #[arg(short, long, default_value = "aggregated")]
        out_dir: PathBuf,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report sampling cadence per exported table
    Intervals {
        /// Directory holding exported tables
        #[arg(short, long, default_value = "export")]
        export_dir: PathBuf,

        /// Print the summaries as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), SiftCliError> {
    match cli.command {
        Commands::Export {
            input,
            out_dir,
            min_records,
            strict,
            config,
            json,
        } => cmd_export(&input, &out_dir, min_records, strict, config.as_deref(), json),

        Commands::Daily {
            export_dir,
            out_dir,
            json,
        } => cmd_aggregate(Granularity::Daily, &export_dir, &out_dir, json),

        Commands::Weekly {
            export_dir,
            out_dir,
            json,
        } => cmd_aggregate(Granularity::Weekly, &export_dir, &out_dir, json),

        Commands::Intervals { export_dir, json } => cmd_intervals(&export_dir, json),
    }
}

fn cmd_export(
    input: &std::path::Path,
    out_dir: &std::path::Path,
    min_records: Option<usize>,
    strict: bool,
    config_path: Option<&std::path::Path>,
    json: bool,
) -> Result<(), SiftCliError> {
    let mut config = match config_path {
        Some(path) => PipelineConfig::from_json(&fs::read_to_string(path)?)?,
        None => PipelineConfig::default(),
    };
    if let Some(min) = min_records {
        config.min_record_count = min;
    }
    if strict {
        config.recovery = RecoveryPolicy::Strict;
    }

    let report = extract_and_export(input, out_dir, &config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Processed {} records ({} excluded, {} fragments skipped)",
            report.records_seen, report.records_excluded, report.skipped_fragments
        );
        println!(
            "Exported {} of {} metrics to {}",
            report.exported.len(),
            report.metrics_seen,
            out_dir.display()
        );
        for stem in &report.exported {
            println!("  {stem}.csv");
        }
        if !report.suppressed.is_empty() {
            println!("Suppressed (below threshold): {}", report.suppressed.join(", "));
        }
    }
    Ok(())
}

enum Granularity {
    Daily,
    Weekly,
}

fn cmd_aggregate(
    granularity: Granularity,
    export_dir: &std::path::Path,
    out_dir: &std::path::Path,
    json: bool,
) -> Result<(), SiftCliError> {
    let report = match granularity {
        Granularity::Daily => aggregate_daily(export_dir, out_dir)?,
        Granularity::Weekly => aggregate_weekly(export_dir, out_dir)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Wrote {} {} summaries to {} ({} rows dropped)",
            report.tables_written.len(),
            report.granularity,
            out_dir.display(),
            report.rows_dropped
        );
        for table in &report.tables_skipped {
            println!("  skipped {table} (missing columns or unreadable)");
        }
    }
    Ok(())
}

fn cmd_intervals(export_dir: &std::path::Path, json: bool) -> Result<(), SiftCliError> {
    let summaries = intervals::survey(export_dir)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else if summaries.is_empty() {
        println!("No surveyable tables in {}", export_dir.display());
    } else {
        println!(
            "{:<28} {:>10} {:>14} {:>12} {:>10}",
            "table", "records", "secs", "minutes", "hours"
        );
        for s in &summaries {
            println!(
                "{:<28} {:>10} {:>14.1} {:>12.2} {:>10.3}",
                s.table,
                s.total_records,
                s.mean_interval_secs,
                s.mean_interval_minutes,
                s.mean_interval_hours
            );
        }
    }
    Ok(())
}

enum SiftCliError {
    Io(std::io::Error),
    Pipeline(PipelineError),
    Json(serde_json::Error),
}

impl From<std::io::Error> for SiftCliError {
    fn from(e: std::io::Error) -> Self {
        SiftCliError::Io(e)
    }
}

impl From<PipelineError> for SiftCliError {
    fn from(e: PipelineError) -> Self {
        SiftCliError::Pipeline(e)
    }
}

impl From<serde_json::Error> for SiftCliError {
    fn from(e: serde_json::Error) -> Self {
        SiftCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<SiftCliError> for CliError {
    fn from(e: SiftCliError) -> Self {
        match e {
            SiftCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            SiftCliError::Pipeline(e) => CliError {
                code: "PIPELINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the source document and output directories".to_string()),
            },
            SiftCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
        }
    }
}
