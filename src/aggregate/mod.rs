//! Time-series aggregation over exported metric tables
//!
//! Daily and weekly reducers share the same data-cleaning front end: a table
//! must carry `startDate` and `value` columns or it is skipped for
//! aggregation; rows whose timestamp or value fails coercion are silently
//! dropped. Each table is an independent unit of work, so one bad table never
//! blocks its siblings.

pub mod daily;
pub mod weekly;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::export::write_csv_atomic;

/// Column holding the observation timestamp.
pub const TIMESTAMP_COLUMN: &str = "startDate";
/// Column holding the numeric observation.
pub const VALUE_COLUMN: &str = "value";

/// One cleaned observation from an exported table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Calendar date of the timestamp as written (no timezone conversion).
    pub date: NaiveDate,
    /// Epoch seconds, for interval math.
    pub epoch_seconds: i64,
    pub value: f64,
}

/// Result of loading one exported table
#[derive(Debug)]
pub(crate) enum TableSeries {
    Loaded {
        observations: Vec<Observation>,
        rows_dropped: u64,
    },
    /// Table lacks `startDate` or `value`; skip it for aggregation.
    MissingColumns,
}

/// Read an exported table and coerce its rows into observations. Rows that
/// fail timestamp or value coercion are dropped and counted, never fatal.
pub(crate) fn load_series(path: &Path) -> Result<TableSeries, PipelineError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?;

    let timestamp_idx = headers.iter().position(|h| h == TIMESTAMP_COLUMN);
    let value_idx = headers.iter().position(|h| h == VALUE_COLUMN);
    let (Some(timestamp_idx), Some(value_idx)) = (timestamp_idx, value_idx) else {
        return Ok(TableSeries::MissingColumns);
    };

    let mut observations = Vec::new();
    let mut rows_dropped = 0u64;

    for row in reader.records() {
        let row = row?;
        let parsed = row
            .get(timestamp_idx)
            .and_then(parse_timestamp)
            .zip(row.get(value_idx).and_then(parse_value));
        match parsed {
            Some(((date, epoch_seconds), value)) => observations.push(Observation {
                date,
                epoch_seconds,
                value,
            }),
            None => rows_dropped += 1,
        }
    }

    Ok(TableSeries::Loaded {
        observations,
        rows_dropped,
    })
}

/// Parse a timestamp into (calendar date as written, epoch seconds). Accepts
/// the export's native `2024-01-15 07:30:00 +0000` form plus RFC 3339 and
/// date-only fallbacks.
pub(crate) fn parse_timestamp(raw: &str) -> Option<(NaiveDate, i64)> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z") {
        return Some((dt.date_naive(), dt.timestamp()));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some((dt.date_naive(), dt.timestamp()));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some((dt.date(), dt.and_utc().timestamp()));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let dt = date.and_hms_opt(0, 0, 0)?;
        return Some((date, dt.and_utc().timestamp()));
    }
    None
}

/// Coerce a value cell to a finite float.
pub(crate) fn parse_value(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Exported tables in a directory, sorted by file name for determinism.
pub(crate) fn csv_tables(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let mut tables: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    tables.sort();
    Ok(tables)
}

/// What happened across one aggregation pass over a directory
#[derive(Debug, Default)]
pub struct AggregateOutcome {
    /// Table file names summarized, sorted.
    pub written: Vec<String>,
    /// Table file names skipped (missing columns or unreadable).
    pub skipped: Vec<String>,
    /// Rows dropped by coercion across all tables.
    pub rows_dropped: u64,
}

enum TableOutcome {
    Written { table: String, rows_dropped: u64 },
    Skipped { table: String },
}

/// Run one reducer over every exported table in `export_dir`, writing one
/// summary file per table into `out_dir`. Tables are processed in parallel;
/// per-table failures are absorbed as skips.
pub(crate) fn run_directory<F>(
    export_dir: &Path,
    out_dir: &Path,
    headers: &[&str],
    rows_for: F,
) -> Result<AggregateOutcome, PipelineError>
where
    F: Fn(&[Observation]) -> Vec<Vec<String>> + Sync,
{
    let tables = csv_tables(export_dir)?;
    fs::create_dir_all(out_dir)?;

    let results: Vec<TableOutcome> = tables
        .par_iter()
        .map(|path| summarize_table(path, out_dir, headers, &rows_for))
        .collect();

    let mut outcome = AggregateOutcome::default();
    for result in results {
        match result {
            TableOutcome::Written {
                table,
                rows_dropped,
            } => {
                outcome.written.push(table);
                outcome.rows_dropped += rows_dropped;
            }
            TableOutcome::Skipped { table } => outcome.skipped.push(table),
        }
    }
    Ok(outcome)
}

fn summarize_table<F>(path: &Path, out_dir: &Path, headers: &[&str], rows_for: &F) -> TableOutcome
where
    F: Fn(&[Observation]) -> Vec<Vec<String>> + Sync,
{
    let table = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (observations, rows_dropped) = match load_series(path) {
        Ok(TableSeries::Loaded {
            observations,
            rows_dropped,
        }) => (observations, rows_dropped),
        Ok(TableSeries::MissingColumns) => {
            warn!(table = %table, "table lacks startDate/value columns, skipping");
            return TableOutcome::Skipped { table };
        }
        Err(e) => {
            warn!(table = %table, error = %e, "failed to read table, skipping");
            return TableOutcome::Skipped { table };
        }
    };

    let rows = rows_for(&observations);
    let out_path = out_dir.join(&table);
    let write_result = write_csv_atomic(&out_path, |writer| {
        writer.write_record(headers)?;
        for row in &rows {
            writer.write_record(row)?;
        }
        Ok(())
    });

    match write_result {
        Ok(()) => {
            info!(table = %table, rows = rows.len(), rows_dropped, "aggregated table");
            TableOutcome::Written {
                table,
                rows_dropped,
            }
        }
        Err(e) => {
            warn!(table = %table, error = %e, "failed to write summary, skipping");
            TableOutcome::Skipped { table }
        }
    }
}

/// Format a float the way the summaries are written.
pub(crate) fn format_float(value: f64) -> String {
    format!("{value}")
}

/// Round to 3 decimal places, half away from zero.
pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
