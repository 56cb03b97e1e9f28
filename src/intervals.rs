//! Sampling-interval survey
//!
//! Reports, per exported table, how many records it holds and the mean gap
//! between consecutive observations. Useful for judging how densely a metric
//! is sampled before trusting its aggregates.

use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::aggregate::{csv_tables, load_series, TableSeries};
use crate::error::PipelineError;

/// Sampling cadence of one exported table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalSummary {
    /// Table file name.
    pub table: String,
    pub total_records: u64,
    pub mean_interval_secs: f64,
    pub mean_interval_minutes: f64,
    pub mean_interval_hours: f64,
}

/// Survey every exported table in `export_dir`. Tables with fewer than two
/// parseable observations, or without the required columns, are omitted.
pub fn survey(export_dir: &Path) -> Result<Vec<IntervalSummary>, PipelineError> {
    let mut summaries = Vec::new();

    for path in csv_tables(export_dir)? {
        let table = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut observations = match load_series(&path) {
            Ok(TableSeries::Loaded { observations, .. }) => observations,
            Ok(TableSeries::MissingColumns) | Err(_) => {
                debug!(table = %table, "table not surveyable, omitting");
                continue;
            }
        };
        if observations.len() < 2 {
            continue;
        }

        observations.sort_by_key(|obs| obs.epoch_seconds);
        let gaps: i64 = observations
            .windows(2)
            .map(|pair| pair[1].epoch_seconds - pair[0].epoch_seconds)
            .sum();
        let mean_secs = gaps as f64 / (observations.len() - 1) as f64;

        summaries.push(IntervalSummary {
            table,
            total_records: observations.len() as u64,
            mean_interval_secs: mean_secs,
            mean_interval_minutes: mean_secs / 60.0,
            mean_interval_hours: mean_secs / 3600.0,
        });
    }

    Ok(summaries)
}
