//! Daily aggregation
//!
//! Reduces a metric's observation stream to one row per calendar date with
//! sum, mean, min, max, and count of the value column, ascending by date.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;

use super::{format_float, run_directory, AggregateOutcome, Observation};
use crate::error::PipelineError;
use crate::types::DailySummaryRow;

/// Output columns, in order.
pub const HEADERS: [&str; 6] = ["date", "sum", "mean", "min", "max", "count"];

/// Per-date reducer over exported metric tables
pub struct DailyAggregator;

impl DailyAggregator {
    /// Summarize every table in `export_dir` into `out_dir`, one summary file
    /// per table, same file name.
    pub fn run(export_dir: &Path, out_dir: &Path) -> Result<AggregateOutcome, PipelineError> {
        run_directory(export_dir, out_dir, &HEADERS, |observations| {
            Self::summarize(observations)
                .iter()
                .map(format_row)
                .collect()
        })
    }

    /// Reduce observations to per-date summary rows, ascending by date. No
    /// observations means no rows, not an error.
    pub fn summarize(observations: &[Observation]) -> Vec<DailySummaryRow> {
        let mut days: BTreeMap<NaiveDate, DayFold> = BTreeMap::new();
        for obs in observations {
            days.entry(obs.date).or_default().add(obs.value);
        }

        days.into_iter()
            .map(|(date, fold)| DailySummaryRow {
                date,
                sum: fold.sum,
                mean: fold.sum / fold.count as f64,
                min: fold.min,
                max: fold.max,
                count: fold.count,
            })
            .collect()
    }
}

#[derive(Debug)]
struct DayFold {
    sum: f64,
    min: f64,
    max: f64,
    count: u64,
}

impl Default for DayFold {
    fn default() -> Self {
        Self {
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            count: 0,
        }
    }
}

impl DayFold {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.count += 1;
    }
}

fn format_row(row: &DailySummaryRow) -> Vec<String> {
    vec![
        row.date.to_string(),
        format_float(row.sum),
        format_float(row.mean),
        format_float(row.min),
        format_float(row.max),
        row.count.to_string(),
    ]
}
