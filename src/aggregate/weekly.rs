//! Weekly aggregation
//!
//! Resamples a metric's observation stream into calendar weeks ending on
//! Sunday, labeled by the week-ending date. Output is the arithmetic mean of
//! the value column per week, rounded to 3 decimal places; weeks with no
//! observations never appear.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Datelike, Duration, NaiveDate};

use super::{format_float, round3, run_directory, AggregateOutcome, Observation};
use crate::error::PipelineError;
use crate::types::WeeklySummaryRow;

/// Output columns, in order.
pub const HEADERS: [&str; 2] = ["date", "mean"];

/// Per-week reducer over exported metric tables
pub struct WeeklyAggregator;

impl WeeklyAggregator {
    /// Summarize every table in `export_dir` into `out_dir`, one summary file
    /// per table, same file name.
    pub fn run(export_dir: &Path, out_dir: &Path) -> Result<AggregateOutcome, PipelineError> {
        run_directory(export_dir, out_dir, &HEADERS, |observations| {
            Self::summarize(observations)
                .iter()
                .map(|row| vec![row.date.to_string(), format_float(row.mean)])
                .collect()
        })
    }

    /// Reduce observations to per-week mean rows, ascending by week-ending
    /// date.
    pub fn summarize(observations: &[Observation]) -> Vec<WeeklySummaryRow> {
        let mut weeks: BTreeMap<NaiveDate, (f64, u64)> = BTreeMap::new();
        for obs in observations {
            let entry = weeks.entry(week_ending(obs.date)).or_insert((0.0, 0));
            entry.0 += obs.value;
            entry.1 += 1;
        }

        weeks
            .into_iter()
            .map(|(date, (sum, count))| WeeklySummaryRow {
                date,
                mean: round3(sum / count as f64),
            })
            .collect()
    }
}

/// The Sunday ending the week that contains `date`. A Sunday belongs to the
/// week it ends.
pub fn week_ending(date: NaiveDate) -> NaiveDate {
    let days_to_sunday = 6 - date.weekday().num_days_from_monday() as i64;
    date + Duration::days(days_to_sunday)
}
