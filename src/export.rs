//! Threshold-gated per-metric export
//!
//! Each bucket that clears the minimum-count threshold becomes one CSV file
//! named by the lowercase canonical metric name. Columns are the union of
//! attributes observed across the bucket's records, `type` first; values a
//! record lacks are written as empty fields. Buckets at or below the
//! threshold are suppressed without producing a file.
//!
//! Metrics export in parallel; each file is written to a temporary sibling
//! and renamed into place so readers never observe a partial table.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::types::{CleanRecord, MetricBuckets, MetricName};

/// What happened to each bucket during export
#[derive(Debug, Default)]
pub struct ExportOutcome {
    /// File stems written, in bucket order.
    pub exported: Vec<String>,
    /// Metric names suppressed by the threshold, in bucket order.
    pub suppressed: Vec<String>,
}

/// Writes per-metric tables for buckets that clear the record-count threshold
#[derive(Debug, Clone, Copy)]
pub struct ThresholdExporter {
    min_record_count: usize,
}

impl ThresholdExporter {
    pub fn new(min_record_count: usize) -> Self {
        Self { min_record_count }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.min_record_count)
    }

    /// Export every qualifying bucket into `export_dir`.
    pub fn export_all(
        &self,
        buckets: MetricBuckets,
        export_dir: &Path,
    ) -> Result<ExportOutcome, PipelineError> {
        fs::create_dir_all(export_dir)?;

        let work: Vec<(MetricName, Vec<CleanRecord>)> = buckets.into_iter().collect();
        let decisions: Vec<Decision> = work
            .into_par_iter()
            .map(|(metric, records)| self.export_metric(&metric, &records, export_dir))
            .collect::<Result<_, PipelineError>>()?;

        let mut outcome = ExportOutcome::default();
        for decision in decisions {
            match decision {
                Decision::Exported(stem) => outcome.exported.push(stem),
                Decision::Suppressed(name) => outcome.suppressed.push(name),
            }
        }
        Ok(outcome)
    }

    fn export_metric(
        &self,
        metric: &MetricName,
        records: &[CleanRecord],
        export_dir: &Path,
    ) -> Result<Decision, PipelineError> {
        if records.len() <= self.min_record_count {
            debug!(
                metric = metric.as_str(),
                records = records.len(),
                threshold = self.min_record_count,
                "metric suppressed"
            );
            return Ok(Decision::Suppressed(metric.as_str().to_string()));
        }

        let columns = column_union(records);
        let path = export_dir.join(format!("{}.csv", metric.file_stem()));

        write_csv_atomic(&path, |writer| {
            writer.write_record(&columns)?;
            for record in records {
                writer.write_record(columns.iter().map(|c| record.get(c).unwrap_or("")))?;
            }
            Ok(())
        })?;

        info!(
            metric = metric.as_str(),
            records = records.len(),
            path = %path.display(),
            "exported metric table"
        );
        Ok(Decision::Exported(metric.file_stem()))
    }
}

enum Decision {
    Exported(String),
    Suppressed(String),
}

/// Union of the columns carried by each record, in first-seen order.
fn column_union(records: &[CleanRecord]) -> Vec<String> {
    let mut columns: IndexSet<String> = IndexSet::new();
    for record in records {
        for column in record.columns() {
            if !columns.contains(column) {
                columns.insert(column.to_string());
            }
        }
    }
    columns.into_iter().collect()
}

/// Write a CSV file via a temporary sibling plus rename, so a reader never
/// sees a half-written table.
pub(crate) fn write_csv_atomic<F>(path: &Path, write: F) -> Result<(), PipelineError>
where
    F: FnOnce(&mut csv::Writer<fs::File>) -> Result<(), csv::Error>,
{
    let tmp: PathBuf = path.with_extension("csv.tmp");
    let mut writer = csv::Writer::from_path(&tmp)?;

    if let Err(e) = write(&mut writer).map_err(PipelineError::from) {
        drop(writer);
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    if let Err(e) = writer.flush() {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    drop(writer);

    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    fn record(metric: &str, value: &str, start: &str) -> CleanRecord {
        CleanRecord {
            metric: MetricName::new(metric),
            unit: Some("kg".to_string()),
            value: Some(value.to_string()),
            start_date: Some(start.to_string()),
            end_date: Some(start.to_string()),
            creation_date: None,
            extra: IndexMap::new(),
        }
    }

    fn bucket_of(metric: &str, count: usize) -> MetricBuckets {
        let mut buckets = MetricBuckets::new();
        let records: Vec<CleanRecord> = (0..count)
            .map(|i| record(metric, &format!("{}", 70 + i), "2024-01-15 07:30:00 +0000"))
            .collect();
        buckets.insert(MetricName::new(metric), records);
        buckets
    }

    fn read_rows(path: &Path) -> (Vec<String>, Vec<csv::StringRecord>) {
        let mut reader = csv::Reader::from_path(path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        (headers, rows)
    }

    #[test]
    fn test_bucket_at_threshold_suppressed() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = ThresholdExporter::new(100);

        let outcome = exporter
            .export_all(bucket_of("BodyMass", 100), dir.path())
            .unwrap();

        assert!(outcome.exported.is_empty());
        assert_eq!(outcome.suppressed, vec!["BodyMass"]);
        assert!(!dir.path().join("bodymass.csv").exists());
    }

    #[test]
    fn test_bucket_above_threshold_exported_in_full() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = ThresholdExporter::new(100);

        let outcome = exporter
            .export_all(bucket_of("BodyMass", 101), dir.path())
            .unwrap();

        assert_eq!(outcome.exported, vec!["bodymass"]);
        let (headers, rows) = read_rows(&dir.path().join("bodymass.csv"));
        assert_eq!(headers[0], "type");
        assert_eq!(rows.len(), 101);
    }

    #[test]
    fn test_column_union_with_missing_values() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = ThresholdExporter::new(1);

        let mut sparse = record("BodyMass", "73.0", "2024-01-16 07:30:00 +0000");
        sparse.unit = None;
        sparse
            .extra
            .insert("wasUserEntered".to_string(), "1".to_string());

        let mut buckets = MetricBuckets::new();
        buckets.insert(
            MetricName::new("BodyMass"),
            vec![record("BodyMass", "72.5", "2024-01-15 07:30:00 +0000"), sparse],
        );
        exporter.export_all(buckets, dir.path()).unwrap();

        let (headers, rows) = read_rows(&dir.path().join("bodymass.csv"));
        assert_eq!(
            headers,
            vec!["type", "unit", "startDate", "endDate", "value", "wasUserEntered"]
        );
        // First record has no wasUserEntered, second has no unit.
        assert_eq!(rows[0].get(5), Some(""));
        assert_eq!(rows[1].get(1), Some(""));
        assert_eq!(rows[1].get(5), Some("1"));
    }

    #[test]
    fn test_no_temporary_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = ThresholdExporter::new(0);
        exporter
            .export_all(bucket_of("HeartRate", 3), dir.path())
            .unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
        assert!(dir.path().join("heartrate.csv").exists());
    }

    #[test]
    fn test_multiple_metrics_exported_independently() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = ThresholdExporter::new(1);

        let mut buckets = bucket_of("BodyMass", 2);
        buckets.extend(bucket_of("HeartRate", 1));
        let outcome = exporter.export_all(buckets, dir.path()).unwrap();

        assert_eq!(outcome.exported, vec!["bodymass"]);
        assert_eq!(outcome.suppressed, vec!["HeartRate"]);
    }
}
