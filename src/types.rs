//! Core types for the VitalSift pipeline
//!
//! This module defines the data that flows through each stage: raw attribute
//! sets from the XML stream, cleaned records grouped into metric buckets, and
//! the serializable reports a run hands back to its caller.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Canonical short metric name: the raw `type` attribute with the vendor
/// quantity prefix removed (e.g. `BodyMass`, `HeartRate`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricName(String);

impl MetricName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase stem used for export file names (`bodymass` for `BodyMass`).
    pub fn file_stem(&self) -> String {
        self.0.to_lowercase()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MetricName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// One source element's attributes, in document order. Transient: exists only
/// while the element is being classified.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    pub attrs: IndexMap<String, String>,
}

impl RawRecord {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Build a record from attribute pairs, preserving their order.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            attrs: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// Attribute names recognized as first-class `CleanRecord` fields, in the
/// order the source document emits them.
pub(crate) const KNOWN_COLUMNS: [&str; 6] = [
    "type",
    "unit",
    "creationDate",
    "startDate",
    "endDate",
    "value",
];

/// A cleaned record: administrative attributes removed, `type` rewritten to
/// its canonical short form. Values stay textual; numeric coercion is the
/// aggregators' job.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanRecord {
    pub metric: MetricName,
    pub unit: Option<String>,
    pub value: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub creation_date: Option<String>,
    /// Attributes outside the recognized set, in document order.
    pub extra: IndexMap<String, String>,
}

impl CleanRecord {
    /// Look up a column value by its exported column name.
    pub fn get(&self, column: &str) -> Option<&str> {
        match column {
            "type" => Some(self.metric.as_str()),
            "unit" => self.unit.as_deref(),
            "value" => self.value.as_deref(),
            "startDate" => self.start_date.as_deref(),
            "endDate" => self.end_date.as_deref(),
            "creationDate" => self.creation_date.as_deref(),
            other => self.extra.get(other).map(String::as_str),
        }
    }

    /// Column names this record carries, recognized columns first, then any
    /// extras in document order. `type` is always present.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        KNOWN_COLUMNS
            .into_iter()
            .filter(|c| self.get(c).is_some())
            .chain(self.extra.keys().map(String::as_str))
    }
}

/// Metric buckets: canonical name to its cleaned records, insertion order =
/// document order. Owned by a single pipeline run.
pub type MetricBuckets = IndexMap<MetricName, Vec<CleanRecord>>;

/// Per-reason exclusion counters from the classification stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExclusionCounts {
    /// Records with no usable `type` attribute.
    pub missing_type: u64,
    /// Category/event records.
    pub category: u64,
    /// Members of the configured excluded-type set.
    pub excluded_type: u64,
}

impl ExclusionCounts {
    pub fn total(&self) -> u64 {
        self.missing_type + self.category + self.excluded_type
    }
}

/// Summary of one extract-and-export run
#[derive(Debug, Clone, Serialize)]
pub struct ExtractReport {
    pub run_id: String,
    pub pipeline_version: String,
    /// Qualifying record elements observed in the stream.
    pub records_seen: u64,
    /// Records excluded by classification.
    pub records_excluded: u64,
    pub exclusions: ExclusionCounts,
    /// Malformed fragments skipped (permissive mode).
    pub skipped_fragments: u64,
    /// Distinct metrics accumulated before thresholding.
    pub metrics_seen: usize,
    /// File stems written, in document first-seen order.
    pub exported: Vec<String>,
    /// Metrics suppressed by the threshold.
    pub suppressed: Vec<String>,
}

/// Summary of one aggregation run over an export directory
#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub run_id: String,
    pub pipeline_version: String,
    /// "daily" or "weekly".
    pub granularity: String,
    /// Table file names summarized.
    pub tables_written: Vec<String>,
    /// Tables skipped (missing required columns or unreadable).
    pub tables_skipped: Vec<String>,
    /// Rows dropped across all tables by timestamp/value coercion.
    pub rows_dropped: u64,
}

/// One day's reduction of a metric's value column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummaryRow {
    pub date: chrono::NaiveDate,
    pub sum: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub count: u64,
}

/// One week's reduction: mean of the value column, labeled by the date the
/// week ends on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklySummaryRow {
    pub date: chrono::NaiveDate,
    pub mean: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_record() -> CleanRecord {
        CleanRecord {
            metric: MetricName::new("BodyMass"),
            unit: Some("kg".to_string()),
            value: Some("72.5".to_string()),
            start_date: Some("2024-01-15 07:30:00 +0000".to_string()),
            end_date: Some("2024-01-15 07:30:00 +0000".to_string()),
            creation_date: None,
            extra: IndexMap::new(),
        }
    }

    #[test]
    fn test_metric_name_file_stem() {
        assert_eq!(MetricName::new("BodyMass").file_stem(), "bodymass");
        assert_eq!(MetricName::new("HeartRate").file_stem(), "heartrate");
    }

    #[test]
    fn test_columns_in_source_order() {
        let record = sample_record();
        let columns: Vec<&str> = record.columns().collect();
        assert_eq!(columns, vec!["type", "unit", "startDate", "endDate", "value"]);
    }

    #[test]
    fn test_extra_columns_follow_known_ones() {
        let mut record = sample_record();
        record
            .extra
            .insert("HKMetadataKeyWasUserEntered".to_string(), "1".to_string());

        let columns: Vec<&str> = record.columns().collect();
        assert_eq!(columns.last(), Some(&"HKMetadataKeyWasUserEntered"));
        assert_eq!(record.get("HKMetadataKeyWasUserEntered"), Some("1"));
    }

    #[test]
    fn test_get_maps_type_to_metric() {
        let record = sample_record();
        assert_eq!(record.get("type"), Some("BodyMass"));
        assert_eq!(record.get("sourceName"), None);
    }
}
