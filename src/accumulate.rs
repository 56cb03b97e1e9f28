//! Metric accumulation
//!
//! Collects classified records into per-metric buckets. This is the only
//! mutable state in a run; it is owned by the extraction stage and consumed
//! wholesale by the exporter.

use tracing::debug;

use crate::classify::{classify, Classification, ExclusionReason};
use crate::config::PipelineConfig;
use crate::types::{CleanRecord, ExclusionCounts, MetricBuckets, RawRecord};

/// Accumulates cleaned records into metric buckets, tracking what was seen
/// and what was excluded along the way.
#[derive(Debug, Default)]
pub struct MetricAccumulator {
    buckets: MetricBuckets,
    records_seen: u64,
    exclusions: ExclusionCounts,
}

impl MetricAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one raw record and route it to its bucket (or drop it).
    pub fn feed(&mut self, raw: RawRecord, config: &PipelineConfig) {
        self.records_seen += 1;
        match classify(raw, config) {
            Classification::Clean(record) => self.push(record),
            Classification::Excluded(reason) => match reason {
                ExclusionReason::MissingType => self.exclusions.missing_type += 1,
                ExclusionReason::CategoryRecord => self.exclusions.category += 1,
                ExclusionReason::ExcludedType => self.exclusions.excluded_type += 1,
            },
        }
    }

    /// Append an already-clean record, preserving insertion order.
    pub fn push(&mut self, record: CleanRecord) {
        self.buckets
            .entry(record.metric.clone())
            .or_default()
            .push(record);
    }

    pub fn records_seen(&self) -> u64 {
        self.records_seen
    }

    pub fn exclusions(&self) -> ExclusionCounts {
        self.exclusions
    }

    /// Finish accumulation, handing the buckets to the export stage.
    pub fn finish(self) -> (MetricBuckets, u64, ExclusionCounts) {
        debug!(
            metrics = self.buckets.len(),
            records_seen = self.records_seen,
            excluded = self.exclusions.total(),
            "accumulation finished"
        );
        (self.buckets, self.records_seen, self.exclusions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MetricName;
    use pretty_assertions::assert_eq;

    fn raw(record_type: &str, value: &str) -> RawRecord {
        RawRecord::from_pairs([("type", record_type), ("value", value)])
    }

    #[test]
    fn test_buckets_keep_first_seen_metric_order() {
        let config = PipelineConfig::default();
        let mut acc = MetricAccumulator::new();

        acc.feed(raw("HKQuantityTypeIdentifierHeartRate", "60"), &config);
        acc.feed(raw("HKQuantityTypeIdentifierBodyMass", "72.5"), &config);
        acc.feed(raw("HKQuantityTypeIdentifierHeartRate", "61"), &config);

        let (buckets, seen, exclusions) = acc.finish();
        let names: Vec<&str> = buckets.keys().map(|m| m.as_str()).collect();

        assert_eq!(names, vec!["HeartRate", "BodyMass"]);
        assert_eq!(buckets[&MetricName::from("HeartRate")].len(), 2);
        assert_eq!(seen, 3);
        assert_eq!(exclusions.total(), 0);
    }

    #[test]
    fn test_records_within_bucket_keep_document_order() {
        let config = PipelineConfig::default();
        let mut acc = MetricAccumulator::new();

        for value in ["60", "61", "62"] {
            acc.feed(raw("HKQuantityTypeIdentifierHeartRate", value), &config);
        }

        let (buckets, _, _) = acc.finish();
        let values: Vec<&str> = buckets[&MetricName::from("HeartRate")]
            .iter()
            .map(|r| r.value.as_deref().unwrap())
            .collect();
        assert_eq!(values, vec!["60", "61", "62"]);
    }

    #[test]
    fn test_exclusions_counted_by_reason() {
        let config = PipelineConfig::default();
        let mut acc = MetricAccumulator::new();

        acc.feed(RawRecord::from_pairs([("value", "1")]), &config);
        acc.feed(raw("HKCategoryTypeIdentifierSleepAnalysis", "x"), &config);
        acc.feed(
            raw("HKQuantityTypeIdentifierHeadphoneAudioExposure", "70"),
            &config,
        );
        acc.feed(raw("HKQuantityTypeIdentifierHeartRate", "60"), &config);

        let (buckets, seen, exclusions) = acc.finish();
        assert_eq!(seen, 4);
        assert_eq!(exclusions.missing_type, 1);
        assert_eq!(exclusions.category, 1);
        assert_eq!(exclusions.excluded_type, 1);
        assert_eq!(buckets.len(), 1);
    }
}
