//! Record classification
//!
//! Pure mapping from a raw attribute set to either a `CleanRecord` or an
//! exclusion. Rules are applied in order: missing `type`, category marker,
//! excluded-type set, then prefix stripping and administrative-attribute
//! removal. No validation happens here; value coercion belongs to the
//! aggregators.

use crate::config::PipelineConfig;
use crate::types::{CleanRecord, MetricName, RawRecord};

/// Why a record was excluded from the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionReason {
    /// No usable `type` attribute; malformed but never an error.
    MissingType,
    /// Category/event record with no numeric value.
    CategoryRecord,
    /// Member of the configured excluded-type set.
    ExcludedType,
}

/// Outcome of classifying one raw record
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Clean(CleanRecord),
    Excluded(ExclusionReason),
}

/// Classify a raw record according to the configured rules.
pub fn classify(raw: RawRecord, config: &PipelineConfig) -> Classification {
    let record_type = match raw.get("type") {
        Some(t) if !t.is_empty() => t,
        _ => return Classification::Excluded(ExclusionReason::MissingType),
    };

    if record_type.contains(&config.category_type_marker) {
        return Classification::Excluded(ExclusionReason::CategoryRecord);
    }

    if config.excluded_types.contains(record_type) {
        return Classification::Excluded(ExclusionReason::ExcludedType);
    }

    let short_type = record_type
        .strip_prefix(&config.quantity_type_prefix)
        .unwrap_or(record_type);
    let metric = MetricName::new(short_type);

    let mut record = CleanRecord {
        metric,
        unit: None,
        value: None,
        start_date: None,
        end_date: None,
        creation_date: None,
        extra: indexmap::IndexMap::new(),
    };

    for (key, value) in raw.attrs {
        if key == "type" || config.excluded_attributes.contains(&key) {
            continue;
        }
        match key.as_str() {
            "unit" => record.unit = Some(value),
            "value" => record.value = Some(value),
            "startDate" => record.start_date = Some(value),
            "endDate" => record.end_date = Some(value),
            "creationDate" => record.creation_date = Some(value),
            _ => {
                record.extra.insert(key, value);
            }
        }
    }

    Classification::Clean(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    fn body_mass_raw() -> RawRecord {
        RawRecord::from_pairs([
            ("type", "HKQuantityTypeIdentifierBodyMass"),
            ("sourceName", "Health"),
            ("sourceVersion", "16.0"),
            ("device", "iPhone"),
            ("unit", "kg"),
            ("startDate", "2024-01-15 07:30:00 +0000"),
            ("endDate", "2024-01-15 07:30:00 +0000"),
            ("value", "72.5"),
        ])
    }

    #[test]
    fn test_missing_type_excluded() {
        let raw = RawRecord::from_pairs([("value", "72.5")]);
        assert_eq!(
            classify(raw, &config()),
            Classification::Excluded(ExclusionReason::MissingType)
        );

        let empty = RawRecord::from_pairs([("type", ""), ("value", "72.5")]);
        assert_eq!(
            classify(empty, &config()),
            Classification::Excluded(ExclusionReason::MissingType)
        );
    }

    #[test]
    fn test_category_records_excluded() {
        let raw = RawRecord::from_pairs([
            ("type", "HKCategoryTypeIdentifierSleepAnalysis"),
            ("value", "HKCategoryValueSleepAnalysisAsleep"),
        ]);
        assert_eq!(
            classify(raw, &config()),
            Classification::Excluded(ExclusionReason::CategoryRecord)
        );
    }

    #[test]
    fn test_audio_exposure_family_excluded() {
        for excluded in [
            "HKQuantityTypeIdentifierHeadphoneAudioExposure",
            "HKQuantityTypeIdentifierEnvironmentalAudioExposure",
        ] {
            let raw = RawRecord::from_pairs([("type", excluded), ("value", "70")]);
            assert_eq!(
                classify(raw, &config()),
                Classification::Excluded(ExclusionReason::ExcludedType)
            );
        }
    }

    #[test]
    fn test_prefix_stripped_to_canonical_name() {
        let result = classify(body_mass_raw(), &config());
        let Classification::Clean(record) = result else {
            panic!("expected clean record");
        };
        assert_eq!(record.metric.as_str(), "BodyMass");
    }

    #[test]
    fn test_unprefixed_type_kept_verbatim() {
        let raw = RawRecord::from_pairs([("type", "CustomMetric"), ("value", "1")]);
        let Classification::Clean(record) = classify(raw, &config()) else {
            panic!("expected clean record");
        };
        assert_eq!(record.metric.as_str(), "CustomMetric");
    }

    #[test]
    fn test_administrative_attributes_removed() {
        let Classification::Clean(record) = classify(body_mass_raw(), &config()) else {
            panic!("expected clean record");
        };

        assert_eq!(record.get("sourceName"), None);
        assert_eq!(record.get("sourceVersion"), None);
        assert_eq!(record.get("device"), None);
        assert_eq!(record.unit.as_deref(), Some("kg"));
        assert_eq!(record.value.as_deref(), Some("72.5"));
    }

    #[test]
    fn test_unrecognized_attributes_preserved() {
        let raw = RawRecord::from_pairs([
            ("type", "HKQuantityTypeIdentifierBodyMass"),
            ("value", "72.5"),
            ("wasUserEntered", "1"),
        ]);
        let Classification::Clean(record) = classify(raw, &config()) else {
            panic!("expected clean record");
        };
        assert_eq!(record.get("wasUserEntered"), Some("1"));
    }
}
