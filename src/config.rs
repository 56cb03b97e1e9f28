//! Pipeline configuration
//!
//! The exclusion sets, the vendor prefix, and the export threshold are policy
//! rather than mechanism, so they live here instead of being baked into the
//! classifier. `PipelineConfig::default()` reproduces the stock Apple Health
//! behavior.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Vendor prefix carried by quantity-type records; stripped to form the
/// canonical short metric name.
pub const QUANTITY_TYPE_PREFIX: &str = "HKQuantityTypeIdentifier";

/// Marker substring identifying category/event records, which carry no
/// numeric value and are excluded from the pipeline.
pub const CATEGORY_TYPE_MARKER: &str = "HKCategoryTypeIdentifier";

/// Minimum bucket size a metric must exceed to be exported.
pub const DEFAULT_MIN_RECORD_COUNT: usize = 100;

fn default_quantity_prefix() -> String {
    QUANTITY_TYPE_PREFIX.to_string()
}

fn default_category_marker() -> String {
    CATEGORY_TYPE_MARKER.to_string()
}

fn default_min_record_count() -> usize {
    DEFAULT_MIN_RECORD_COUNT
}

fn default_excluded_types() -> BTreeSet<String> {
    [
        "HKQuantityTypeIdentifierHeadphoneAudioExposure",
        "HKCategoryTypeIdentifierHeadphoneAudioExposureEvent",
        "HKQuantityTypeIdentifierEnvironmentalAudioExposure",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_excluded_attributes() -> BTreeSet<String> {
    ["sourceName", "sourceVersion", "device"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// How the record stream reacts to malformed XML fragments
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPolicy {
    /// Skip malformed fragments, record a diagnostic per skip, keep going.
    #[default]
    Permissive,
    /// Abort the whole extraction on the first malformed fragment.
    Strict,
}

/// Configuration for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// A metric is exported only if its record count exceeds this.
    pub min_record_count: usize,
    /// Prefix stripped from quantity types to form canonical names.
    pub quantity_type_prefix: String,
    /// Substring marking category/event records.
    pub category_type_marker: String,
    /// Raw types dropped entirely (audio-exposure family by default).
    pub excluded_types: BTreeSet<String>,
    /// Administrative attributes removed from every record.
    pub excluded_attributes: BTreeSet<String>,
    /// Parse-recovery policy for the record stream.
    pub recovery: RecoveryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_record_count: default_min_record_count(),
            quantity_type_prefix: default_quantity_prefix(),
            category_type_marker: default_category_marker(),
            excluded_types: default_excluded_types(),
            excluded_attributes: default_excluded_attributes(),
            recovery: RecoveryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from JSON; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to pretty JSON.
    pub fn to_json(&self) -> Result<String, PipelineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if self.quantity_type_prefix.is_empty() {
            return Err(PipelineError::Config(
                "quantity_type_prefix must not be empty".to_string(),
            ));
        }
        if self.category_type_marker.is_empty() {
            return Err(PipelineError::Config(
                "category_type_marker must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_match_stock_policy() {
        let config = PipelineConfig::default();

        assert_eq!(config.min_record_count, 100);
        assert_eq!(config.quantity_type_prefix, "HKQuantityTypeIdentifier");
        assert_eq!(config.category_type_marker, "HKCategoryTypeIdentifier");
        assert_eq!(config.recovery, RecoveryPolicy::Permissive);
        assert!(config
            .excluded_types
            .contains("HKQuantityTypeIdentifierEnvironmentalAudioExposure"));
        assert!(config.excluded_attributes.contains("sourceName"));
        assert!(config.excluded_attributes.contains("device"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            PipelineConfig::from_json(r#"{"min_record_count": 5, "recovery": "strict"}"#).unwrap();

        assert_eq!(config.min_record_count, 5);
        assert_eq!(config.recovery, RecoveryPolicy::Strict);
        assert_eq!(config.quantity_type_prefix, "HKQuantityTypeIdentifier");
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let result = PipelineConfig::from_json(r#"{"quantity_type_prefix": ""}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let config = PipelineConfig::default();
        let json = config.to_json().unwrap();
        let restored = PipelineConfig::from_json(&json).unwrap();

        assert_eq!(restored.min_record_count, config.min_record_count);
        assert_eq!(restored.excluded_types, config.excluded_types);
    }
}
