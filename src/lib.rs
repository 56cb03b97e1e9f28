//! VitalSift - Extraction-filter-aggregate pipeline for wearable health exports
//!
//! VitalSift ingests a large wearable-health XML export, classifies its record
//! elements by metric type, discards noise, and produces per-metric CSV tables
//! plus daily and weekly numeric summaries through a deterministic pipeline:
//! record streaming → type classification → metric accumulation → threshold
//! export → (daily | weekly) aggregation.
//!
//! ## Entry points
//!
//! - [`pipeline::extract_and_export`]: stream the document and write one CSV
//!   per metric that clears the record-count threshold
//! - [`pipeline::aggregate_daily`] / [`pipeline::aggregate_weekly`]: reduce
//!   exported tables to calendar-day or calendar-week summaries

pub mod accumulate;
pub mod aggregate;
pub mod classify;
pub mod config;
pub mod error;
pub mod export;
pub mod intervals;
pub mod pipeline;
pub mod stream;
pub mod types;

pub use config::{PipelineConfig, RecoveryPolicy};
pub use error::PipelineError;
pub use pipeline::{aggregate_daily, aggregate_weekly, extract_and_export, SiftPipeline};
pub use types::{
    AggregateReport, CleanRecord, DailySummaryRow, ExtractReport, MetricBuckets, MetricName,
    RawRecord, WeeklySummaryRow,
};

/// Pipeline version embedded in run reports
pub const PIPELINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for run reports
pub const PRODUCER_NAME: &str = "vitalsift";
