//! Error types for VitalSift
//!
//! Only failures that compromise an entire run surface here. Per-record and
//! per-row anomalies (excluded types, uncoercible values, suppressed metrics)
//! are absorbed locally and reported through run-report counters instead.

use thiserror::Error;

/// Errors that can abort a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source document is unreadable or malformed: {0}")]
    DocumentParse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}
