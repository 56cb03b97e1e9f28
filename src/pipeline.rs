//! Pipeline orchestration
//!
//! The public API of VitalSift. Two entry points cover the whole core:
//! `extract_and_export` runs the stream-classify-accumulate-export stages;
//! `aggregate_daily` / `aggregate_weekly` reduce the exported tables. The
//! aggregators are independent, re-runnable transformations over whatever the
//! export stage produced.

use std::path::Path;

use tracing::info;
use uuid::Uuid;

use crate::accumulate::MetricAccumulator;
use crate::aggregate::daily::DailyAggregator;
use crate::aggregate::weekly::WeeklyAggregator;
use crate::aggregate::AggregateOutcome;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::export::ThresholdExporter;
use crate::stream::RecordStream;
use crate::types::{AggregateReport, ExtractReport};
use crate::PIPELINE_VERSION;

/// Extract records from `source`, classify and accumulate them, and export
/// every metric that clears the threshold into `export_dir`.
///
/// Fatal only when the document cannot be read (or, in strict mode, is
/// malformed) or when the export directory cannot be written. Per-record
/// anomalies are absorbed and reported in the returned `ExtractReport`.
pub fn extract_and_export(
    source: &Path,
    export_dir: &Path,
    config: &PipelineConfig,
) -> Result<ExtractReport, PipelineError> {
    let mut stream = RecordStream::open(source, config.recovery)?;
    let mut accumulator = MetricAccumulator::new();

    for record in stream.by_ref() {
        accumulator.feed(record?, config);
    }
    let skipped_fragments = stream.skipped_fragments();

    let (buckets, records_seen, exclusions) = accumulator.finish();
    let metrics_seen = buckets.len();
    info!(
        source = %source.display(),
        records_seen,
        excluded = exclusions.total(),
        skipped_fragments,
        metrics_seen,
        "extraction finished"
    );

    let exporter = ThresholdExporter::from_config(config);
    let outcome = exporter.export_all(buckets, export_dir)?;

    Ok(ExtractReport {
        run_id: Uuid::new_v4().to_string(),
        pipeline_version: PIPELINE_VERSION.to_string(),
        records_seen,
        records_excluded: exclusions.total(),
        exclusions,
        skipped_fragments,
        metrics_seen,
        exported: outcome.exported,
        suppressed: outcome.suppressed,
    })
}

/// Produce daily summaries for every exported table in `export_dir`.
pub fn aggregate_daily(
    export_dir: &Path,
    out_dir: &Path,
) -> Result<AggregateReport, PipelineError> {
    let outcome = DailyAggregator::run(export_dir, out_dir)?;
    Ok(report_for("daily", outcome))
}

/// Produce weekly summaries for every exported table in `export_dir`.
pub fn aggregate_weekly(
    export_dir: &Path,
    out_dir: &Path,
) -> Result<AggregateReport, PipelineError> {
    let outcome = WeeklyAggregator::run(export_dir, out_dir)?;
    Ok(report_for("weekly", outcome))
}

fn report_for(granularity: &str, outcome: AggregateOutcome) -> AggregateReport {
    AggregateReport {
        run_id: Uuid::new_v4().to_string(),
        pipeline_version: PIPELINE_VERSION.to_string(),
        granularity: granularity.to_string(),
        tables_written: outcome.written,
        tables_skipped: outcome.skipped,
        rows_dropped: outcome.rows_dropped,
    }
}

/// Config-holding handle over the same operations, for callers that run the
/// pipeline more than once with one configuration.
#[derive(Debug, Clone, Default)]
pub struct SiftPipeline {
    config: PipelineConfig,
}

impl SiftPipeline {
    /// Create a pipeline with the stock configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn extract_and_export(
        &self,
        source: &Path,
        export_dir: &Path,
    ) -> Result<ExtractReport, PipelineError> {
        extract_and_export(source, export_dir, &self.config)
    }

    pub fn aggregate_daily(
        &self,
        export_dir: &Path,
        out_dir: &Path,
    ) -> Result<AggregateReport, PipelineError> {
        aggregate_daily(export_dir, out_dir)
    }

    pub fn aggregate_weekly(
        &self,
        export_dir: &Path,
        out_dir: &Path,
    ) -> Result<AggregateReport, PipelineError> {
        aggregate_weekly(export_dir, out_dir)
    }
}
