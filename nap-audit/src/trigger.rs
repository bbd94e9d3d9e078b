//! Trigger adapter core: one complete audit run
//!
//! Shared by the `run` command (scheduled invocation) and the HTTP trigger.
//! Whole-batch failures (bad input schema, unwritable destination) abort the
//! run; per-record failures only show up in the report and the summary.

use chrono::Utc;
use nap_common::config::AppConfig;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AuditError;
use crate::models::{RunSummary, StatusCounts};
use crate::services::{AuditRunner, PlaceLookup, RecordSource, ResultSink};

/// Load the input, audit every record, write the report, summarize
pub async fn execute<L: PlaceLookup + Sync>(
    config: &AppConfig,
    lookup: L,
) -> Result<RunSummary, AuditError> {
    config.validate()?;

    let run_id = Uuid::new_v4();
    let started_at = Utc::now();

    // Resolve the destination first so a bad output config costs no lookups
    let sink = ResultSink::from_config(&config.output, started_at)?;

    info!(
        run_id = %run_id,
        input = %config.input.path.display(),
        destination = %sink.describe(),
        "Audit run started"
    );

    let records = RecordSource::new(config.input.clone()).load(&config.input.path)?;

    let runner = AuditRunner::new(lookup, config.lookup.clone(), config.matching.clone());
    let rows = runner.run(&records).await;

    sink.write(&rows).await?;

    let counts = StatusCounts::from_rows(&rows);
    if counts.failed > 0 {
        warn!(run_id = %run_id, failed = counts.failed, "Some lookups failed");
    }
    info!(
        run_id = %run_id,
        total = counts.total_rows,
        matched = counts.matched,
        partial = counts.partial,
        mismatched = counts.mismatched,
        not_found = counts.not_found,
        failed = counts.failed,
        "Audit run complete"
    );

    Ok(RunSummary {
        run_id,
        started_at,
        finished_at: Utc::now(),
        counts,
        destination: sink.describe(),
    })
}
