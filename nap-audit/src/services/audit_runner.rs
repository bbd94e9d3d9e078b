//! Audit runner: sequential lookup → compare → accumulate
//!
//! Exactly one `AuditRow` per input record, in input order. A lookup error or
//! a panic while processing one record becomes an `error` row; the batch
//! always completes.

use futures::FutureExt;
use nap_common::config::{LookupConfig, MatchingConfig};
use std::panic::AssertUnwindSafe;
use tracing::{info, warn};

use super::comparator::NapComparator;
use super::places_client::{PlaceLookup, SearchQuery};
use crate::models::{AuditRow, InputRecord, NapStatus};

/// Drives the per-record pipeline against a lookup implementation
pub struct AuditRunner<L> {
    lookup: L,
    lookup_config: LookupConfig,
    comparator: NapComparator,
}

impl<L: PlaceLookup + Sync> AuditRunner<L> {
    pub fn new(lookup: L, lookup_config: LookupConfig, matching: MatchingConfig) -> Self {
        Self {
            lookup,
            lookup_config,
            comparator: NapComparator::new(matching),
        }
    }

    /// Audit all records, one at a time
    pub async fn run(&self, records: &[InputRecord]) -> Vec<AuditRow> {
        let total = records.len();
        let mut rows = Vec::with_capacity(total);

        info!(records = total, "Starting NAP audit");

        for (index, record) in records.iter().enumerate() {
            info!("[{}/{}] Searching for: {}", index + 1, total, record.name);

            let row = match AssertUnwindSafe(self.process_record(record))
                .catch_unwind()
                .await
            {
                Ok(row) => row,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    warn!(
                        row = record.row_number,
                        error = %message,
                        "Record processing panicked"
                    );
                    AuditRow::failed(record.clone(), format!("processing panicked: {}", message))
                }
            };

            info!(
                row = record.row_number,
                status = row.status.as_str(),
                "Record audited"
            );
            rows.push(row);
        }

        rows
    }

    /// Look up and compare a single record
    pub async fn process_record(&self, record: &InputRecord) -> AuditRow {
        let query = SearchQuery::for_record(record, &self.lookup_config);

        let lookup = match self.lookup.lookup(&query).await {
            Ok(lookup) => lookup,
            Err(e) => {
                warn!(
                    row = record.row_number,
                    name = %record.name,
                    error = %e,
                    "Lookup failed, recording as error"
                );
                return AuditRow::failed(record.clone(), e.to_string());
            }
        };

        let comparison = self.comparator.compare(record, &lookup);
        let status = if !lookup.found {
            NapStatus::NotFound
        } else if comparison.overall {
            NapStatus::Match
        } else if comparison.verdicts.matched_count() > 0 {
            NapStatus::Partial
        } else {
            NapStatus::Mismatch
        };

        AuditRow {
            input: record.clone(),
            lookup,
            verdicts: comparison.verdicts,
            overall: comparison.overall,
            status,
            error: None,
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
