//! Batch outcome returned to the invoker

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AuditRow, NapStatus};

/// Counts by status for one audit run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total_rows: usize,
    pub matched: usize,
    pub partial: usize,
    pub mismatched: usize,
    pub not_found: usize,
    /// Rows whose lookup or processing failed
    pub failed: usize,
}

impl StatusCounts {
    pub fn from_rows(rows: &[AuditRow]) -> Self {
        let mut counts = Self {
            total_rows: rows.len(),
            ..Self::default()
        };

        for row in rows {
            match row.status {
                NapStatus::Match => counts.matched += 1,
                NapStatus::Partial => counts.partial += 1,
                NapStatus::Mismatch => counts.mismatched += 1,
                NapStatus::NotFound => counts.not_found += 1,
                NapStatus::Error => counts.failed += 1,
            }
        }

        counts
    }
}

/// Summary of a completed audit run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub counts: StatusCounts,
    /// Where the report was written
    pub destination: String,
}
