//! Data models for the NAP audit pipeline

pub mod audit_row;
pub mod run_summary;

pub use audit_row::{AuditRow, FieldVerdict, FieldVerdicts, InputRecord, LookupResult, NapStatus};
pub use run_summary::{RunSummary, StatusCounts};
