//! Per-record audit data
//!
//! One `AuditRow` is produced for every `InputRecord`, in input order,
//! whatever the lookup outcome.

use nap_common::config::NapField;
use serde::{Deserialize, Serialize};

/// Listing as it appears in the source dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    /// 1-based data row number (header excluded)
    pub row_number: usize,
    pub name: String,
    pub address: String,
    pub phone: String,
}

impl InputRecord {
    pub fn new(
        row_number: usize,
        name: impl Into<String>,
        address: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            row_number,
            name: name.into(),
            address: address.into(),
            phone: phone.into(),
        }
    }
}

/// Best-matching place returned by the lookup service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResult {
    pub found: bool,
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

impl LookupResult {
    /// No place matched the query
    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn found(
        name: Option<String>,
        address: Option<String>,
        phone: Option<String>,
    ) -> Self {
        Self {
            found: true,
            name,
            address,
            phone,
        }
    }

    /// Looked-up value for `field` (empty when absent)
    pub fn field(&self, field: NapField) -> &str {
        let value = match field {
            NapField::Name => &self.name,
            NapField::Address => &self.address,
            NapField::Phone => &self.phone,
        };
        value.as_deref().unwrap_or("")
    }
}

/// Similarity score and threshold outcome for one field
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldVerdict {
    /// Similarity in [0, 100]
    pub score: f64,
    pub matched: bool,
}

impl FieldVerdict {
    pub fn unmatched() -> Self {
        Self::default()
    }
}

/// Verdicts for all three audited fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldVerdicts {
    pub name: FieldVerdict,
    pub address: FieldVerdict,
    pub phone: FieldVerdict,
}

impl FieldVerdicts {
    pub fn get(&self, field: NapField) -> FieldVerdict {
        match field {
            NapField::Name => self.name,
            NapField::Address => self.address,
            NapField::Phone => self.phone,
        }
    }

    pub fn matched_count(&self) -> usize {
        NapField::ALL
            .iter()
            .filter(|f| self.get(**f).matched)
            .count()
    }
}

/// Row classification for the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NapStatus {
    /// Overall verdict passed
    Match,
    /// Found, some fields matched, overall failed
    Partial,
    /// Found, no field matched
    Mismatch,
    /// Lookup returned nothing
    NotFound,
    /// Lookup or processing failed
    Error,
}

impl NapStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NapStatus::Match => "match",
            NapStatus::Partial => "partial",
            NapStatus::Mismatch => "mismatch",
            NapStatus::NotFound => "not_found",
            NapStatus::Error => "error",
        }
    }
}

/// Outcome of auditing one input record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRow {
    pub input: InputRecord,
    pub lookup: LookupResult,
    pub verdicts: FieldVerdicts,
    pub overall: bool,
    pub status: NapStatus,
    /// Failure message for `NapStatus::Error` rows
    pub error: Option<String>,
}

impl AuditRow {
    /// Row for a record whose lookup or processing failed
    pub fn failed(input: InputRecord, error: impl Into<String>) -> Self {
        Self {
            input,
            lookup: LookupResult::not_found(),
            verdicts: FieldVerdicts::default(),
            overall: false,
            status: NapStatus::Error,
            error: Some(error.into()),
        }
    }
}
