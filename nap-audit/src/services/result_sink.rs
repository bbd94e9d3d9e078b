//! Result sink: audit rows → CSV report on a file or object-storage blob
//!
//! Write failures are fatal for the run and reported to the invoker.

use chrono::{DateTime, Utc};
use nap_common::config::{BlobConfig, OutputConfig};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::error::AuditError;
use crate::models::{AuditRow, FieldVerdict, FieldVerdicts, InputRecord, LookupResult, NapStatus};

/// One report line, column order as written
#[derive(Debug, Serialize, Deserialize)]
struct ReportRecord {
    input_name: String,
    input_address: String,
    input_phone: String,
    lookup_found: bool,
    lookup_name: String,
    lookup_address: String,
    lookup_phone: String,
    score_name: f64,
    score_address: f64,
    score_phone: f64,
    matched_name: bool,
    matched_address: bool,
    matched_phone: bool,
    overall: bool,
    status: NapStatus,
    error: String,
}

impl From<&AuditRow> for ReportRecord {
    fn from(row: &AuditRow) -> Self {
        Self {
            input_name: row.input.name.clone(),
            input_address: row.input.address.clone(),
            input_phone: row.input.phone.clone(),
            lookup_found: row.lookup.found,
            lookup_name: row.lookup.name.clone().unwrap_or_default(),
            lookup_address: row.lookup.address.clone().unwrap_or_default(),
            lookup_phone: row.lookup.phone.clone().unwrap_or_default(),
            score_name: row.verdicts.name.score,
            score_address: row.verdicts.address.score,
            score_phone: row.verdicts.phone.score,
            matched_name: row.verdicts.name.matched,
            matched_address: row.verdicts.address.matched,
            matched_phone: row.verdicts.phone.matched,
            overall: row.overall,
            status: row.status,
            error: row.error.clone().unwrap_or_default(),
        }
    }
}

impl ReportRecord {
    fn into_row(self, row_number: usize) -> AuditRow {
        let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };

        AuditRow {
            input: InputRecord::new(row_number, self.input_name, self.input_address, self.input_phone),
            lookup: LookupResult {
                found: self.lookup_found,
                name: non_empty(self.lookup_name),
                address: non_empty(self.lookup_address),
                phone: non_empty(self.lookup_phone),
            },
            verdicts: FieldVerdicts {
                name: FieldVerdict {
                    score: self.score_name,
                    matched: self.matched_name,
                },
                address: FieldVerdict {
                    score: self.score_address,
                    matched: self.matched_address,
                },
                phone: FieldVerdict {
                    score: self.score_phone,
                    matched: self.matched_phone,
                },
            },
            overall: self.overall,
            status: self.status,
            error: non_empty(self.error),
        }
    }
}

/// Serialize rows to CSV bytes (header included)
pub fn to_csv_bytes(rows: &[AuditRow]) -> Result<Vec<u8>, AuditError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(Vec::new());

    for row in rows {
        writer
            .serialize(ReportRecord::from(row))
            .map_err(|e| AuditError::SinkWrite(format!("CSV serialization failed: {}", e)))?;
    }

    // An empty report still carries its header row
    if rows.is_empty() {
        writer
            .write_record(REPORT_COLUMNS)
            .map_err(|e| AuditError::SinkWrite(format!("CSV serialization failed: {}", e)))?;
    }

    writer
        .into_inner()
        .map_err(|e| AuditError::SinkWrite(format!("CSV flush failed: {}", e)))
}

/// Report header, in column order
pub const REPORT_COLUMNS: [&str; 16] = [
    "input_name",
    "input_address",
    "input_phone",
    "lookup_found",
    "lookup_name",
    "lookup_address",
    "lookup_phone",
    "score_name",
    "score_address",
    "score_phone",
    "matched_name",
    "matched_address",
    "matched_phone",
    "overall",
    "status",
    "error",
];

/// Parse a report back into audit rows
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<AuditRow>, AuditError> {
    let mut csv = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);

    csv.deserialize::<ReportRecord>()
        .enumerate()
        .map(|(i, record)| {
            record.map(|r| r.into_row(i + 1)).map_err(|e| {
                AuditError::MalformedInput(format!("Report parse error at row {}: {}", i + 1, e))
            })
        })
        .collect()
}

/// Where a report is persisted
pub enum ResultSink {
    File(FileSink),
    Blob(BlobSink),
}

impl ResultSink {
    /// Build the sink selected by configuration for a run started at `run_date`
    pub fn from_config(config: &OutputConfig, run_date: DateTime<Utc>) -> Result<Self, AuditError> {
        match config {
            OutputConfig::File { path } => Ok(ResultSink::File(FileSink::new(path.clone()))),
            OutputConfig::Blob(blob) => Ok(ResultSink::Blob(BlobSink::new(blob, run_date)?)),
        }
    }

    /// Human-readable destination for logs and summaries
    pub fn describe(&self) -> String {
        match self {
            ResultSink::File(sink) => sink.path.display().to_string(),
            ResultSink::Blob(sink) => sink.display_url(),
        }
    }

    /// Persist all rows
    pub async fn write(&self, rows: &[AuditRow]) -> Result<(), AuditError> {
        let bytes = to_csv_bytes(rows)?;
        match self {
            ResultSink::File(sink) => sink.write_bytes(&bytes).await?,
            ResultSink::Blob(sink) => sink.upload(bytes).await?,
        }

        info!(
            destination = %self.describe(),
            rows = rows.len(),
            "Audit report written"
        );
        Ok(())
    }
}

/// Local CSV file, replaced atomically
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn write_bytes(&self, bytes: &[u8]) -> Result<(), AuditError> {
        let fail = |e: std::io::Error| {
            AuditError::SinkWrite(format!("Cannot write {}: {}", self.path.display(), e))
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(fail)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, bytes).await.map_err(fail)?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(fail(e));
        }

        Ok(())
    }
}

/// Object-storage blob written with a single HTTP PUT
pub struct BlobSink {
    http_client: reqwest::Client,
    blob_url: String,
    sas_token: Option<String>,
}

impl BlobSink {
    pub fn new(config: &BlobConfig, run_date: DateTime<Utc>) -> Result<Self, AuditError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AuditError::SinkWrite(format!("HTTP client setup failed: {}", e)))?;

        let blob_name = expand_blob_name(&config.blob_name, run_date);
        let blob_url = format!(
            "{}/{}",
            config.container_url.trim_end_matches('/'),
            blob_name.trim_start_matches('/')
        );

        Ok(Self {
            http_client,
            blob_url,
            sas_token: config
                .sas_token
                .as_ref()
                .map(|t| t.trim_start_matches('?').to_string()),
        })
    }

    /// Blob URL without the access token
    pub fn display_url(&self) -> String {
        self.blob_url.clone()
    }

    async fn upload(&self, bytes: Vec<u8>) -> Result<(), AuditError> {
        let url = match &self.sas_token {
            Some(token) => format!("{}?{}", self.blob_url, token),
            None => self.blob_url.clone(),
        };

        let response = self
            .http_client
            .put(&url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("Content-Type", "text/csv")
            .body(bytes)
            .send()
            .await
            .map_err(|e| {
                AuditError::SinkWrite(format!(
                    "Upload to {} failed: {}",
                    self.blob_url,
                    e.without_url()
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuditError::SinkWrite(format!(
                "Upload to {} rejected with HTTP {}: {}",
                self.blob_url,
                status.as_u16(),
                body
            )));
        }

        Ok(())
    }
}

/// Expand `{date}` to the run date (YYYY-MM-DD)
pub fn expand_blob_name(template: &str, run_date: DateTime<Utc>) -> String {
    template.replace("{date}", &run_date.format("%Y-%m-%d").to_string())
}
