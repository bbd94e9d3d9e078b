//! Record source: delimited input file → ordered `InputRecord`s
//!
//! Only the presence of the required columns is checked here. Empty cells are
//! passed through unchanged; judging content is the comparator's job.

use nap_common::config::InputConfig;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::error::AuditError;
use crate::models::InputRecord;

/// Reads input records using the configured column mapping
pub struct RecordSource {
    config: InputConfig,
}

/// Header positions resolved against the configured column names
struct ColumnMap {
    name: usize,
    address: usize,
    phone: usize,
    address_extras: Vec<usize>,
}

impl RecordSource {
    pub fn new(config: InputConfig) -> Self {
        Self { config }
    }

    /// Load all records from `path`, preserving file order
    pub fn load(&self, path: &Path) -> Result<Vec<InputRecord>, AuditError> {
        let file = File::open(path).map_err(|e| {
            AuditError::MalformedInput(format!("Cannot open {}: {}", path.display(), e))
        })?;

        let records = self.load_from_reader(file)?;
        info!(
            path = %path.display(),
            records = records.len(),
            "Input records loaded"
        );
        Ok(records)
    }

    /// Load records from any reader (header row required)
    pub fn load_from_reader<R: Read>(&self, reader: R) -> Result<Vec<InputRecord>, AuditError> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .delimiter(self.config.delimiter as u8)
            .from_reader(reader);

        let headers = csv
            .headers()
            .map_err(|e| AuditError::MalformedInput(format!("Cannot read header row: {}", e)))?
            .clone();

        let columns = self.resolve_columns(&headers)?;
        let mut records = Vec::new();

        for (i, result) in csv.records().enumerate() {
            let row = result.map_err(|e| {
                AuditError::MalformedInput(format!("CSV parse error at row {}: {}", i + 1, e))
            })?;

            let cell = |idx: usize| row.get(idx).unwrap_or("").to_string();

            let mut address_parts = vec![cell(columns.address)];
            address_parts.extend(columns.address_extras.iter().map(|idx| cell(*idx)));
            let address = address_parts
                .into_iter()
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(", ");

            records.push(InputRecord::new(
                i + 1,
                cell(columns.name),
                address,
                cell(columns.phone),
            ));
        }

        Ok(records)
    }

    fn resolve_columns(&self, headers: &csv::StringRecord) -> Result<ColumnMap, AuditError> {
        let position = |column: &str| headers.iter().position(|h| h == column.trim());

        let mut missing = Vec::new();
        let mut require = |column: &str| {
            let idx = position(column);
            if idx.is_none() {
                missing.push(column.to_string());
            }
            idx
        };

        let name = require(&self.config.name_column);
        let address = require(&self.config.address_column);
        let phone = require(&self.config.phone_column);

        let (Some(name), Some(address), Some(phone)) = (name, address, phone) else {
            return Err(AuditError::MalformedInput(format!(
                "Missing required column(s): {} (found: {})",
                missing.join(", "),
                headers.iter().collect::<Vec<_>>().join(", ")
            )));
        };

        let address_extras = self
            .config
            .address_extra_columns
            .iter()
            .filter_map(|column| {
                let idx = position(column);
                if idx.is_none() {
                    warn!(column = %column, "Address column not in input, skipping");
                }
                idx
            })
            .collect();

        Ok(ColumnMap {
            name,
            address,
            phone,
            address_extras,
        })
    }
}
