//! Configuration loading for the NAP audit service
//!
//! Settings are resolved once at startup with this priority order:
//! 1. Command-line argument (applied by the binary on top of the result)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Built-in defaults
//!
//! A missing default config file is not an error: a warning is logged and the
//! built-in defaults are used. An explicitly requested file must exist.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the TOML config file
pub const CONFIG_ENV_VAR: &str = "NAP_CONFIG";

/// Default HTTP bind address for `serve`
pub const DEFAULT_BIND: &str = "127.0.0.1:5780";

/// Default Places API host
pub const DEFAULT_PLACES_BASE_URL: &str = "https://maps.googleapis.com";

/// Default blob name; `{date}` expands to the UTC run date
pub const DEFAULT_BLOB_NAME: &str = "nap_audit_{date}.csv";

/// Audited listing field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NapField {
    Name,
    Address,
    Phone,
}

impl NapField {
    /// All fields in report order
    pub const ALL: [NapField; 3] = [NapField::Name, NapField::Address, NapField::Phone];
}

impl fmt::Display for NapField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NapField::Name => write!(f, "name"),
            NapField::Address => write!(f, "address"),
            NapField::Phone => write!(f, "phone"),
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub input: InputConfig,
    pub lookup: LookupConfig,
    pub matching: MatchingConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// HTTP trigger settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address for `serve`
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

/// Input dataset settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InputConfig {
    /// Path to the delimited input file
    pub path: PathBuf,
    /// Field delimiter (single ASCII character)
    pub delimiter: char,
    /// Header of the business name column
    pub name_column: String,
    /// Header of the street address column
    pub address_column: String,
    /// Header of the phone column
    pub phone_column: String,
    /// Optional columns appended to the address (e.g. City, ZipCode, Country)
    pub address_extra_columns: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("nap_input.csv"),
            delimiter: ',',
            name_column: "name".to_string(),
            address_column: "address".to_string(),
            phone_column: "phone".to_string(),
            address_extra_columns: Vec::new(),
        }
    }
}

/// Location bias passed to the places search
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct LocationBias {
    pub lat: f64,
    pub lng: f64,
    /// Search radius in meters
    pub radius_m: u32,
}

/// Places lookup settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Places API key (prefer `NAP_PLACES_API_KEY`)
    pub api_key: Option<String>,
    /// API host, overridable for testing
    pub base_url: String,
    /// Client-side request budget
    pub requests_per_second: u32,
    /// Total per-request timeout
    pub timeout_secs: u64,
    /// Append the input address to the search text
    pub include_address_in_query: bool,
    pub location_bias: Option<LocationBias>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_PLACES_BASE_URL.to_string(),
            requests_per_second: 1,
            timeout_secs: 15,
            include_address_in_query: true,
            location_bias: None,
        }
    }
}

/// Comparator tuning
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum name score (0-100) to count as matched
    pub name_threshold: f64,
    /// Minimum address score (0-100) to count as matched
    pub address_threshold: f64,
    /// Trailing digits kept after phone normalization (0 keeps all digits)
    pub phone_significant_digits: usize,
    /// Fields that must all match for the overall verdict
    pub required_fields: Vec<NapField>,
    /// Let address token coverage raise the address score
    pub address_token_coverage: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            name_threshold: 80.0,
            address_threshold: 80.0,
            phone_significant_digits: 10,
            required_fields: NapField::ALL.to_vec(),
            address_token_coverage: true,
        }
    }
}

/// Object-storage blob destination
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BlobConfig {
    /// Container URL, e.g. `https://account.blob.core.windows.net/audits`
    pub container_url: String,
    /// Blob name; `{date}` expands to the UTC run date
    #[serde(default = "default_blob_name")]
    pub blob_name: String,
    /// Shared access signature appended as the query string
    #[serde(default)]
    pub sas_token: Option<String>,
}

fn default_blob_name() -> String {
    DEFAULT_BLOB_NAME.to_string()
}

/// Result destination
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputConfig {
    /// Local CSV file
    File { path: PathBuf },
    /// Object-storage blob uploaded over HTTP
    Blob(BlobConfig),
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig::File {
            path: PathBuf::from("nap_audit_results.csv"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log file path (logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML (if any) and the process environment
    ///
    /// `explicit` is the `--config` argument. Without it, `NAP_CONFIG` is
    /// consulted, then the per-user default location.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(CONFIG_ENV_VAR)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let mut config = match explicit.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::from_file(&path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    warn!("No config file found, using built-in defaults");
                    Self::default()
                }
            },
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Read and parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read config {} failed: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Parse TOML content; absent keys take built-in defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("NAP_PLACES_API_KEY") {
            if self.lookup.api_key.as_deref().is_some_and(is_valid_key) {
                warn!("Places API key found in both environment and TOML. Using environment.");
            }
            self.lookup.api_key = Some(key);
        }
        if let Some(url) = get("NAP_PLACES_BASE_URL") {
            self.lookup.base_url = url;
        }
        if let Some(path) = get("NAP_INPUT_PATH") {
            self.input.path = PathBuf::from(path);
        }
        if get("NAP_OUTPUT_PATH").is_some() && get("NAP_OUTPUT_BLOB_URL").is_some() {
            return Err(Error::Config(
                "NAP_OUTPUT_PATH and NAP_OUTPUT_BLOB_URL are both set; choose one destination"
                    .to_string(),
            ));
        }
        if let Some(path) = get("NAP_OUTPUT_PATH") {
            self.output = OutputConfig::File {
                path: PathBuf::from(path),
            };
        }
        if let Some(container_url) = get("NAP_OUTPUT_BLOB_URL") {
            let blob_name = get("NAP_OUTPUT_BLOB_NAME").unwrap_or_else(default_blob_name);
            self.output = OutputConfig::Blob(BlobConfig {
                container_url,
                blob_name,
                sas_token: None,
            });
        }
        if let Some(token) = get("NAP_BLOB_SAS_TOKEN") {
            if let OutputConfig::Blob(blob) = &mut self.output {
                blob.sas_token = Some(token);
            }
        }
        if let Some(value) = get("NAP_NAME_THRESHOLD") {
            self.matching.name_threshold = parse_env("NAP_NAME_THRESHOLD", &value)?;
        }
        if let Some(value) = get("NAP_ADDRESS_THRESHOLD") {
            self.matching.address_threshold = parse_env("NAP_ADDRESS_THRESHOLD", &value)?;
        }
        if let Some(value) = get("NAP_PHONE_DIGITS") {
            self.matching.phone_significant_digits = parse_env("NAP_PHONE_DIGITS", &value)?;
        }
        if let Some(bind) = get("NAP_BIND") {
            self.server.bind = bind;
        }
        if let Some(level) = get("NAP_LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Check value ranges; does not require an API key
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("name_threshold", self.matching.name_threshold),
            ("address_threshold", self.matching.address_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(Error::Config(format!(
                    "matching.{} must be within 0-100, got {}",
                    name, value
                )));
            }
        }

        if self.matching.required_fields.is_empty() {
            return Err(Error::Config(
                "matching.required_fields must name at least one field".to_string(),
            ));
        }

        if self.lookup.requests_per_second == 0 {
            return Err(Error::Config(
                "lookup.requests_per_second must be greater than zero".to_string(),
            ));
        }

        if !self.input.delimiter.is_ascii() {
            return Err(Error::Config(format!(
                "input.delimiter must be a single ASCII character, got '{}'",
                self.input.delimiter
            )));
        }

        for (name, column) in [
            ("name_column", &self.input.name_column),
            ("address_column", &self.input.address_column),
            ("phone_column", &self.input.phone_column),
        ] {
            if column.trim().is_empty() {
                return Err(Error::Config(format!("input.{} must not be empty", name)));
            }
        }

        if let OutputConfig::Blob(blob) = &self.output {
            if blob.container_url.trim().is_empty() || blob.blob_name.trim().is_empty() {
                return Err(Error::Config(
                    "output.container_url and output.blob_name are required for blob output"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Places API key, or a configuration error explaining how to supply one
    pub fn api_key(&self) -> Result<&str> {
        match self.lookup.api_key.as_deref() {
            Some(key) if is_valid_key(key) => Ok(key),
            _ => Err(Error::Config(
                "Places API key not configured. Please configure using one of:\n\
                 1. Environment: NAP_PLACES_API_KEY=your-key-here\n\
                 2. TOML config: [lookup] api_key = \"your-key\""
                    .to_string(),
            )),
        }
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Per-user config location: `<config_dir>/nap-audit/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("nap-audit").join("config.toml"))
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| Error::Config(format!("Invalid {}='{}': {}", key, value, e)))
}
