use crate::client::{Client, DEFAULT_ENDPOINT};
use crate::error::{Error, Result};
use crate::fetch::{DEFAULT_CHUNK_SIZE, DEFAULT_DAYS, DEFAULT_MAX_PAGES, FetchOptions, MAX_DAYS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the Socrata app token
pub const APP_TOKEN_ENV: &str = "SOCRATA_APP_TOKEN";

/// Thresholds used by the quality checks
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Thresholds {
    /// Missing share in a required field above which it is a WARN
    pub required_null_rate: f64,
    /// Null/zero coordinate share above which it is a WARN
    pub coordinate_anomaly_rate: f64,
    /// Top-address share of information-only calls reported as INFO
    pub info_address_dominance: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            required_null_rate: 0.005,
            coordinate_anomaly_rate: 0.15,
            info_address_dominance: 0.40,
        }
    }
}

/// Tool configuration, usually from `sr311.yaml`; every field has a default
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Sr311Config {
    pub endpoint: String,
    pub app_token: Option<String>,
    /// Human duration, e.g. "60s"
    pub probe_timeout: String,
    /// Human duration, e.g. "2m"
    pub page_timeout: String,
    pub chunk_size: usize,
    pub days: u32,
    pub max_pages: usize,
    pub data_dir: PathBuf,
    pub notes_dir: PathBuf,
    pub thresholds: Thresholds,
}

impl Default for Sr311Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            app_token: None,
            probe_timeout: "60s".to_string(),
            page_timeout: "120s".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            days: DEFAULT_DAYS,
            max_pages: DEFAULT_MAX_PAGES,
            data_dir: PathBuf::from("data"),
            notes_dir: PathBuf::from("notes"),
            thresholds: Thresholds::default(),
        }
    }
}

impl Sr311Config {
    /// Token from the config, else from `SOCRATA_APP_TOKEN`
    pub fn app_token(&self) -> Option<String> {
        self.app_token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var(APP_TOKEN_ENV).ok().filter(|t| !t.is_empty()))
    }

    pub fn probe_timeout(&self) -> Result<Duration> {
        parse_timeout("probe_timeout", &self.probe_timeout)
    }

    pub fn page_timeout(&self) -> Result<Duration> {
        parse_timeout("page_timeout", &self.page_timeout)
    }

    /// Blocking client for the configured endpoint
    pub fn client(&self) -> Result<Client> {
        Ok(Client::new(&self.endpoint, self.app_token())?
            .with_timeouts(self.probe_timeout()?, self.page_timeout()?))
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            days_back: self.days,
            chunk_size: self.chunk_size,
            created_field: None,
            max_pages: self.max_pages,
        }
    }
}

fn parse_timeout(name: &str, value: &str) -> Result<Duration> {
    parse_duration::parse(value)
        .map_err(|e| Error::config(format!("{name} '{value}' is not a duration: {e}")))
}

/// Load configuration from YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Sr311Config> {
    let content = std::fs::read_to_string(&path).map_err(|e| {
        Error::config(format!(
            "Failed to read config file {}: {e}",
            path.as_ref().display()
        ))
    })?;

    let config: Sr311Config = serde_yaml_ng::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration
pub fn validate_config(config: &Sr311Config) -> Result<()> {
    if config.endpoint.trim().is_empty() {
        return Err(Error::config("endpoint cannot be empty"));
    }
    if config.chunk_size == 0 {
        return Err(Error::config("chunk_size must be greater than 0"));
    }
    if config.max_pages == 0 {
        return Err(Error::config("max_pages must be greater than 0"));
    }
    if config.days > MAX_DAYS {
        return Err(Error::config(format!(
            "days out of range: {} (at most {MAX_DAYS})",
            config.days
        )));
    }
    config.probe_timeout()?;
    config.page_timeout()?;

    let t = &config.thresholds;
    for (name, rate) in [
        ("required_null_rate", t.required_null_rate),
        ("coordinate_anomaly_rate", t.coordinate_anomaly_rate),
        ("info_address_dominance", t.info_address_dominance),
    ] {
        if !(0.0..=1.0).contains(&rate) {
            return Err(Error::config(format!("thresholds.{name} must be within [0, 1], got {rate}")));
        }
    }
    Ok(())
}

const EXAMPLE_CONFIG: &str = r#"# sr311 configuration
#
# Socrata resource to read. Any 311 dataset exposing JSON rows works.
endpoint: "https://data.cityofchicago.org/resource/v6vf-nfxy.json"

# Optional app token for higher rate limits.
# Leave empty to use the SOCRATA_APP_TOKEN environment variable.
app_token: ""

probe_timeout: "60s"
page_timeout: "120s"

# Rows per page, days back from now, and the page budget when the
# source rejects every date filter.
chunk_size: 50000
days: 90
max_pages: 30

data_dir: "data"
notes_dir: "notes"

thresholds:
  required_null_rate: 0.005
  coordinate_anomaly_rate: 0.15
  info_address_dominance: 0.40
"#;

/// Write an example configuration file. Refuses to overwrite.
pub fn create_example_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        return Err(Error::config(format!(
            "Configuration file already exists: {}",
            path.display()
        )));
    }
    crate::report::ensure_parent(path)?;
    std::fs::write(path, EXAMPLE_CONFIG)?;
    Ok(())
}
