use anyhow::{Context as _, Result};
use clap::ValueEnum;
use diagnostics::*;
use sr311::{Dataset, Sr311Config, load_config};
use std::path::{Path, PathBuf};

/// Configuration picked up when `--config` is not given
pub const DEFAULT_CONFIG: &str = "sr311.yaml";

/// Where rows come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Socrata API
    Api,
    /// Local CSV export (needs --path)
    Csv,
}

/// Settings shared by every command
pub struct Context {
    pub config: Sr311Config,
}

impl Context {
    /// Load `path`, else `./sr311.yaml` if it exists, else built-in defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Some(PathBuf::from(DEFAULT_CONFIG)).filter(|p| p.exists()),
        };

        let config = match path {
            Some(path) => {
                let display = path.display().to_string();
                debug!("Loading configuration from: {display}");
                load_config(&path)
                    .with_context(|| format!("Failed to load configuration from: {display}"))?
            }
            None => Sr311Config::default(),
        };
        Ok(Context { config })
    }

    /// `file` under the configured notes directory, unless overridden
    pub fn notes_path(&self, explicit: Option<&Path>, file: &str) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.notes_dir.join(file))
    }

    /// `file` under the configured data directory, unless overridden
    pub fn data_path(&self, explicit: Option<&Path>, file: &str) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.data_dir.join(file))
    }

    /// A sample of `limit` rows from the API, or the whole CSV
    pub fn load_dataset(&self, source: SourceKind, limit: usize, path: Option<&Path>) -> Result<Dataset> {
        match source {
            SourceKind::Api => {
                let client = self.config.client().context("Failed to create Socrata client")?;
                sr311::source::load_api_sample(&client, limit)
                    .context("Failed to load sample from the API")
            }
            SourceKind::Csv => Ok(sr311::source::load_csv(path)?),
        }
    }
}
