// Error types for sr311 ingestion and reporting
use std::path::PathBuf;

/// Longest response body excerpt kept in a transport error.
pub const BODY_EXCERPT_CHARS: usize = 800;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("--created-field '{column}' not found in dataset columns: {schema:?}")]
    OverrideNotInSchema { column: String, schema: Vec<String> },

    #[error(
        "No suitable date column found. Checked: {}. Dataset columns: {schema:?}",
        candidates.join(", ")
    )]
    NoDateColumn {
        candidates: Vec<String>,
        schema: Vec<String>,
    },

    #[error("HTTP {status} from Socrata.\nURL: {url}\nMessage: {body}")]
    Transport {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse JSON response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("CSV path missing. Use --path data/chi311.csv")]
    MissingCsvPath,

    #[error("CSV file not found: {}", path.display())]
    CsvNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl Error {
    /// Build a transport error, keeping only the head of the response body.
    pub fn transport(status: u16, url: impl Into<String>, body: &str) -> Self {
        Error::Transport {
            status,
            url: url.into(),
            body: excerpt(body),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }
}

fn excerpt(body: &str) -> String {
    match body.char_indices().nth(BODY_EXCERPT_CHARS) {
        Some((cut, _)) => body[..cut].to_string(),
        None => body.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
