pub mod checks;
pub mod client;
pub mod columns;
pub mod config;
pub mod dates;
pub mod error;
pub mod fetch;
pub mod findings;
pub mod models;
pub mod negotiate;
pub mod pager;
pub mod probe;
pub mod report;
pub mod snapshot;
pub mod source;

#[cfg(test)]
mod test_source;

// Re-export key types for use in tests and external applications
pub use crate::checks::{Check, CheckReport, Status, run_checks};
pub use crate::client::{Client, PageQuery, RequestKind, SourceClient};
pub use crate::config::{Sr311Config, Thresholds, create_example_config, load_config};
pub use crate::error::{Error, Result};
pub use crate::fetch::{FetchMode, FetchOptions, FetchOutcome, Fetcher};
pub use crate::findings::Findings;
pub use crate::models::{Dataset, FetchWindow, Page, Record};
pub use crate::pager::StopReason;
pub use crate::report::{IngestSummary, Marker, Reporter};

