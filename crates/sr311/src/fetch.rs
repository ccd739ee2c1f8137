//! Resilient pull of recent service requests
//!
//! probe schema → pick date candidates → negotiate a server-side filter →
//! page with that filter, or page blind and filter locally.

use crate::client::SourceClient;
use crate::error::{Error, Result};
use crate::models::{Dataset, FetchWindow, Record};
use crate::negotiate::{self, Attempt, Negotiation, ServerFilter};
use crate::pager::{self, BlindScan, StopReason};
use crate::probe::{self, SchemaSnapshot};
use diagnostics::*;

pub const DEFAULT_DAYS: u32 = 90;
pub const DEFAULT_CHUNK_SIZE: usize = 50_000;
pub const DEFAULT_MAX_PAGES: usize = 30;
/// Largest accepted window, about a century
pub const MAX_DAYS: u32 = 36_500;

/// Parameters of one fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Days back from now (UTC)
    pub days_back: u32,
    /// Rows per page
    pub chunk_size: usize,
    /// Filter on this column instead of discovering one
    pub created_field: Option<String>,
    /// Page budget when paging blind
    pub max_pages: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            days_back: DEFAULT_DAYS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            created_field: None,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl FetchOptions {
    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::config("chunk size must be greater than 0"));
        }
        if self.max_pages == 0 {
            return Err(Error::config("max pages must be greater than 0"));
        }
        if self.days_back > MAX_DAYS {
            return Err(Error::config(format!(
                "days back out of range: {} (at most {MAX_DAYS})",
                self.days_back
            )));
        }
        Ok(())
    }
}

/// How the rows were obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchMode {
    ServerFiltered(ServerFilter),
    Blind {
        date_columns: Vec<String>,
        order: Option<String>,
    },
}

/// Everything a fetch produced
#[derive(Debug)]
pub struct FetchOutcome {
    pub records: Vec<Record>,
    pub window: FetchWindow,
    pub schema: SchemaSnapshot,
    pub mode: FetchMode,
    pub page_sizes: Vec<usize>,
    pub stop: StopReason,
    pub rejected: Vec<Attempt>,
}

impl FetchOutcome {
    /// Move the rows out as a dataset labelled `source_label`.
    ///
    /// With no rows the probed schema still supplies the column list.
    pub fn take_dataset(&mut self, source_label: impl Into<String>) -> Dataset {
        let mut dataset = Dataset::from_records(source_label, std::mem::take(&mut self.records));
        if dataset.is_empty() {
            dataset.columns = self.schema.sorted();
        }
        dataset
    }
}

/// Runs fetches against one source
pub struct Fetcher<'a> {
    client: &'a dyn SourceClient,
}

impl<'a> Fetcher<'a> {
    pub fn new(client: &'a dyn SourceClient) -> Self {
        Self { client }
    }

    /// Fetch rows from the last `days_back` days, measured from now
    pub fn fetch(&self, options: &FetchOptions) -> Result<FetchOutcome> {
        options.validate()?;
        self.fetch_within(FetchWindow::from_now(options.days_back)?, options)
    }

    /// Fetch rows at or after `window`'s cutoff
    pub fn fetch_within(&self, window: FetchWindow, options: &FetchOptions) -> Result<FetchOutcome> {
        options.validate()?;
        let cutoff = window.cutoff_literal();
        info!("Fetching service requests since {cutoff}");

        let schema = probe::probe_schema(self.client)?;
        let candidates = negotiate::candidate_columns(&schema, options.created_field.as_deref())?;
        debug!("Date candidates: {#[emit::as_debug] candidates}");

        match negotiate::negotiate(self.client, &candidates, &window, options.chunk_size)? {
            Negotiation::Accepted {
                filter,
                first_rows,
                rejected,
            } => {
                let paged = pager::page_filtered(self.client, &filter, first_rows, options.chunk_size)?;
                Ok(FetchOutcome {
                    records: paged.records,
                    window,
                    schema,
                    mode: FetchMode::ServerFiltered(filter),
                    page_sizes: paged.page_sizes,
                    stop: StopReason::Exhausted,
                    rejected,
                })
            }
            Negotiation::Exhausted { rejected } => {
                warn!("Falling back to blind pagination with local date filtering");
                let order = candidates.first().cloned();
                let scan = BlindScan {
                    date_columns: &candidates,
                    order: order.as_deref(),
                    chunk_size: options.chunk_size,
                    max_pages: options.max_pages,
                };
                let paged = pager::page_blind(self.client, &scan, &window)?;
                Ok(FetchOutcome {
                    records: paged.records,
                    window,
                    schema,
                    mode: FetchMode::Blind {
                        date_columns: candidates.clone(),
                        order,
                    },
                    page_sizes: paged.page_sizes,
                    stop: paged.stop.unwrap_or(StopReason::Exhausted),
                    rejected,
                })
            }
        }
    }
}
