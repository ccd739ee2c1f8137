use crate::common::{Context, SourceKind};
use anyhow::{Context as _, Result};
use clap::Args;
use diagnostics::*;
use sr311::report::{write_marker, write_report};
use sr311::{Dataset, FetchOptions, FetchOutcome, Fetcher, IngestSummary, Marker, Reporter};
use std::path::PathBuf;

/// Ready signal read by the next pipeline step
pub const READY_SIGNAL: &str = "DATA_READY_TO_PROCEED";

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Days back from now (UTC)
    #[arg(long)]
    pub days: Option<u32>,

    /// Parquet snapshot path [default: <data_dir>/raw_311.parquet]
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Ingest summary path [default: <notes_dir>/data_ingest_summary.md]
    #[arg(long)]
    pub summary: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = SourceKind::Api)]
    pub source: SourceKind,

    /// CSV export to read when --source csv
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Filter on this date column instead of discovering one
    #[arg(long)]
    pub created_field: Option<String>,

    /// Page budget when the source rejects every date filter
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Rows per request
    #[arg(long)]
    pub chunk_size: Option<usize>,
}

impl FetchArgs {
    /// Configured options with the command-line flags applied on top
    fn options(&self, ctx: &Context) -> FetchOptions {
        let mut options = ctx.config.fetch_options();
        if let Some(days) = self.days {
            options.days_back = days;
        }
        if let Some(chunk_size) = self.chunk_size {
            options.chunk_size = chunk_size;
        }
        if let Some(max_pages) = self.max_pages {
            options.max_pages = max_pages;
        }
        options.created_field = self.created_field.clone();
        options
    }
}

fn fetch_api(ctx: &Context, options: &FetchOptions) -> Result<(Dataset, FetchOutcome)> {
    let client = ctx.config.client().context("Failed to create Socrata client")?;
    let mut outcome = Fetcher::new(&client).fetch(options)?;
    let dataset = outcome.take_dataset(format!("API (last {} days)", options.days_back));
    Ok((dataset, outcome))
}

pub fn fetch_command(ctx: &Context, args: &FetchArgs) -> Result<()> {
    let out = ctx.data_path(args.out.as_deref(), "raw_311.parquet");
    let summary_path = ctx.notes_path(args.summary.as_deref(), "data_ingest_summary.md");

    let (dataset, outcome) = match args.source {
        SourceKind::Api => {
            let (dataset, outcome) = fetch_api(ctx, &args.options(ctx))?;
            (dataset, Some(outcome))
        }
        SourceKind::Csv => (sr311::source::load_csv(args.path.as_deref())?, None),
    };

    let rows = dataset.len();
    info!("Writing snapshot of {rows} rows");
    sr311::snapshot::write_parquet(&dataset, &out)
        .with_context(|| format!("Failed to write snapshot {}", out.display()))?;

    let summary = Reporter::new()?.ingest_summary(&IngestSummary::new(&dataset, outcome.as_ref()))?;
    write_report(&summary_path, &summary)
        .with_context(|| format!("Failed to write summary {}", summary_path.display()))?;
    write_marker(&ctx.config.notes_dir, Marker::Ingest)?;

    println!("Wrote {} and {}", out.display(), summary_path.display());
    println!("{READY_SIGNAL}");
    Ok(())
}
