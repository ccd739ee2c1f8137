use crate::common::{Context, SourceKind};
use anyhow::{Context as _, Result};
use chrono::Utc;
use clap::Args;
use sr311::report::{write_marker, write_report};
use sr311::{Findings, Marker, Reporter};
use std::path::PathBuf;

pub const READY_SIGNAL: &str = "READY_TO_PROCEED";

#[derive(Args, Debug)]
pub struct ExploreArgs {
    #[arg(long, value_enum, default_value_t = SourceKind::Api)]
    pub source: SourceKind,

    /// Rows to sample from the API
    #[arg(long, default_value_t = 1000)]
    pub limit: usize,

    /// CSV export to read when --source csv
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Report path [default: <notes_dir>/data_quality_findings.md]
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Write the step marker and print the ready signal
    #[arg(long)]
    pub mark_done: bool,
}

pub fn explore_command(ctx: &Context, args: &ExploreArgs) -> Result<()> {
    let out = ctx.notes_path(args.out.as_deref(), "data_quality_findings.md");
    let dataset = ctx.load_dataset(args.source, args.limit, args.path.as_deref())?;

    let findings = Findings::collect(&dataset, Utc::now());
    let report = Reporter::new()?.findings(&findings)?;
    write_report(&out, &report).with_context(|| format!("Failed to write {}", out.display()))?;
    println!("Wrote {}", out.display());

    if args.mark_done {
        write_marker(&ctx.config.notes_dir, Marker::Explore)?;
        println!("{READY_SIGNAL}");
    }
    Ok(())
}
