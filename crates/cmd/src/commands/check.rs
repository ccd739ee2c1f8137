use crate::common::{Context, SourceKind};
use anyhow::{Context as _, Result};
use chrono::Utc;
use clap::Args;
use diagnostics::*;
use sr311::report::{write_marker, write_report};
use sr311::{Marker, Reporter, run_checks};
use std::path::PathBuf;

pub const READY_SIGNAL: &str = "STEP2_READY_TO_PROCEED";
pub const ATTENTION_SIGNAL: &str = "STEP2_ATTENTION_NEEDED";

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[arg(long, value_enum, default_value_t = SourceKind::Api)]
    pub source: SourceKind,

    /// Rows to sample from the API
    #[arg(long, default_value_t = 50_000)]
    pub limit: usize,

    /// CSV export to read when --source csv
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Report path [default: <notes_dir>/data_quality_checks.md]
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Write the step marker once the report is written
    #[arg(long)]
    pub mark_done: bool,
}

/// Returns whether the overall status is PASS
pub fn check_command(ctx: &Context, args: &CheckArgs) -> Result<bool> {
    let out = ctx.notes_path(args.out.as_deref(), "data_quality_checks.md");
    let dataset = ctx.load_dataset(args.source, args.limit, args.path.as_deref())?;

    let report = run_checks(&dataset, &ctx.config.thresholds, Utc::now());
    let rendered = Reporter::new()?.checks(&report)?;
    write_report(&out, &rendered).with_context(|| format!("Failed to write {}", out.display()))?;
    println!("Wrote {}", out.display());

    let overall = report.overall.to_string();
    info!("Quality checks finished with {overall}");

    if args.mark_done {
        write_marker(&ctx.config.notes_dir, Marker::Check)?;
    }
    if report.passed() {
        println!("{READY_SIGNAL}");
    } else {
        println!("{ATTENTION_SIGNAL}");
    }
    Ok(report.passed())
}
