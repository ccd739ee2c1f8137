use crate::common::{Context, SourceKind};
use anyhow::Result;
use clap::Args;
use sr311::Dataset;
use sr311::findings::missing_counts;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct PeekArgs {
    #[arg(long, value_enum, default_value_t = SourceKind::Api)]
    pub source: SourceKind,

    /// Rows to sample from the API
    #[arg(long, default_value_t = 1000)]
    pub limit: usize,

    /// CSV export to read when --source csv
    #[arg(long)]
    pub path: Option<PathBuf>,
}

fn render(dataset: &Dataset) -> String {
    let mut out = format!("Loaded {} rows from {}\n", dataset.len(), dataset.source_label);
    out.push_str(&format!("Columns ({}): {}\n", dataset.columns.len(), dataset.columns.join(", ")));
    out.push_str("Missing values:\n");
    for m in missing_counts(dataset) {
        out.push_str(&format!("  {}: {} ({:.2}%)\n", m.column, m.missing, m.percent));
    }
    out
}

pub fn peek_command(ctx: &Context, args: &PeekArgs) -> Result<()> {
    let dataset = ctx.load_dataset(args.source, args.limit, args.path.as_deref())?;
    print!("{}", render(&dataset));
    Ok(())
}
