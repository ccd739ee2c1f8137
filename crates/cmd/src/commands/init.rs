use anyhow::{Context, Result, bail};
use diagnostics::*;
use std::path::Path;

pub fn init_command(path: &Path) -> Result<()> {
    let display = path.display().to_string();
    if path.exists() {
        bail!("Configuration file already exists: {display}. Delete it first if you want a new one.");
    }

    sr311::create_example_config(path)
        .with_context(|| format!("Failed to create configuration file: {display}"))?;

    info!("Created example configuration file: {display}");
    println!("Created {display}");
    println!("Edit endpoint, app_token and thresholds as needed, then run: sr311 --config {display} fetch");
    Ok(())
}
