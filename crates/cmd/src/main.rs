use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use diagnostics::{LogLevel, init_with_level};

mod commands;
mod common;

use commands::{CheckArgs, ExploreArgs, FetchArgs, PeekArgs};
use common::Context;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "sr311")]
/// Pull, inspect and quality-check Chicago 311 service requests
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// YAML configuration file (default: ./sr311.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull recent requests and write a Parquet snapshot with an ingest summary
    Fetch(FetchArgs),
    /// Print row count, columns and missing values of a sample
    Peek(PeekArgs),
    /// Write the data quality findings report
    Explore(ExploreArgs),
    /// Run the quality checks and write the checks report
    Check(CheckArgs),
    /// Create an example configuration file
    Init {
        /// Where to write the configuration
        #[arg(default_value = "sr311.yaml")]
        path: PathBuf,
    },
}

fn run(cli: &Cli) -> Result<ExitCode> {
    if let Commands::Init { path } = &cli.command {
        commands::init_command(path)?;
        return Ok(ExitCode::SUCCESS);
    }

    let ctx = Context::load(cli.config.as_deref())?;
    match &cli.command {
        Commands::Fetch(args) => commands::fetch_command(&ctx, args)?,
        Commands::Peek(args) => commands::peek_command(&ctx, args)?,
        Commands::Explore(args) => commands::explore_command(&ctx, args)?,
        Commands::Check(args) => {
            if !commands::check_command(&ctx, args)? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Init { .. } => {}
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_with_level(cli.verbose.then_some(LogLevel::Debug));

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
