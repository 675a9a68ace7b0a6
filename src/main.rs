//! iob CLI entry point

use anyhow::{Context, Result};
use clap::Parser;
use iob::config::cli::{Cli, OutputFormat};
use iob::config::cli_convert::cli_to_config;
use iob::coordinator::Orchestrator;
use iob::error::BenchError;
use iob::output::{json, text};
use iob::util::logging;
use iob::worker::EXIT_DATA_CORRUPTION;
use tracing::info;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = cli_to_config(&cli).context("Invalid command line")?;
    let orchestrator = Orchestrator::new(config)?;

    if cli.dry_run {
        let plan = orchestrator.plan();
        match cli.output {
            OutputFormat::Text => print!("{}", text::render_plan(&plan)),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        }
        return Ok(());
    }

    let report = match orchestrator.run() {
        Ok(report) => report,
        Err(err @ BenchError::DataCorruption { .. }) => {
            eprintln!("Error: {}", err);
            std::process::exit(EXIT_DATA_CORRUPTION);
        }
        Err(err) => return Err(err.into()),
    };

    info!(
        elapsed_secs = report.elapsed_secs,
        failed_units = report.failed_units().count(),
        "run finished"
    );

    match cli.output {
        OutputFormat::Text => print!("{}", text::render(&report)),
        OutputFormat::Json => println!("{}", json::render(&report)?),
    }

    Ok(())
}
