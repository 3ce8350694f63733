use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use mockwave::cli::{Cli, Commands};
use mockwave::stage;

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("mockwave: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.pipeline_config().context("loading configuration")?;

    let report = match cli.command {
        Commands::Extract(args) => {
            stage::run_extract(&args.into(), &config).context("extract stage failed")?
        }
        Commands::Synthesize(args) => {
            stage::run_synthesize(&args.into(), &config).context("synthesize stage failed")?
        }
        Commands::Evaluate(args) => {
            stage::run_evaluate(&args.into(), &config).context("evaluate stage failed")?
        }
    };

    log::info!("Done: {} records written", report.records_written);
    Ok(())
}
