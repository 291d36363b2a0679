use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use snapflow::fetch::ReqwestClient;
use snapflow::{Config, LogOptions, Overrides, Pipeline, setup_logger};
use tracing::{error, info};

/// Download a compressed tar snapshot with parallel ranged requests and
/// unpack it while it downloads.
#[derive(Debug, Parser)]
#[command(name = "snapflow", version, about)]
struct Cli {
    /// Configuration file (default: ./snapflow.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log everything down to trace level.
    #[arg(short, long)]
    verbose: bool,

    /// Log as JSON lines.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    overrides: Overrides,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = setup_logger(LogOptions {
        verbose: cli.verbose,
        json:    cli.json,
    }) {
        eprintln!("failed to set up logging: {e}");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config =
        Config::load(cli.config.as_deref(), &cli.overrides).context("failed to load configuration")?;
    let pipeline = Pipeline::new(ReqwestClient::new(), config.pipeline_options()?);
    let url = config.source()?.resolve(pipeline.fetcher()).await?;

    let report = pipeline
        .run(&url, &config.destination)
        .await
        .with_context(|| format!("failed to restore {url}"))?;

    info!(
        bytes = report.downloaded_bytes,
        entries = report.extract.entry_count,
        extracted_bytes = report.extract.total_bytes,
        elapsed_secs = report.throughput.elapsed.as_secs(),
        "rate (MiB/s): {:.2}",
        report.throughput.mib_per_sec
    );
    Ok(())
}
