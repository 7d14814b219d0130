mod cli;
mod commands;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use stargazers::config::AppConfig;
use stargazers::logging;

use crate::cli::{Args, Commands};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Application error: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    let guard = logging::init_logging(&config.logging, args.verbose)
        .context("Failed to initialize logging")?;
    let shutdown = CancellationToken::new();
    guard.start_retention_cleanup(shutdown.clone());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        repo = %config.repo,
        "stargazers starting"
    );

    let result = match args.command() {
        Commands::Watch => commands::watch(&config, shutdown.clone()).await,
        Commands::Kol { top, concurrency } => commands::kol(&config, top, concurrency).await,
        Commands::TestChannels => commands::test_channels(&config).await,
    };

    shutdown.cancel();
    result
}
