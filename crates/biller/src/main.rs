//! Command-line entry point for the biller.

use std::path::PathBuf;

use biller::prelude::*;
use clap::Parser;

/// Session and authentication broker for game zones.
#[derive(Parser, Debug)]
#[command(name = "biller", version)]
struct Args {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on for zones (overrides the config file)
    #[arg(long)]
    bind: Option<String>,

    /// Account database path (overrides the config file)
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => BillerConfig::load(path)?,
        None => BillerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(database) = args.database {
        config.database = database;
    }

    tracing::info!(
        bind = %config.bind,
        database = %config.database.display(),
        "starting biller"
    );

    let server = BillerServer::builder().config(config).build().await?;
    server.run().await
}
