//! Binary crate for the `weather-etl` job.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive configuration
//! - Wiring provider, store and clock into the pipeline

use clap::Parser;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Before the filter is built, so RUST_LOG may come from .env too.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_etl=info,weather_etl_core=info".into()),
        )
        .init();

    let cmd = cli::Cli::parse();
    cmd.run().await
}
