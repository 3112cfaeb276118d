//! CLI entry point for czds-dl.

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = czds_dl::cli::Cli::parse();
    std::process::exit(czds_dl::cli::run(cli).await);
}
