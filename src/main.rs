// Main entry point - Logging, argument parsing and command dispatch
mod domain;
mod application;
mod infrastructure;
mod presentation;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::presentation::cli::{Cli, Command};
use crate::presentation::commands;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing, RUST_LOG wins over the default
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => {
            let summary = commands::run(args).await?;
            if summary.interrupted {
                std::process::exit(130);
            }
        }
        Command::Convert(args) => commands::convert(args).await?,
    }

    Ok(())
}
