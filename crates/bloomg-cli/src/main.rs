//! bloomg: command line client
//!
//! Sets up logging, resolves the connection settings and runs one
//! subcommand against the server.

mod cli;
mod commands;

use anyhow::{Context, Result};
use bloomg::Client;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // RUST_LOG wins over -v when set
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = cli.connection.resolve().context("invalid connection settings")?;
    info!("Using {} transport at {}", config.transport, config.server);

    let client = Client::connect(&config)?;
    commands::run(&client, cli.command).await
}
