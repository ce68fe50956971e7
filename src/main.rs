//! Strictly Duel - Unified CLI
//!
//! Runs the game server or a terminal client.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use std::path::PathBuf;
use std::sync::Arc;
use strictly_duel::{Matchmaker, ServerConfig, TextPresenter, run_client};
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config, host, port } => run_server(config, host, port).await,
        Command::Play { server } => run_play(server).await,
    }
}

/// Logs go to stderr so the terminal client keeps stdout for the board.
fn initialize_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Run the game server until Ctrl+C
#[instrument(skip_all, fields(config_path = %config_path.display()))]
async fn run_server(config_path: PathBuf, host: Option<String>, port: Option<u16>) -> Result<()> {
    initialize_tracing("info,strictly_duel=debug");

    let mut config = ServerConfig::load_or_default(Some(&config_path))?;
    if let Some(host) = host {
        config = config.with_host(host);
    }
    if let Some(port) = port {
        config = config.with_port(port);
    }
    info!(addr = %config.bind_addr(), "Starting Strictly Duel server");

    let matchmaker = Arc::new(Matchmaker::new(config));
    let listener = matchmaker.bind().await?;

    let signal_matchmaker = matchmaker.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => signal_matchmaker.shutdown(),
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
        }
    });

    matchmaker.serve(listener).await;
    info!("Server stopped");
    Ok(())
}

/// Run the terminal client
#[instrument]
async fn run_play(server: String) -> Result<()> {
    initialize_tracing("warn");

    let stream = tokio::net::TcpStream::connect(&server).await?;
    println!("Connected to {}. Enter moves as: <row> <col>", server);

    let input = tokio::io::BufReader::new(tokio::io::stdin());
    run_client(stream, input, TextPresenter::new(std::io::stdout())).await?;
    Ok(())
}
