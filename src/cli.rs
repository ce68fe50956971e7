//! Command-line interface for strictly_duel.

use clap::{Parser, Subcommand};

/// Strictly Duel - two-player networked tic-tac-toe
#[derive(Parser, Debug)]
#[command(name = "strictly_duel")]
#[command(about = "Authoritative two-player tic-tac-toe server and client", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the game server
    Serve {
        /// Path to a TOML config file (defaults apply if it doesn't exist)
        #[arg(short, long, default_value = "strictly_duel.toml")]
        config: std::path::PathBuf,

        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Connect to a server and play from the terminal
    Play {
        /// Server address
        #[arg(long, default_value = "127.0.0.1:12345")]
        server: String,
    },
}
