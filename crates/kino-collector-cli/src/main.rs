//! Kino Collector CLI - offline tooling for the analytics collector
//!
//! Features:
//! - Replay recorded event logs through the state machine
//! - Inspect the transition table of a player family
//! - Check a license key against the analytics backend

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

/// Kino Collector CLI - Video analytics toolkit
#[derive(Parser)]
#[command(name = "kino-collector")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Replay and inspect video analytics sessions", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded event log
    Replay {
        /// JSON event log: an array of events, or an object with an `events` array
        log: PathBuf,

        /// Machine profile (full, html5); defaults to the log's own, then full
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Print the transition table
    Table {
        /// Machine profile (full, html5)
        #[arg(short, long, default_value = "full")]
        profile: String,
    },

    /// Ask the backend whether a key may send samples
    CheckLicense {
        /// Analytics license key
        #[arg(short, long)]
        key: String,

        /// Domain the player is embedded on
        #[arg(short, long)]
        domain: String,

        /// Backend base URL
        #[arg(short, long)]
        backend: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(level)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(level)
            .with_writer(std::io::stderr)
            .init();
    }
    kino_collector::init();

    match cli.command {
        Commands::Replay { log, profile } => {
            commands::replay(&log, profile.as_deref(), &cli.format)?;
        }
        Commands::Table { profile } => {
            commands::table(&profile, &cli.format)?;
        }
        Commands::CheckLicense { key, domain, backend } => {
            commands::check_license(&key, &domain, backend.as_deref(), &cli.format).await?;
        }
    }

    Ok(())
}
