use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Harvest time-entry reconciliation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one fetch -> classify -> merge -> persist pass and print the summary
    Pass {
        /// Config files in merge order (later override earlier)
        #[arg(long = "config")]
        config_paths: Vec<PathBuf>,

        /// Read settings from environment variables instead of files
        #[arg(long, default_value_t = false, conflicts_with = "config_paths")]
        env: bool,
    },

    /// Parse a storage notification event and print the routed artifact
    RouteEvent {
        /// Path to the event JSON
        #[arg(long)]
        file: PathBuf,
    },

    /// Load and validate settings; print the redacted config and its fingerprint
    ConfigCheck {
        #[arg(long = "config")]
        config_paths: Vec<PathBuf>,

        #[arg(long, default_value_t = false, conflicts_with = "config_paths")]
        env: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Pass { config_paths, env } => {
            commands::run_pass(commands::config_source(config_paths, env)).await?;
        }
        Commands::RouteEvent { file } => {
            commands::route_event(&file)?;
        }
        Commands::ConfigCheck { config_paths, env } => {
            commands::config_check(commands::config_source(config_paths, env))?;
        }
    }

    Ok(())
}
