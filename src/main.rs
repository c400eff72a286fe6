//! Metron - unified CLI entrypoint.
//!
//! Usage:
//!   metron start --config config/metron.toml
//!   metron config validate --config config/metron.toml
//!   metron config show

use anyhow::Result;
use clap::Parser;
use metron::cli::commands::{run_config, run_start};
use metron::cli::{Cli, Commands};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Use global --config or the default location
    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config/metron.toml"));

    match cli.command {
        Commands::Start(args) => run_start(args, &config_path).await,
        Commands::Config(args) => run_config(args, &config_path),
    }
}
