//! Command-line interface definitions.

pub mod commands;

use clap::{Args, Parser, Subcommand};

/// Metron - distributed meter store node.
#[derive(Debug, Parser)]
#[command(name = "metron", version, about = "Distributed meter store node")]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a store node until interrupted.
    Start(StartArgs),
    /// Configuration utilities.
    Config(ConfigArgs),
}

/// Arguments for `metron start`.
#[derive(Debug, Args)]
pub struct StartArgs {}

/// Arguments for `metron config`.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Configuration subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Validate a configuration file and report problems.
    Validate,
    /// Print the effective configuration after applying defaults.
    Show,
}
