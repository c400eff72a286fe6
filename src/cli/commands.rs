//! CLI command implementations.

use crate::cli::{ConfigArgs, ConfigCommand, StartArgs};
use crate::core::config::{Config, TelemetryConfig};
use crate::core::runtime::MetronRuntime;
use anyhow::{Context, Result};
use std::path::Path;

/// Run a store node until Ctrl-C.
pub async fn run_start(_args: StartArgs, config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    init_tracing(&config.telemetry);

    let runtime = MetronRuntime::new(config, None)?;
    runtime.start();

    tokio::signal::ctrl_c()
        .await
        .with_context(|| "failed to listen for shutdown signal")?;

    runtime.shutdown();
    Ok(())
}

/// Configuration utilities.
pub fn run_config(args: ConfigArgs, config_path: &Path) -> Result<()> {
    match args.command {
        ConfigCommand::Validate => {
            load_config(config_path)?;
            println!("configuration OK: {}", config_path.display());
            Ok(())
        }
        ConfigCommand::Show => {
            let config = load_config(config_path)?;
            let rendered =
                toml::to_string_pretty(&config).with_context(|| "failed to render config")?;
            println!("{rendered}");
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<Config> {
    // A missing file means defaults; a present-but-broken file is an error.
    let config = if path.exists() {
        Config::from_file(path)?
    } else {
        Config::default()
    };
    config.validate()?;
    Ok(config)
}

fn init_tracing(telemetry: &TelemetryConfig) {
    // RUST_LOG wins over the configured level when set.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&telemetry.log_level));

    if telemetry.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
