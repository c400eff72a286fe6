//! Configuration parsing and validation.
//!
//! Metron configuration is loaded from TOML files with CLI overrides. Every
//! section has working defaults; an empty file is a valid configuration.

use crate::meter::allocator::ReuseStrategy;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level Metron configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Node identity.
    #[serde(default)]
    pub node: NodeConfig,

    /// Identifier-allocator tuning.
    #[serde(default)]
    pub allocator: AllocatorConfig,

    /// Telemetry and logging configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Node identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Name this node reports in logs and cluster membership.
    #[serde(default = "default_node_id")]
    pub id: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: default_node_id(),
        }
    }
}

/// Identifier-allocator tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocatorConfig {
    /// Reuse-candidate selection: "first-fit" or "random".
    #[serde(default = "default_reuse_strategy")]
    pub reuse_strategy: String,

    /// Fixed RNG seed for the random strategy. Unset in production; set in
    /// tests that need deterministic candidate selection.
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            reuse_strategy: default_reuse_strategy(),
            rng_seed: None,
        }
    }
}

impl AllocatorConfig {
    /// Parse the configured strategy.
    pub fn strategy(&self) -> Result<ReuseStrategy> {
        self.reuse_strategy
            .parse::<ReuseStrategy>()
            .map_err(anyhow::Error::msg)
    }
}

/// Telemetry and logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter: trace, debug, info, warn, or error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format: "text" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_node_id() -> String {
    "metron-1".to_string()
}

fn default_reuse_strategy() -> String {
    "first-fit".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).with_context(|| "failed to parse config")?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.node.id.is_empty() {
            bail!("node.id must not be empty");
        }
        self.allocator
            .strategy()
            .with_context(|| "invalid allocator.reuse_strategy")?;
        match self.telemetry.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => bail!("unknown telemetry.log_level '{other}'"),
        }
        match self.telemetry.log_format.as_str() {
            "text" | "json" => {}
            other => bail!("unknown telemetry.log_format '{other}'"),
        }
        Ok(())
    }
}
