//! Configuration loading and parsing

use anyhow::{Context, Result};
use can_telemetry::BusConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// Dashboard refresh period
    #[serde(default = "default_refresh")]
    pub refresh_ms: u64,
    /// Delay between reconnect attempts while the bus is down
    #[serde(default = "default_reconnect")]
    pub reconnect_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            refresh_ms: default_refresh(),
            reconnect_ms: default_reconnect(),
        }
    }
}

impl DisplayConfig {
    pub fn refresh(&self) -> Duration {
        Duration::from_millis(self.refresh_ms.max(1))
    }

    pub fn reconnect(&self) -> Duration {
        Duration::from_millis(self.reconnect_ms.max(1))
    }
}

fn default_refresh() -> u64 {
    500
}

fn default_reconnect() -> u64 {
    2000
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}
