//! Application configuration
//!
//! Loaded from the embedded defaults, then optional files, then `RIPPLE_*`
//! environment variables.

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use ripple_core::QueueConfig;
use ripple_bus::HubConfig;
use serde::{Deserialize, Serialize};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bus: HubConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default = "default_channel")]
    pub channel: String,
}

fn default_channel() -> String {
    "ripple".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bus: HubConfig::default(),
            queue: QueueConfig::default(),
            channel: default_channel(),
        }
    }
}

impl AppConfig {
    /// Reject values the bus cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.bus.validate().context("Invalid bus configuration")?;
        self.queue.validate().context("Invalid queue configuration")?;
        if self.channel.trim().is_empty() {
            anyhow::bail!("channel name must not be empty");
        }
        Ok(())
    }
}

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let config = Config::builder()
        // 1. Embedded defaults
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. Local overrides (optional)
        .add_source(File::with_name("config/local").required(false))
        // 3. Environment, e.g. RIPPLE_BUS__CAPACITY=1024
        .add_source(
            Environment::with_prefix("RIPPLE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let config: AppConfig = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_parse() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.channel, "ripple");
        assert_eq!(config.bus.capacity, 256);
        assert!(config.bus.host_transport);
        assert!(config.queue.item_timeout_ms.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_falls_back_to_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.channel, "ripple");
        assert_eq!(config.queue.name, "queue");
    }

    #[test]
    fn test_blank_channel_rejected() {
        let config = AppConfig {
            channel: "  ".to_string(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
