//! Daemon settings
//!
//! Daemon-level settings come from environment variables; the records
//! themselves come from a JSON [`AppConfig`] file named by
//! `MANAGED_DNS_CONFIG`.

use anyhow::{Context, Result};
use managed_dns_core::AppConfig;
use std::env;
use std::path::{Path, PathBuf};
use tracing::Level;

/// Environment variable naming the JSON configuration file
pub const CONFIG_ENV: &str = "MANAGED_DNS_CONFIG";

/// Environment variable selecting the log level
pub const LOG_LEVEL_ENV: &str = "MANAGED_DNS_LOG_LEVEL";

/// Settings read from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    /// Path to the JSON [`AppConfig`]
    pub config_path: PathBuf,
    /// One of trace, debug, info, warn, error
    pub log_level: String,
}

impl DaemonConfig {
    /// Load settings from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(env::var(CONFIG_ENV).ok(), env::var(LOG_LEVEL_ENV).ok())
    }

    fn from_vars(config_path: Option<String>, log_level: Option<String>) -> Result<Self> {
        let config_path = config_path.filter(|p| !p.is_empty()).with_context(|| {
            format!(
                "{} is required. Set it via: export {}=/etc/managed-dns/config.json",
                CONFIG_ENV, CONFIG_ENV
            )
        })?;

        let config = Self {
            config_path: PathBuf::from(config_path),
            log_level: log_level.unwrap_or_else(|| "info".to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => anyhow::bail!(
                "{} '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                LOG_LEVEL_ENV,
                self.log_level
            ),
        }
    }

    /// The tracing level for [`log_level`](Self::log_level)
    pub fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

/// Read and validate the JSON [`AppConfig`] at `path`
pub fn load_app_config(path: &Path) -> Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config: AppConfig = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;

    Ok(config)
}
