use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::cli::CliConfig;
use super::constants::{
    CONFIG_FILE_NAME, DEFAULT_DATA_DIR, DEFAULT_FOLLOW_UPDATES, DEFAULT_REPLAY_INTERVAL_MS,
    DEFAULT_WAIT_TIMEOUT_MS,
};
use crate::domain::filters::EngineConfig;

// =============================================================================
// File Config (JSON)
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct DiscoveryFileConfig {
    pub follow_updates: Option<bool>,
    pub data_dir: Option<PathBuf>,
    pub replay_interval_ms: Option<u64>,
    pub wait_timeout_ms: Option<u64>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub discovery: Option<DiscoveryFileConfig>,
    pub timezone: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }
}

// =============================================================================
// Resolved Config
// =============================================================================

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub follow_updates: bool,
    pub data_dir: PathBuf,
    pub replay_interval_ms: u64,
    pub wait_timeout_ms: u64,
}

impl DiscoveryConfig {
    pub fn replay_interval(&self) -> Duration {
        Duration::from_millis(self.replay_interval_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            follow_updates: self.follow_updates,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub discovery: DiscoveryConfig,
    /// Zone of operator wall clocks; `None` means the host zone
    pub timezone: Option<Tz>,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Local directory config OR CLI-specified config path
    /// 3. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let path = if let Some(ref path) = cli.config {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Some(path.clone())
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        let file_config = match path {
            Some(path) => {
                let config = FileConfig::load_from_file(&path)?;
                config.warn_unknown_fields();
                config
            }
            None => FileConfig::default(),
        };

        let config = Self::resolve(cli, file_config)?;
        config.validate()?;

        tracing::debug!(
            follow_updates = config.discovery.follow_updates,
            data_dir = %config.discovery.data_dir.display(),
            timezone = ?config.timezone,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Layer CLI/env overrides over file values over defaults
    fn resolve(cli: &CliConfig, file_config: FileConfig) -> Result<Self> {
        let file_discovery = file_config.discovery.unwrap_or_default();

        let discovery = DiscoveryConfig {
            follow_updates: cli
                .follow
                .or(file_discovery.follow_updates)
                .unwrap_or(DEFAULT_FOLLOW_UPDATES),
            data_dir: cli
                .data_dir
                .clone()
                .or(file_discovery.data_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            replay_interval_ms: cli
                .replay_interval_ms
                .or(file_discovery.replay_interval_ms)
                .unwrap_or(DEFAULT_REPLAY_INTERVAL_MS),
            wait_timeout_ms: cli
                .wait_timeout_ms
                .or(file_discovery.wait_timeout_ms)
                .unwrap_or(DEFAULT_WAIT_TIMEOUT_MS),
        };

        let timezone = match (cli.timezone, file_config.timezone) {
            (Some(tz), _) => Some(tz),
            (None, Some(name)) => Some(
                name.parse::<Tz>()
                    .map_err(|_| anyhow::anyhow!("Configuration error: unknown timezone '{}'", name))?,
            ),
            (None, None) => None,
        };

        Ok(Self {
            discovery,
            timezone,
        })
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.discovery.wait_timeout_ms == 0 {
            anyhow::bail!("Configuration error: discovery.wait_timeout_ms must be greater than 0");
        }
        if !self.discovery.follow_updates && self.discovery.replay_interval_ms > 0 {
            tracing::debug!("discovery.replay_interval_ms has no effect without follow_updates");
        }
        Ok(())
    }
}
