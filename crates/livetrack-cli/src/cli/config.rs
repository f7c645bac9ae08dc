use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use livetrack_core::TrackerConfig;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";

/// CLI configuration: the tracker settings plus daemon-only options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Address the HTTP API binds to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_addr: Option<String>,

    #[serde(flatten)]
    pub tracker: TrackerConfig,
}

/// `~/.livetrack/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".livetrack").join("config.json"))
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Explicit file, else the default file when present, else defaults;
    /// then environment overrides.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(default) => Self::load(&default)?,
                None => Self::default(),
            },
        };
        config
            .tracker
            .apply_env()
            .context("Invalid environment configuration")?;
        Ok(config)
    }

    pub fn bind_addr(&self) -> &str {
        self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize config")
    }
}
