use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}, time::Duration};

use crate::aggregator::MAX_CONCURRENT_REQUESTS;

pub const DEFAULT_SOURCES_BASE_URL: &str = "http://127.0.0.1:5000";

/// Credentials and endpoint of the geocoding service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodingConfig {
    pub api_key: String,

    /// Overrides the public Google endpoint, e.g. for a local mock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL every temperature source path is joined to.
    #[serde(default = "default_sources_base_url")]
    pub sources_base_url: String,

    /// Simultaneous source requests. Clamped to `1..=3` when applied.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Per-request timeout. Unset means the HTTP client's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    /// Example TOML:
    /// [geocoding]
    /// api_key = "..."
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geocoding: Option<GeocodingConfig>,
}

fn default_sources_base_url() -> String {
    DEFAULT_SOURCES_BASE_URL.to_string()
}

fn default_max_concurrency() -> usize {
    MAX_CONCURRENT_REQUESTS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources_base_url: default_sources_base_url(),
            max_concurrency: default_max_concurrency(),
            request_timeout_secs: None,
            geocoding: None,
        }
    }
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, use defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "avgtemp", "avgtemp")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set or replace the geocoding API key, keeping any custom base URL.
    pub fn set_geocoding_api_key(&mut self, api_key: String) {
        match self.geocoding.as_mut() {
            Some(geo) => geo.api_key = api_key,
            None => self.geocoding = Some(GeocodingConfig { api_key, base_url: None }),
        }
    }

    pub fn geocoding_api_key(&self) -> Option<&str> {
        self.geocoding.as_ref().map(|g| g.api_key.as_str())
    }

    pub fn is_geocoding_configured(&self) -> bool {
        self.geocoding_api_key().is_some_and(|k| !k.is_empty())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
