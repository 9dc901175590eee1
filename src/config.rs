use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use directories::ProjectDirs;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    Result, StoreError, StoreOptions, DEFAULT_GEOCODING_BASE_URL, GEOCODING_API_KEY_ENV,
};

/// Application configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory holding the key-value files
    pub data_dir: PathBuf,

    /// Shortest duration of a load, in milliseconds
    pub min_load_time_ms: u64,

    /// API key for the geocoding service
    pub geocoding_api_key: Option<String>,

    /// Base URL of the geocoding service
    pub geocoding_base_url: String,

    /// Geocoding request timeout (in seconds)
    pub geocoding_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".voluntrack"));

        Self {
            data_dir,
            min_load_time_ms: 800,
            geocoding_api_key: None,
            geocoding_base_url: DEFAULT_GEOCODING_BASE_URL.to_string(),
            geocoding_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Reads the config file, or returns defaults if there is none.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let raw = fs::read_to_string(&path)?;
        serde_json::from_str(&raw).map_err(|e| StoreError::ConfigError {
            message: format!("Invalid config file {}: {}", path.display(), e),
        })
    }

    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(self)?)?;

        info!("Configuration saved to {}", path.display());
        Ok(path)
    }

    pub fn default_path() -> Result<PathBuf> {
        project_dirs()
            .map(|dirs| dirs.config_dir().join("config.json"))
            .ok_or_else(|| StoreError::ConfigError {
                message: "Could not determine a configuration directory".to_string(),
            })
    }

    // The configured key wins over the environment
    pub fn get_geocoding_api_key(&self) -> Option<String> {
        if let Some(key) = &self.geocoding_api_key {
            if !key.trim().is_empty() {
                return Some(key.clone());
            }
        }

        std::env::var(GEOCODING_API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    pub fn geocoding_timeout(&self) -> Duration {
        Duration::from_secs(self.geocoding_timeout_secs)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            min_load_time: Duration::from_millis(self.min_load_time_ms),
            ..StoreOptions::default()
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "voluntrack", "voluntrack")
}
