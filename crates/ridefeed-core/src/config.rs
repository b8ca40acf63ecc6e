//! Application configuration management.
//!
//! Configuration is stored at `~/.config/ridefeed/config.json`. Every field
//! is optional; accessors fall back to built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::{DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::cache::CacheConfig;
use crate::models::query::MAX_PAGE_LIMIT;
use crate::ports::Coordinates;

/// Application name used for config directory paths
const APP_NAME: &str = "ridefeed";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Posts requested per page when the config does not say.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub cache_max_entries: Option<usize>,
    pub cache_ttl_secs: Option<i64>,
    pub page_size: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub home_latitude: Option<f64>,
    pub home_longitude: Option<f64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    /// Clamped to what the backend accepts.
    pub fn page_size(&self) -> u32 {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_LIMIT as u32)
    }

    pub fn cache_config(&self) -> CacheConfig {
        let defaults = CacheConfig::default();
        CacheConfig {
            max_entries: self.cache_max_entries.unwrap_or(defaults.max_entries).max(1),
            ttl: self
                .cache_ttl_secs
                .map(chrono::Duration::seconds)
                .unwrap_or(defaults.ttl),
        }
    }

    /// Fixed position for the nearby feed, when both halves are set.
    pub fn home_location(&self) -> Option<Coordinates> {
        match (self.home_latitude, self.home_longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url(), DEFAULT_API_BASE_URL);
        assert_eq!(config.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(config.cache_config(), CacheConfig::default());
        assert_eq!(config.request_timeout(), Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));
        assert!(config.home_location().is_none());
    }

    #[test]
    fn test_overrides_and_clamping() {
        let config = Config {
            cache_max_entries: Some(0),
            cache_ttl_secs: Some(60),
            page_size: Some(500),
            home_latitude: Some(34.05),
            home_longitude: Some(-118.24),
            ..Default::default()
        };
        let cache = config.cache_config();
        assert_eq!(cache.max_entries, 1);
        assert_eq!(cache.ttl, chrono::Duration::seconds(60));
        assert_eq!(config.page_size(), 100);
        assert_eq!(
            config.home_location(),
            Some(Coordinates {
                latitude: 34.05,
                longitude: -118.24
            })
        );
    }

    #[test]
    fn test_partial_json() {
        let config: Config = serde_json::from_str(r#"{"page_size": 10}"#).unwrap();
        assert_eq!(config.page_size(), 10);
        assert!(config.api_base_url.is_none());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = std::env::temp_dir()
            .join(format!("ridefeed-config-test-{}", std::process::id()))
            .join(CONFIG_FILE);
        let config = Config {
            api_base_url: Some("http://localhost:8080".into()),
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);

        if let Some(parent) = path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn test_missing_file_is_default() {
        let path = std::env::temp_dir().join("ridefeed-does-not-exist").join(CONFIG_FILE);
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());
    }
}
