//! Application-level configuration loading: storage backend choice, year range and polling.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "LEAGUE_TRACKER_CONFIG_PATH";
/// First season the league was tracked.
const DEFAULT_FIRST_YEAR: i32 = 2023;
const DEFAULT_REFRESH_INTERVAL_MS: u64 = 5_000;

/// Which [`DocumentStore`](crate::dao::document_store::DocumentStore) backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Process-local store; data is lost on restart.
    Memory,
    Mongo,
}

impl Default for StorageBackend {
    fn default() -> Self {
        if cfg!(feature = "mongo-store") {
            StorageBackend::Mongo
        } else {
            StorageBackend::Memory
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    first_year: i32,
    storage: StorageBackend,
    mongo_refresh_interval: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        storage = ?app_config.storage,
                        first_year = app_config.first_year,
                        "loaded config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    fn parse(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Oldest year offered by the year selector.
    pub fn first_year(&self) -> i32 {
        self.first_year
    }

    pub fn storage(&self) -> StorageBackend {
        self.storage
    }

    /// How often MongoDB subscriptions re-query when no local write woke them.
    pub fn mongo_refresh_interval(&self) -> Duration {
        self.mongo_refresh_interval
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            first_year: DEFAULT_FIRST_YEAR,
            storage: StorageBackend::default(),
            mongo_refresh_interval: Duration::from_millis(DEFAULT_REFRESH_INTERVAL_MS),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    first_year: Option<i32>,
    #[serde(default)]
    storage: Option<StorageBackend>,
    #[serde(default)]
    mongo: RawMongoConfig,
}

#[derive(Debug, Default, Deserialize)]
struct RawMongoConfig {
    #[serde(default)]
    refresh_interval_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            first_year: value.first_year.unwrap_or(defaults.first_year),
            storage: value.storage.unwrap_or(defaults.storage),
            mongo_refresh_interval: value
                .mongo
                .refresh_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.mongo_refresh_interval),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let config = AppConfig::parse(r#"{ "storage": "memory" }"#).unwrap();
        assert_eq!(config.storage(), StorageBackend::Memory);
        assert_eq!(config.first_year(), 2023);
        assert_eq!(config.mongo_refresh_interval(), Duration::from_secs(5));
    }

    #[test]
    fn nested_mongo_section_is_read() {
        let config = AppConfig::parse(
            r#"{ "first_year": 2020, "storage": "mongo", "mongo": { "refresh_interval_ms": 250 } }"#,
        )
        .unwrap();
        assert_eq!(config.first_year(), 2020);
        assert_eq!(config.storage(), StorageBackend::Mongo);
        assert_eq!(config.mongo_refresh_interval(), Duration::from_millis(250));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(AppConfig::parse(r#"{ "storage": "couch" }"#).is_err());
    }
}
