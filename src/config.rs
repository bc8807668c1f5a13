//! Configuration management for ratewindow.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LimiterError, Result};
use crate::ratelimit::{Rate, DEFAULT_PREFIX};

/// Prefix of environment variables overriding file settings,
/// e.g. `RATEWINDOW__STORE__URL`.
pub const ENV_PREFIX: &str = "RATEWINDOW";

/// Main configuration for ratewindow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatewindowConfig {
    /// Store connection configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Limiter configuration
    #[serde(default)]
    pub limiter: LimiterSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which transport backs the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Shared Redis server
    #[default]
    Redis,
    /// Process-local keyspace, for trials and tests
    Memory,
}

/// Store connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Transport backing the counters
    #[serde(default)]
    pub backend: Backend,

    /// Redis connection URL
    #[serde(default = "default_url")]
    pub url: String,

    /// Maximum pooled connections
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            url: default_url(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

fn default_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_pool_max_size() -> usize {
    16
}

/// Limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterSettings {
    /// Prefix of every storage key
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Rate in `<limit>-<S|M|H|D>` notation
    #[serde(default)]
    pub rate: Rate,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            rate: Rate::default(),
        }
    }
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl RatewindowConfig {
    /// Load configuration from a YAML file path.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: RatewindowConfig =
            serde_yaml::from_str(&contents).map_err(|e| LimiterError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional YAML file, overridden by
    /// `RATEWINDOW__<SECTION>__<FIELD>` environment variables.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                ::config::File::from(Path::new(path)).format(::config::FileFormat::Yaml),
            );
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config: RatewindowConfig = builder
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| LimiterError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no store could run with.
    pub fn validate(&self) -> Result<()> {
        if self.store.pool_max_size == 0 {
            return Err(LimiterError::Config(
                "store.pool_max_size must be at least 1".to_string(),
            ));
        }
        if self.store.backend == Backend::Redis && self.store.url.is_empty() {
            return Err(LimiterError::Config(
                "store.url is required for the redis backend".to_string(),
            ));
        }
        Ok(())
    }
}
