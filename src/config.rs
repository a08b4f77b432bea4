//! Configuration module
//!
//! Read from TOML at `$BOARDING_CONFIG`, or `<config dir>/pet-boarding/config.toml`.
//! Every section and field has a default; a missing file means defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::basket::DEFAULT_BASKET_TTL_MINUTES;
use crate::infrastructure::DatabaseConfig;
use crate::shared::errors::InfraError;

/// Environment variable pointing at the config file
pub const CONFIG_ENV: &str = "BOARDING_CONFIG";

const APP_DIR: &str = "pet-boarding";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub expiry: ExpiryConfig,
    pub metrics: MetricsConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set
    pub level: String,
    /// One JSON object per line instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpiryConfig {
    /// Age after which an unpaid basket is expired
    pub basket_ttl_minutes: i64,
    /// Seconds between two expiry passes
    pub check_interval_secs: u64,
    pub enabled: bool,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            basket_ttl_minutes: DEFAULT_BASKET_TTL_MINUTES,
            check_interval_secs: 60,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Address of the Prometheus scrape endpoint
    pub listen_address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_address: "0.0.0.0:9100".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// How long background tasks get to stop after a shutdown signal
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Default config file location: `$BOARDING_CONFIG`, else the platform
    /// config directory.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs_next::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// Load from `path`, or from [`AppConfig::default_path`] when `None`.
    /// A missing file yields the defaults; an unreadable or invalid one is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self, InfraError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_toml(&content)
            .map_err(|e| InfraError::Config(format!("{}: {e}", path.display())))?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, InfraError> {
        let config: Self =
            toml::from_str(content).map_err(|e| InfraError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialized form, as written by `--check`
    pub fn to_toml(&self) -> Result<String, InfraError> {
        toml::to_string_pretty(self).map_err(|e| InfraError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), InfraError> {
        if self.database.url.trim().is_empty() {
            return Err(InfraError::Config("database.url is empty".into()));
        }
        if self.database.max_connections == 0 {
            return Err(InfraError::Config("database.max_connections must be positive".into()));
        }
        if self.expiry.basket_ttl_minutes <= 0 {
            return Err(InfraError::Config("expiry.basket_ttl_minutes must be positive".into()));
        }
        if self.expiry.check_interval_secs == 0 {
            return Err(InfraError::Config("expiry.check_interval_secs must be positive".into()));
        }
        if self.metrics.enabled {
            self.metrics
                .listen_address
                .parse::<std::net::SocketAddr>()
                .map_err(|e| {
                    InfraError::Config(format!(
                        "metrics.listen_address '{}': {e}",
                        self.metrics.listen_address
                    ))
                })?;
        }
        Ok(())
    }
}
