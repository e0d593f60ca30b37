//! Application configuration
//!
//! Loaded from a TOML file (default `~/.config/fleet-booking/config.toml`).
//! Every field has a default, so a partial file is enough:
//!
//! ```toml
//! [server]
//! port = 8083
//!
//! [booking]
//! default_rate_per_day = 50.0
//! request_timeout_ms = 5000
//!
//! [booking.rates]
//! A1 = 75.0
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::{DatabaseConfig, StaticAssetDirectory};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Default location of the configuration file
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fleet-booking")
        .join("config.toml")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub database: DatabaseSection,
    pub logging: LoggingSection,
    pub booking: BookingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    /// Seconds to wait for in-flight requests on shutdown
    pub shutdown_timeout: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8083,
            shutdown_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// SeaORM connection URL, or `memory` for the in-process store
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        let db = DatabaseConfig::default();
        Self {
            url: db.url,
            max_connections: db.max_connections,
            connect_timeout_secs: db.connect_timeout_secs,
        }
    }
}

impl DatabaseSection {
    pub fn is_memory(&self) -> bool {
        self.url == "memory"
    }

    pub fn to_database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            connect_timeout_secs: self.connect_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// EnvFilter directive, overridden by `RUST_LOG`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingSection {
    /// Rate for assets missing from `rates`
    pub default_rate_per_day: f64,
    /// Per-asset daily rates
    pub rates: HashMap<String, f64>,
    /// Upper bound on a single engine operation
    pub request_timeout_ms: u64,
    /// Refuse confirming a booking that overlaps another confirmed one
    pub recheck_on_confirm: bool,
}

impl Default for BookingSection {
    fn default() -> Self {
        Self {
            default_rate_per_day: 50.0,
            rates: HashMap::new(),
            request_timeout_ms: 5_000,
            recheck_on_confirm: true,
        }
    }
}

impl BookingSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn asset_directory(&self) -> Result<StaticAssetDirectory, ConfigError> {
        let default_rate = parse_rate("default_rate_per_day", self.default_rate_per_day)?;
        let rates = self
            .rates
            .iter()
            .map(|(asset, rate)| Ok((asset.clone(), parse_rate(asset, *rate)?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(StaticAssetDirectory::new(default_rate).with_rates(rates))
    }
}

fn parse_rate(name: &str, value: f64) -> Result<Decimal, ConfigError> {
    let rate = Decimal::try_from(value)
        .map_err(|e| ConfigError::Invalid(format!("rate {} = {}: {}", name, value, e)))?
        .round_dp(2);
    if rate.is_sign_negative() {
        return Err(ConfigError::Invalid(format!(
            "rate {} must not be negative",
            name
        )));
    }
    Ok(rate)
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let raw = toml::to_string_pretty(self)?;
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, raw).map_err(write_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.booking.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "booking.request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Invalid("database.url is empty".to_string()));
        }
        self.booking.asset_directory()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AssetDirectory;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = AppConfig::from_toml("").unwrap();
        assert_eq!(cfg.server.port, 8083);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.logging.format, LogFormat::Text);
        assert_eq!(cfg.booking.request_timeout(), Duration::from_secs(5));
        assert!(cfg.booking.recheck_on_confirm);
        assert!(!cfg.database.is_memory());
    }

    #[test]
    fn partial_sections_are_merged_with_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            [server]
            port = 9090

            [database]
            url = "memory"

            [logging]
            format = "json"

            [booking]
            recheck_on_confirm = false

            [booking.rates]
            A1 = 75.5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert!(cfg.database.is_memory());
        assert_eq!(cfg.logging.format, LogFormat::Json);
        assert!(!cfg.booking.recheck_on_confirm);
        assert_eq!(cfg.booking.default_rate_per_day, 50.0);
        assert_eq!(cfg.booking.rates.get("A1"), Some(&75.5));
    }

    #[tokio::test]
    async fn asset_directory_uses_configured_rates() {
        let cfg = AppConfig::from_toml("[booking.rates]\nA1 = 75.5\n").unwrap();
        let directory = cfg.booking.asset_directory().unwrap();
        assert_eq!(directory.rate_per_day("A1").await.unwrap(), Decimal::new(7550, 2));
        assert_eq!(directory.rate_per_day("A2").await.unwrap(), Decimal::new(5000, 2));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            AppConfig::from_toml("[booking]\nrequest_timeout_ms = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AppConfig::from_toml("[booking.rates]\nA1 = -1.0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AppConfig::from_toml("[server]\nport = \"eighty\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join(format!("fleet-booking-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.toml");
        let mut cfg = AppConfig::default();
        cfg.server.port = 18083;
        cfg.booking.rates.insert("A9".into(), 12.5);
        cfg.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.server.port, 18083);
        assert_eq!(loaded.booking.rates.get("A9"), Some(&12.5));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = AppConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
