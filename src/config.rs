//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every field has a sensible default so the service also runs without
//! a config file (fresh deployments, tests).

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub bonus: BonusConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    /// Interval of the weekly-round housekeeping tick.
    pub tick_interval_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "FLUXBUX-001".to_string(),
            tick_interval_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Primary snapshot file.
    pub snapshot_path: String,
    /// Directory for dated backup copies.
    pub backup_dir: String,
    /// Persistence pump cycle interval.
    pub flush_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: "database.json".to_string(),
            backup_dir: "backups".to_string(),
            flush_interval_secs: 15,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BonusConfig {
    /// One-time claimable grant per round.
    pub amount: Decimal,
    /// Claim window measured from round creation. Enforced by the
    /// caller, not the ledger.
    pub window_hours: i64,
}

impl Default for BonusConfig {
    fn default() -> Self {
        Self {
            amount: dec!(100),
            window_hours: 4,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file. A missing file yields the
    /// defaults; a present-but-malformed file is an error.
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            info!(path, "No config file found, using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.storage.snapshot_path, "database.json");
        assert_eq!(cfg.storage.flush_interval_secs, 15);
        assert_eq!(cfg.bonus.amount, dec!(100));
        assert_eq!(cfg.bonus.window_hours, 4);
        assert!(cfg.service.tick_interval_secs > 0);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let cfg = AppConfig::load("/tmp/fluxbux_no_such_config.toml").unwrap();
        assert_eq!(cfg.storage.snapshot_path, "database.json");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
            [storage]
            snapshot_path = "/var/lib/fluxbux/state.json"
            flush_interval_secs = 5

            [bonus]
            amount = 50
        "#;
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.storage.snapshot_path, "/var/lib/fluxbux/state.json");
        assert_eq!(cfg.storage.flush_interval_secs, 5);
        assert_eq!(cfg.bonus.amount, dec!(50));
        // Unset sections/fields fall back to defaults.
        assert_eq!(cfg.bonus.window_hours, 4);
        assert_eq!(cfg.storage.backup_dir, "backups");
    }

    #[test]
    fn test_parse_malformed_config_is_error() {
        let result: std::result::Result<AppConfig, _> = toml::from_str("storage = 42");
        assert!(result.is_err());
    }
}
