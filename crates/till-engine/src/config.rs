//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TILL_DATABASE_PATH=/var/lib/till/till.db                           │
//! │     TILL_RESERVATION_TTL_SECS=14400                                    │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/till/engine.toml (Linux)                                 │
//! │     ~/Library/Application Support/pos.till/engine.toml (macOS)         │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/till/till.db"
//! max_connections = 5
//!
//! [sales]
//! tax_rate_bps = 825          # 8.25%
//! min_void_reason_len = 5
//! reservation_ttl_secs = 14400
//!
//! [sweeper]
//! interval_secs = 60
//!
//! [events]
//! capacity = 256
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use till_core::{DEFAULT_MIN_VOID_REASON_LEN, DEFAULT_RESERVATION_TTL_SECS};
use till_db::DbConfig;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite database file.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits on the database lock (milliseconds).
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("pos", "till", "till")
        .map(|dirs| dirs.data_dir().join("till.db"))
        .unwrap_or_else(|| PathBuf::from("till.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    5_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

// =============================================================================
// Sale Settings
// =============================================================================

/// Rules the orchestrator applies to every sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesSettings {
    /// Flat tax rate in basis points, snapshotted onto each new draft.
    #[serde(default)]
    pub tax_rate_bps: u32,

    /// Minimum length of a trimmed void reason.
    #[serde(default = "default_min_void_reason_len")]
    pub min_void_reason_len: usize,

    /// Lifetime of a reservation after creation or refresh.
    #[serde(default = "default_reservation_ttl")]
    pub reservation_ttl_secs: i64,
}

fn default_min_void_reason_len() -> usize {
    DEFAULT_MIN_VOID_REASON_LEN
}

fn default_reservation_ttl() -> i64 {
    DEFAULT_RESERVATION_TTL_SECS
}

impl Default for SalesSettings {
    fn default() -> Self {
        SalesSettings {
            tax_rate_bps: 0,
            min_void_reason_len: default_min_void_reason_len(),
            reservation_ttl_secs: default_reservation_ttl(),
        }
    }
}

impl SalesSettings {
    pub fn reservation_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.reservation_ttl_secs)
    }
}

// =============================================================================
// Sweeper & Events
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperSettings {
    /// Seconds between expiry sweeps.
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for SweeperSettings {
    fn default() -> Self {
        SweeperSettings {
            interval_secs: default_sweep_interval(),
        }
    }
}

impl SweeperSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSettings {
    /// Events buffered per subscriber before the slowest one lags.
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

fn default_event_capacity() -> usize {
    256
}

impl Default for EventSettings {
    fn default() -> Self {
        EventSettings {
            capacity: default_event_capacity(),
        }
    }
}

// =============================================================================
// Main Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub sales: SalesSettings,

    #[serde(default)]
    pub sweeper: SweeperSettings,

    #[serde(default)]
    pub events: EventSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (engine.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> EngineResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> EngineResult<()> {
        if self.database.max_connections == 0 {
            return Err(EngineError::Config("max_connections must be greater than 0".into()));
        }

        if self.sales.tax_rate_bps > 10_000 {
            return Err(EngineError::Config(format!(
                "tax_rate_bps must be at most 10000, got {}",
                self.sales.tax_rate_bps
            )));
        }

        if self.sales.reservation_ttl_secs <= 0 {
            return Err(EngineError::Config("reservation_ttl_secs must be positive".into()));
        }

        if self.sales.min_void_reason_len == 0 {
            return Err(EngineError::Config("min_void_reason_len must be at least 1".into()));
        }

        if self.sweeper.interval_secs == 0 {
            return Err(EngineError::Config("sweeper interval_secs must be greater than 0".into()));
        }

        if self.events.capacity == 0 {
            return Err(EngineError::Config("event capacity must be greater than 0".into()));
        }

        Ok(())
    }

    /// Pool configuration for [`till_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("TILL_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(ttl) = lookup("TILL_RESERVATION_TTL_SECS") {
            match ttl.parse() {
                Ok(secs) => self.sales.reservation_ttl_secs = secs,
                Err(_) => warn!(value = %ttl, "Ignoring invalid TILL_RESERVATION_TTL_SECS"),
            }
        }

        if let Some(rate) = lookup("TILL_TAX_RATE_BPS") {
            match rate.parse() {
                Ok(bps) => self.sales.tax_rate_bps = bps,
                Err(_) => warn!(value = %rate, "Ignoring invalid TILL_TAX_RATE_BPS"),
            }
        }

        if let Some(len) = lookup("TILL_MIN_VOID_REASON_LEN") {
            match len.parse() {
                Ok(n) => self.sales.min_void_reason_len = n,
                Err(_) => warn!(value = %len, "Ignoring invalid TILL_MIN_VOID_REASON_LEN"),
            }
        }

        if let Some(interval) = lookup("TILL_SWEEP_INTERVAL_SECS") {
            match interval.parse() {
                Ok(secs) => self.sweeper.interval_secs = secs,
                Err(_) => warn!(value = %interval, "Ignoring invalid TILL_SWEEP_INTERVAL_SECS"),
            }
        }

        if let Some(capacity) = lookup("TILL_EVENT_CAPACITY") {
            match capacity.parse() {
                Ok(n) => self.events.capacity = n,
                Err(_) => warn!(value = %capacity, "Ignoring invalid TILL_EVENT_CAPACITY"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("pos", "till", "till")
            .map(|dirs| dirs.config_dir().join("engine.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.sales.reservation_ttl_secs, 4 * 60 * 60);
        assert_eq!(config.sales.min_void_reason_len, 5);
        assert_eq!(config.events.capacity, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            [sales]
            tax_rate_bps = 825

            [sweeper]
            interval_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.sales.tax_rate_bps, 825);
        assert_eq!(config.sales.min_void_reason_len, 5);
        assert_eq!(config.sweeper.interval(), Duration::from_secs(30));
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_overrides_win_and_bad_values_are_ignored() {
        let env: HashMap<&str, &str> = [
            ("TILL_DATABASE_PATH", "/tmp/override.db"),
            ("TILL_RESERVATION_TTL_SECS", "600"),
            ("TILL_TAX_RATE_BPS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/tmp/override.db"));
        assert_eq!(config.sales.reservation_ttl_secs, 600);
        assert_eq!(config.sales.tax_rate_bps, 0);
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();

        config.sales.tax_rate_bps = 10_001;
        assert!(config.validate().is_err());
        config.sales.tax_rate_bps = 825;

        config.sales.reservation_ttl_secs = 0;
        assert!(config.validate().is_err());
        config.sales.reservation_ttl_secs = 60;

        config.events.capacity = 0;
        assert!(config.validate().is_err());
        config.events.capacity = 16;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&EngineConfig::default()).unwrap();
        assert!(toml_str.contains("[sales]"));
        assert!(toml_str.contains("[sweeper]"));
    }
}
