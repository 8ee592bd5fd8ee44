//! Engine configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `STRATA__`-prefixed environment variables (`__` separates
//! nesting levels, e.g. `STRATA__MIGRATION__WINDOW_HOURS=6`).

use crate::cache::policy::FlushPolicy;
use crate::error::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use strata_shared::DataType;

/// Environment variable naming the config file when no path is passed explicitly.
pub const CONFIG_PATH_ENV: &str = "STRATA_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Admin HTTP listen address (health checks + metrics)
    pub admin_addr: String,

    /// Hot and cold store endpoints
    pub store: StoreConfig,

    /// Hot cache buffering
    pub cache: CacheConfig,

    /// Hot-to-cold migration
    pub migration: MigrationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub host: String,
    /// HTTP interface port
    pub port: u16,
    /// Native protocol port, used when the other tier reads this one through
    /// `remote()` (the TLS native port when `secure`)
    pub native_port: u16,
    pub database: String,
    pub user: String,
    pub password: Option<String>,
    /// Use HTTPS instead of HTTP
    pub secure: bool,
}

impl EndpointConfig {
    fn local(database: &str) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8123,
            native_port: 9000,
            database: database.to_string(),
            user: "default".to_string(),
            password: None,
            secure: false,
        }
    }

    pub fn url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// `host:native_port`, as used by the `remote()` table function.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.native_port)
    }

    /// True when both endpoints are the same server (only the database differs).
    pub fn same_server(&self, other: &EndpointConfig) -> bool {
        self.host == other.host && self.port == other.port
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub hot: EndpointConfig,
    pub cold: EndpointConfig,
    pub connect_timeout_secs: u64,
    pub receive_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            hot: EndpointConfig::local("market_hot"),
            cold: EndpointConfig::local("market_cold"),
            connect_timeout_secs: 10,
            receive_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterConfig {
    /// Consecutive failed flushes after which a batch is dead-lettered.
    /// `None` retries forever.
    pub max_attempts: Option<u32>,

    /// NDJSON file receiving dead-lettered records
    pub path: PathBuf,
}

impl Default for DeadLetterConfig {
    fn default() -> Self {
        Self {
            max_attempts: None,
            path: PathBuf::from("strata-dead-letter.ndjson"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// FlushScheduler tick period in milliseconds
    pub tick_ms: u64,

    /// Flush policy per data type. Types missing here use [`FlushPolicy::default`].
    pub policies: BTreeMap<DataType, FlushPolicy>,

    /// Per-table allowed-field overrides (table name -> columns)
    pub allowed_fields: BTreeMap<String, Vec<String>>,

    pub dead_letter: DeadLetterConfig,
}

impl CacheConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn policy(&self, data_type: DataType) -> FlushPolicy {
        self.policies.get(&data_type).copied().unwrap_or_default()
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            tick_ms: 500,
            policies: default_policies(),
            allowed_fields: BTreeMap::new(),
            dead_letter: DeadLetterConfig::default(),
        }
    }
}

/// High-rate streams flush on size, sparse ones mostly on time.
fn default_policies() -> BTreeMap<DataType, FlushPolicy> {
    let policy = |batch_size, max_wait_ms, max_queue| FlushPolicy {
        batch_size,
        max_wait_ms,
        max_queue,
    };
    BTreeMap::from([
        (DataType::Orderbook, policy(500, 1_000, 20_000)),
        (DataType::Trade, policy(1_000, 1_000, 50_000)),
        (DataType::FundingRate, policy(100, 10_000, 5_000)),
        (DataType::OpenInterest, policy(100, 10_000, 5_000)),
        (DataType::Liquidation, policy(50, 5_000, 5_000)),
        (DataType::LsrTopPosition, policy(50, 30_000, 2_000)),
        (DataType::LsrAllAccount, policy(50, 30_000, 2_000)),
        (DataType::VolatilityIndex, policy(50, 10_000, 2_000)),
    ])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Rows older than `now - window_hours` are migrated
    pub window_hours: u32,

    /// Lookback used by repair runs; must exceed `window_hours`
    pub repair_window_hours: u32,

    /// Upper bound on rows moved per table by a single copy statement
    pub row_cap: u64,

    pub symbol_prefix: Option<String>,
    pub exchange: Option<String>,
    pub market_type: Option<String>,

    /// Count only; never copy or delete
    pub dry_run: bool,

    /// Period of scheduled runs in the engine service
    pub interval_minutes: u64,
}

impl MigrationConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            window_hours: 4,
            repair_window_hours: 72,
            row_cap: 10_000_000,
            symbol_prefix: None,
            exchange: None,
            market_type: None,
            dry_run: false,
            interval_minutes: 60,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            admin_addr: "0.0.0.0:9464".to_string(),
            store: StoreConfig::default(),
            cache: CacheConfig::default(),
            migration: MigrationConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load defaults, then `path` (or `$STRATA_CONFIG`) if given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        let file = path.map(Path::to_path_buf).or(env_path);

        let mut builder = config::Config::builder().add_source(
            config::Config::try_from(&EngineConfig::default())
                .context("Serialize default configuration")?,
        );
        if let Some(file) = &file {
            builder = builder.add_source(config::File::from(file.as_path()));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("STRATA")
                .separator("__")
                .try_parsing(true),
        );

        let config: EngineConfig = builder
            .build()
            .context("Read configuration sources")?
            .try_deserialize()
            .context("Parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.tick_ms == 0 {
            return Err(ConfigError::invalid("cache.tick_ms", "must be greater than 0"));
        }
        for data_type in DataType::ALL {
            self.cache
                .policy(data_type)
                .validate()
                .map_err(|reason| ConfigError::invalid(format!("cache.policies.{}", data_type), reason))?;
        }
        if self.cache.dead_letter.max_attempts == Some(0) {
            return Err(ConfigError::invalid(
                "cache.dead_letter.max_attempts",
                "must be at least 1 when set",
            ));
        }

        let migration = &self.migration;
        if migration.window_hours == 0 {
            return Err(ConfigError::invalid("migration.window_hours", "must be greater than 0"));
        }
        if migration.repair_window_hours <= migration.window_hours {
            return Err(ConfigError::invalid(
                "migration.repair_window_hours",
                "must be wider than migration.window_hours",
            ));
        }
        if migration.row_cap == 0 {
            return Err(ConfigError::invalid("migration.row_cap", "must be greater than 0"));
        }
        if migration.interval_minutes == 0 {
            return Err(ConfigError::invalid(
                "migration.interval_minutes",
                "must be greater than 0",
            ));
        }

        for (key, endpoint) in [("store.hot", &self.store.hot), ("store.cold", &self.store.cold)] {
            if !crate::sql::is_identifier(&endpoint.database) {
                return Err(ConfigError::invalid(
                    format!("{}.database", key),
                    "must contain only letters, digits and underscores",
                ));
            }
        }
        if self.store.hot == self.store.cold {
            return Err(ConfigError::invalid(
                "store.cold",
                "hot and cold tiers must not be the same database",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_every_type_has_a_default_policy() {
        let config = CacheConfig::default();
        for dt in DataType::ALL {
            assert!(config.policies.contains_key(&dt), "missing policy for {}", dt);
        }
    }

    #[test]
    fn test_queue_smaller_than_batch_rejected() {
        let mut config = EngineConfig::default();
        config.cache.policies.insert(
            DataType::Trade,
            FlushPolicy {
                batch_size: 100,
                max_wait_ms: 1_000,
                max_queue: 10,
            },
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache.policies.trade"));
    }

    #[test]
    fn test_repair_window_must_be_wider() {
        let mut config = EngineConfig::default();
        config.migration.repair_window_hours = config.migration.window_hours;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_name_must_be_identifier() {
        let mut config = EngineConfig::default();
        config.store.cold.database = "cold; DROP TABLE trades".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_database_for_both_tiers_rejected() {
        let mut config = EngineConfig::default();
        config.store.cold = config.store.hot.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_dead_letter_attempts_rejected() {
        let mut config = EngineConfig::default();
        config.cache.dead_letter.max_attempts = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_urls() {
        let mut endpoint = EndpointConfig::local("market_hot");
        assert_eq!(endpoint.url(), "http://127.0.0.1:8123");
        endpoint.secure = true;
        endpoint.port = 8443;
        assert_eq!(endpoint.url(), "https://127.0.0.1:8443");
        assert_eq!(endpoint.address(), "127.0.0.1:9000");
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[migration]
window_hours = 6
exchange = "binance"

[cache.policies.liquidation]
batch_size = 10
max_wait_ms = 2000
max_queue = 100
"#
        )
        .unwrap();

        let config = EngineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.migration.window_hours, 6);
        assert_eq!(config.migration.exchange.as_deref(), Some("binance"));
        assert_eq!(config.cache.policy(DataType::Liquidation).batch_size, 10);
        // Untouched sections keep their defaults.
        assert_eq!(config.cache.policy(DataType::Trade).batch_size, 1_000);
        assert_eq!(config.store.cold.database, "market_cold");
    }
}
