//! Strata storage engine
//!
//! Buffers inbound market data per data type in front of the hot store
//! (`cache`), and moves aged rows from hot to cold with verification and
//! repair (`migrate`).

pub mod audit;
pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod migrate;
pub mod server;
pub mod sql;
pub mod storage;
pub mod tables;

use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::storage::StoreGateway;
use crate::tables::Catalog;
use anyhow::Result;
use std::sync::Arc;

/// Table catalog with the configured allowed-field overrides applied.
pub fn build_catalog(config: &EngineConfig) -> Result<Arc<Catalog>, ConfigError> {
    Catalog::standard()
        .with_allowed_fields(&config.cache.allowed_fields)
        .map(Arc::new)
}

/// Connect to both tiers. Failing here is fatal for every binary.
#[cfg(feature = "clickhouse-storage")]
pub async fn connect_store(config: &EngineConfig) -> Result<Arc<dyn StoreGateway>> {
    let gateway = storage::clickhouse::ClickHouseGateway::connect(&config.store).await?;
    Ok(Arc::new(gateway))
}

#[cfg(not(feature = "clickhouse-storage"))]
pub async fn connect_store(_config: &EngineConfig) -> Result<Arc<dyn StoreGateway>> {
    anyhow::bail!("built without a store backend (enable the clickhouse-storage feature)")
}
