//! Semantic migration operations over the two tiers

use crate::error::StoreError;
use crate::migrate::window::MigrationWindow;
use crate::sql::migration::{self as statements, TableRefs};
use crate::storage::{StoreGateway, Tier};
use crate::tables::TableSpec;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// What the migrators need from storage, without any SQL.
#[async_trait]
pub trait TierStore: Send + Sync {
    /// Rows of `table` in `tier` matching the window.
    async fn count(
        &self,
        tier: Tier,
        table: &TableSpec,
        window: &MigrationWindow,
    ) -> Result<u64, StoreError>;

    /// All rows of `table` in `tier`.
    async fn count_all(&self, tier: Tier, table: &TableSpec) -> Result<u64, StoreError>;

    /// Copy every hot row in the window to cold, at most `row_cap` rows.
    async fn copy(
        &self,
        table: &TableSpec,
        window: &MigrationWindow,
        row_cap: u64,
    ) -> Result<(), StoreError>;

    /// Copy hot rows in the window whose natural key is absent from cold.
    async fn copy_missing(
        &self,
        table: &TableSpec,
        window: &MigrationWindow,
        row_cap: u64,
    ) -> Result<(), StoreError>;

    /// Delete hot rows in the window whose natural key is present in cold.
    async fn delete_migrated(
        &self,
        table: &TableSpec,
        window: &MigrationWindow,
    ) -> Result<(), StoreError>;
}

/// `TierStore` that renders SQL and sends it through a `StoreGateway`.
#[derive(Clone)]
pub struct SqlTierStore {
    gateway: Arc<dyn StoreGateway>,
}

impl SqlTierStore {
    pub fn new(gateway: Arc<dyn StoreGateway>) -> Self {
        Self { gateway }
    }

    fn refs(&self, table: &TableSpec) -> TableRefs {
        TableRefs::resolve(self.gateway.as_ref(), &table.name)
    }

    // Statements may embed remote() credentials, so only the operation is logged.
    async fn run(
        &self,
        tier: Tier,
        operation: &str,
        table: &str,
        sql: String,
    ) -> Result<(), StoreError> {
        debug!(%tier, operation, table, "Executing migration statement");
        self.gateway.execute(tier, &sql).await
    }
}

#[async_trait]
impl TierStore for SqlTierStore {
    async fn count(
        &self,
        tier: Tier,
        table: &TableSpec,
        window: &MigrationWindow,
    ) -> Result<u64, StoreError> {
        let refs = self.refs(table);
        let table_ref = match tier {
            Tier::Hot => &refs.hot,
            Tier::Cold => &refs.cold,
        };
        self.gateway
            .fetch_count(tier, &statements::count(table_ref, window))
            .await
    }

    async fn count_all(&self, tier: Tier, table: &TableSpec) -> Result<u64, StoreError> {
        let table_ref = self.gateway.table_ref(tier, &table.name, tier);
        self.gateway
            .fetch_count(tier, &statements::count_all(&table_ref))
            .await
    }

    async fn copy(
        &self,
        table: &TableSpec,
        window: &MigrationWindow,
        row_cap: u64,
    ) -> Result<(), StoreError> {
        let sql = statements::copy(table, &self.refs(table), window, row_cap);
        self.run(Tier::Cold, "copy", &table.name, sql).await
    }

    async fn copy_missing(
        &self,
        table: &TableSpec,
        window: &MigrationWindow,
        row_cap: u64,
    ) -> Result<(), StoreError> {
        let sql = statements::copy_missing(table, &self.refs(table), window, row_cap);
        self.run(Tier::Cold, "copy_missing", &table.name, sql).await
    }

    async fn delete_migrated(
        &self,
        table: &TableSpec,
        window: &MigrationWindow,
    ) -> Result<(), StoreError> {
        let sql = statements::delete_migrated(table, &self.refs(table), window);
        self.run(Tier::Hot, "delete_migrated", &table.name, sql).await
    }
}
