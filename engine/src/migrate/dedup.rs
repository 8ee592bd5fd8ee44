//! Anti-join migration for tables that may receive the same row twice

use crate::error::{MigrationError, MigrationPhase};
use crate::migrate::result::{Strategy, TableMigrationResult};
use crate::migrate::simple::{precheck, verify_and_delete, Precheck};
use crate::migrate::store::TierStore;
use crate::migrate::window::MigrationWindow;
use crate::tables::TableSpec;
use std::sync::Arc;

/// Copies only hot rows whose natural key is not already in cold.
///
/// Errors are returned as-is; the caller decides whether to retry the table
/// with [`SimpleTableMigrator`](crate::migrate::simple::SimpleTableMigrator).
#[derive(Clone)]
pub struct DedupTableMigrator {
    store: Arc<dyn TierStore>,
    row_cap: u64,
}

impl DedupTableMigrator {
    pub fn new(store: Arc<dyn TierStore>, row_cap: u64) -> Self {
        Self { store, row_cap }
    }

    pub async fn migrate(
        &self,
        table: &TableSpec,
        window: &MigrationWindow,
    ) -> Result<TableMigrationResult, MigrationError> {
        let hot_before =
            match precheck(self.store.as_ref(), table, window, Strategy::Complex).await? {
                Precheck::Done(result) => return Ok(result),
                Precheck::Proceed(count) => count,
            };

        self.store
            .copy_missing(table, window, self.row_cap)
            .await
            .map_err(|e| MigrationError::new(&table.name, MigrationPhase::Copy, e))?;

        verify_and_delete(self.store.as_ref(), table, window, hot_before, Strategy::Complex).await
    }
}
