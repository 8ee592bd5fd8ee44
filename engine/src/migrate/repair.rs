//! Additive re-copy for cold tables the verifier found empty

use crate::migrate::store::TierStore;
use crate::migrate::verify::IntegrityVerifier;
use crate::migrate::window::MigrationWindow;
use crate::storage::Tier;
use crate::tables::Catalog;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStatus {
    /// Cold now has rows
    Repaired,
    /// Copy ran but cold is still empty (nothing in hot either)
    StillEmpty,
    Failed,
}

impl RepairStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepairStatus::Repaired => "repaired",
            RepairStatus::StillEmpty => "still_empty",
            RepairStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRepair {
    pub table: String,
    /// Hot rows inside the repair window
    pub hot_rows: u64,
    pub cold_rows_after: u64,
    pub status: RepairStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepairReport {
    pub window: MigrationWindow,
    pub tables: Vec<TableRepair>,
}

impl RepairReport {
    pub fn repaired(&self) -> Vec<&str> {
        self.with_status(RepairStatus::Repaired)
    }

    pub fn unrepaired(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|t| t.status != RepairStatus::Repaired)
            .map(|t| t.table.as_str())
            .collect()
    }

    fn with_status(&self, status: RepairStatus) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|t| t.status == status)
            .map(|t| t.table.as_str())
            .collect()
    }
}

/// Copies a wide, unfiltered window into empty cold tables.
///
/// Repair never deletes from hot; the next normal run cleans up.
pub struct RepairEngine {
    store: Arc<dyn TierStore>,
    catalog: Arc<Catalog>,
    verifier: IntegrityVerifier,
    row_cap: u64,
}

impl RepairEngine {
    pub fn new(store: Arc<dyn TierStore>, catalog: Arc<Catalog>, row_cap: u64) -> Self {
        let verifier = IntegrityVerifier::new(store.clone(), catalog.clone());
        Self {
            store,
            catalog,
            verifier,
            row_cap,
        }
    }

    pub async fn repair(&self, empty_tables: &[String], window: &MigrationWindow) -> RepairReport {
        let mut tables = Vec::with_capacity(empty_tables.len());
        for name in empty_tables {
            let outcome = self.repair_table(name, window).await;
            crate::metrics::REPAIR_TOTAL
                .with_label_values(&[name.as_str(), outcome.status.as_str()])
                .inc();
            tables.push(outcome);
        }
        RepairReport {
            window: window.clone(),
            tables,
        }
    }

    async fn repair_table(&self, name: &str, window: &MigrationWindow) -> TableRepair {
        let failed = |hot_rows: u64, error: String| TableRepair {
            table: name.to_string(),
            hot_rows,
            cold_rows_after: 0,
            status: RepairStatus::Failed,
            error: Some(error),
        };

        let Some(table) = self.catalog.get(name) else {
            return failed(0, format!("unknown table {}", name));
        };

        let hot_rows = match self.store.count(Tier::Hot, table, window).await {
            Ok(count) => count,
            Err(e) => {
                warn!(table = %name, error = %e, "Repair hot count failed");
                return failed(0, e.to_string());
            }
        };

        if hot_rows > 0 {
            if let Err(e) = self.store.copy(table, window, self.row_cap).await {
                warn!(table = %name, error = %e, "Repair copy failed");
                return failed(hot_rows, e.to_string());
            }
        }

        let cold_rows_after = self.verifier.verify_table(table).await;
        let status = if cold_rows_after > 0 {
            RepairStatus::Repaired
        } else {
            RepairStatus::StillEmpty
        };
        info!(
            table = %name,
            hot = hot_rows,
            cold = cold_rows_after,
            status = status.as_str(),
            "Repair finished"
        );

        TableRepair {
            table: name.to_string(),
            hot_rows,
            cold_rows_after,
            status,
            error: None,
        }
    }
}
