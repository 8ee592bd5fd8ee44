//! Hot-to-cold migration
//!
//! A run plans one window, migrates every table (anti-join copy for dedup
//! tables, projecting copy otherwise), verifies the whole cold tier and
//! repairs any table still empty. The store has no multi-statement
//! transactions, so each table goes copy, recount, then a delete that only
//! touches rows cold already holds.

pub mod dedup;
pub mod repair;
pub mod result;
pub mod scheduler;
pub mod simple;
pub mod store;
pub mod verify;
pub mod window;

pub use dedup::DedupTableMigrator;
pub use repair::{RepairEngine, RepairReport, RepairStatus, TableRepair};
pub use result::{MigrationStatus, RunSummary, Strategy, TableMigrationResult};
pub use scheduler::MigrationScheduler;
pub use simple::SimpleTableMigrator;
pub use store::{SqlTierStore, TierStore};
pub use verify::{IntegrityReport, IntegrityVerifier};
pub use window::{ColdMigrationPlanner, MigrationWindow};

use crate::config::MigrationConfig;
use crate::error::MigrationPhase;
use crate::tables::{Catalog, TableSpec};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Externally triggered modes for one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Count only, on top of the configured `dry_run`
    pub dry_run: bool,
    /// Skip migration; verify and repair only
    pub force_repair: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    /// `None` when the run was repair-only
    pub summary: Option<RunSummary>,
    pub integrity: IntegrityReport,
    pub repair: Option<RepairReport>,
    /// Integrity after repair; same as `integrity` when no repair ran
    pub final_integrity: IntegrityReport,
}

impl MigrationReport {
    /// Empty cold tables remain after a repair attempt.
    pub fn requires_operator(&self) -> bool {
        self.repair.is_some() && !self.final_integrity.is_complete()
    }
}

/// Runs planner, migrators, verifier and repair engine as one pass.
pub struct ColdMigrator {
    planner: ColdMigrationPlanner,
    catalog: Arc<Catalog>,
    simple: SimpleTableMigrator,
    dedup: DedupTableMigrator,
    verifier: IntegrityVerifier,
    repair: RepairEngine,
}

impl ColdMigrator {
    pub fn new(store: Arc<dyn TierStore>, catalog: Arc<Catalog>, config: MigrationConfig) -> Self {
        let row_cap = config.row_cap;
        Self {
            planner: ColdMigrationPlanner::new(config),
            simple: SimpleTableMigrator::new(store.clone(), row_cap),
            dedup: DedupTableMigrator::new(store.clone(), row_cap),
            verifier: IntegrityVerifier::new(store.clone(), catalog.clone()),
            repair: RepairEngine::new(store, catalog.clone(), row_cap),
            catalog,
        }
    }

    pub fn planner(&self) -> &ColdMigrationPlanner {
        &self.planner
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub async fn run(&self, options: RunOptions) -> MigrationReport {
        self.run_at(options, Utc::now()).await
    }

    pub async fn run_at(&self, options: RunOptions, now: DateTime<Utc>) -> MigrationReport {
        let mut window = self.planner.plan_at(now);
        window.dry_run |= options.dry_run;
        crate::audit::migration_started(
            window.dry_run,
            options.force_repair,
            &window.cutoff.to_rfc3339(),
        );

        let summary = if options.force_repair {
            info!("Forced repair, skipping migration");
            None
        } else {
            let summary = self.migrate_tables(&window).await;
            info!(
                copied = summary.total_copied(),
                deleted = summary.total_deleted(),
                failed = summary.failed_tables().len(),
                "Migration pass finished\n{}",
                summary.render()
            );
            Some(summary)
        };

        let integrity = self.verifier.verify().await;

        // Repair writes to cold, which a dry run must not do.
        let (repair, final_integrity) = if integrity.is_complete() || window.dry_run {
            (None, integrity.clone())
        } else {
            let report = self.repair_at(&integrity.empty_tables, now).await;
            (Some(report), self.verifier.verify().await)
        };

        if repair.is_some() && !final_integrity.is_complete() {
            warn!(
                tables = ?final_integrity.empty_tables,
                "Cold tables still empty, operator attention needed"
            );
        }

        MigrationReport {
            summary,
            integrity,
            repair,
            final_integrity,
        }
    }

    pub async fn verify(&self) -> IntegrityReport {
        self.verifier.verify().await
    }

    /// Repair the named tables over the repair window ending at `now`.
    pub async fn repair_at(&self, tables: &[String], now: DateTime<Utc>) -> RepairReport {
        let window = self.planner.repair_window_at(now);
        self.repair.repair(tables, &window).await
    }

    /// Migrate every catalog table concurrently. Results keep catalog order.
    pub async fn migrate_tables(&self, window: &MigrationWindow) -> RunSummary {
        let tables = self.catalog.tables();
        let mut set = JoinSet::new();
        for (index, table) in tables.iter().cloned().enumerate() {
            let simple = self.simple.clone();
            let dedup = self.dedup.clone();
            let window = window.clone();
            set.spawn(async move {
                let result = migrate_table(&simple, &dedup, &table, &window).await;
                (index, result)
            });
        }

        let mut slots: Vec<Option<TableMigrationResult>> = vec![None; tables.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => error!(error = %e, "Table migration task failed"),
            }
        }

        let results = slots
            .into_iter()
            .zip(tables)
            .map(|(slot, table)| {
                slot.unwrap_or_else(|| {
                    TableMigrationResult::failed(&table.name, strategy_for(table), "task aborted")
                })
            })
            .collect();

        RunSummary {
            window: window.clone(),
            results,
        }
    }
}

fn strategy_for(table: &TableSpec) -> Strategy {
    if table.dedup {
        Strategy::Complex
    } else {
        Strategy::Simple
    }
}

/// One table, with dedup falling back to the simple copy when the anti-join
/// copy itself fails. Never errors; any other failure is reported as
/// `FAILED` for this table only.
async fn migrate_table(
    simple: &SimpleTableMigrator,
    dedup: &DedupTableMigrator,
    table: &TableSpec,
    window: &MigrationWindow,
) -> TableMigrationResult {
    let outcome = if table.dedup {
        match dedup.migrate(table, window).await {
            // Past the copy the anti-join rows are already in cold; a plain
            // copy now would duplicate them.
            Err(e) if e.phase == MigrationPhase::Copy => {
                warn!(
                    table = %table.name,
                    error = %e,
                    "Anti-join copy failed, falling back to simple copy"
                );
                crate::metrics::DEDUP_FALLBACK_TOTAL
                    .with_label_values(&[table.name.as_str()])
                    .inc();
                simple.migrate(table, window).await.map(|mut result| {
                    result.fell_back = true;
                    result
                })
            }
            other => other,
        }
    } else {
        simple.migrate(table, window).await
    };

    let result = outcome.unwrap_or_else(|e| {
        error!(table = %table.name, phase = %e.phase, error = %e.source, "Table migration failed");
        TableMigrationResult::failed(&table.name, strategy_for(table), &e)
    });

    crate::metrics::MIGRATION_TABLES_TOTAL
        .with_label_values(&[table.name.as_str(), result.status.as_str()])
        .inc();
    crate::metrics::MIGRATED_ROWS
        .with_label_values(&[table.name.as_str()])
        .inc_by(result.copied as f64);
    crate::metrics::DELETED_ROWS
        .with_label_values(&[table.name.as_str()])
        .inc_by(result.deleted as f64);

    result
}
