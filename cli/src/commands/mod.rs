//! Subcommand implementations

pub mod config;
pub mod migrate;
pub mod plan;
pub mod repair;
pub mod verify;

use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;
use strata_engine::config::{EngineConfig, MigrationConfig};
use strata_engine::migrate::{ColdMigrator, IntegrityReport, SqlTierStore};
use strata_engine::{build_catalog, connect_store};

use crate::output;

/// Window overrides shared by `migrate` and `plan`.
#[derive(Args, Debug, Default)]
pub struct WindowArgs {
    /// Migrate rows older than this many hours
    #[arg(long)]
    pub window_hours: Option<u32>,

    /// Only symbols starting with this prefix
    #[arg(long)]
    pub symbol_prefix: Option<String>,

    /// Only this exchange
    #[arg(long)]
    pub exchange: Option<String>,

    /// Only this market type (spot, futures, ...)
    #[arg(long)]
    pub market_type: Option<String>,
}

impl WindowArgs {
    pub fn apply(&self, migration: &mut MigrationConfig) {
        if let Some(hours) = self.window_hours {
            migration.window_hours = hours;
        }
        if self.symbol_prefix.is_some() {
            migration.symbol_prefix = self.symbol_prefix.clone();
        }
        if self.exchange.is_some() {
            migration.exchange = self.exchange.clone();
        }
        if self.market_type.is_some() {
            migration.market_type = self.market_type.clone();
        }
    }
}

/// Connect to both tiers and build a migrator from `config`.
pub async fn migrator(config: &EngineConfig) -> Result<ColdMigrator> {
    let gateway = connect_store(config)
        .await
        .context("Failed to connect to store")?;
    let catalog = build_catalog(config)?;
    Ok(ColdMigrator::new(
        Arc::new(SqlTierStore::new(gateway)),
        catalog,
        config.migration.clone(),
    ))
}

/// Per-table cold counts with a status mark, then the score.
pub fn print_integrity(report: &IntegrityReport, order: &[String]) {
    let width = order.iter().map(String::len).max().unwrap_or(5);
    for table in order {
        let count = report.counts.get(table).copied().unwrap_or(0);
        let line = format!("{:<width$}  {:>12}", table, count);
        match report.errors.get(table) {
            Some(e) => output::error(&format!("{}  ({})", line, e)),
            None if count == 0 => output::warning(&line),
            None => output::success(&line),
        }
    }
    let total = report.counts.len();
    let line = format!(
        "Integrity {:.1}% ({}/{} tables with data)",
        report.integrity_score * 100.0,
        report.tables_with_data(),
        total
    );
    if report.is_complete() {
        output::success(&line);
    } else {
        output::warning(&line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_args_override_only_given_fields() {
        let mut migration = MigrationConfig {
            exchange: Some("okx".into()),
            ..MigrationConfig::default()
        };
        let args = WindowArgs {
            window_hours: Some(12),
            symbol_prefix: Some("BTC".into()),
            ..WindowArgs::default()
        };
        args.apply(&mut migration);

        assert_eq!(migration.window_hours, 12);
        assert_eq!(migration.symbol_prefix.as_deref(), Some("BTC"));
        assert_eq!(migration.exchange.as_deref(), Some("okx"));
        assert!(migration.market_type.is_none());
    }
}
