//! SqlTierStore statement routing

mod common;

use chrono::{TimeZone, Utc};
use common::RecordingGateway;
use std::sync::Arc;
use strata_engine::config::MigrationConfig;
use strata_engine::migrate::{ColdMigrator, MigrationWindow, SqlTierStore, TierStore};
use strata_engine::storage::Tier;
use strata_engine::tables::Catalog;

fn window() -> MigrationWindow {
    MigrationWindow {
        symbol_prefix: Some("BTC".into()),
        ..MigrationWindow::before(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap())
    }
}

fn store() -> (SqlTierStore, Arc<RecordingGateway>) {
    let gateway = Arc::new(RecordingGateway::new());
    (SqlTierStore::new(gateway.clone()), gateway)
}

#[tokio::test]
async fn test_copy_runs_on_cold_and_reads_hot_remotely() {
    let (store, gateway) = store();
    let catalog = Catalog::standard();
    let trades = catalog.get("trades").unwrap();

    store.copy(trades, &window(), 1_000).await.unwrap();

    let executed = gateway.executed();
    assert_eq!(executed.len(), 1);
    let (tier, sql) = &executed[0];
    assert_eq!(*tier, Tier::Cold);
    assert!(sql.starts_with("INSERT INTO cold.trades (exchange, market_type, symbol, timestamp"));
    assert!(sql.contains("FROM remote(hot.trades) WHERE"));
    assert!(sql.contains("startsWith(symbol, 'BTC')"));
    assert!(sql.ends_with("LIMIT 1000"));
}

#[tokio::test]
async fn test_copy_missing_joins_on_natural_key() {
    let (store, gateway) = store();
    let catalog = Catalog::standard();
    let lsr = catalog.get("lsr_top_positions").unwrap();

    store.copy_missing(lsr, &window(), 500).await.unwrap();

    let (tier, sql) = &gateway.executed()[0];
    assert_eq!(*tier, Tier::Cold);
    assert!(sql.contains("LEFT ANTI JOIN"));
    assert!(sql.contains("USING (exchange, market_type, symbol, timestamp, period)"));
    assert!(sql.contains("FROM cold.lsr_top_positions WHERE"));
}

#[tokio::test]
async fn test_delete_runs_on_hot_and_probes_cold() {
    let (store, gateway) = store();
    let catalog = Catalog::standard();
    let trades = catalog.get("trades").unwrap();

    store.delete_migrated(trades, &window()).await.unwrap();

    let (tier, sql) = &gateway.executed()[0];
    assert_eq!(*tier, Tier::Hot);
    assert!(sql.starts_with("ALTER TABLE hot.trades DELETE WHERE"));
    assert!(sql.contains("(exchange, market_type, symbol, timestamp, trade_id) IN"));
    assert!(sql.contains("FROM remote(cold.trades) WHERE"));
}

#[tokio::test]
async fn test_counts_target_the_requested_tier() {
    let (store, gateway) = store();
    gateway.set_count_result(42);
    let catalog = Catalog::standard();
    let trades = catalog.get("trades").unwrap();

    assert_eq!(store.count(Tier::Hot, trades, &window()).await.unwrap(), 42);
    assert_eq!(store.count_all(Tier::Cold, trades).await.unwrap(), 42);

    let queries = gateway.count_queries();
    assert_eq!(queries[0].0, Tier::Hot);
    assert!(queries[0].1.starts_with("SELECT count() FROM hot.trades WHERE timestamp <"));
    assert_eq!(queries[1], (Tier::Cold, "SELECT count() FROM cold.trades".to_string()));
}

#[tokio::test]
async fn test_store_errors_become_failed_tables() {
    let gateway = Arc::new(RecordingGateway::new());
    gateway.set_count_result(10);
    let migrator = ColdMigrator::new(
        Arc::new(SqlTierStore::new(gateway.clone())),
        Arc::new(Catalog::standard()),
        MigrationConfig::default(),
    );
    gateway.set_failing(true);

    let window = migrator
        .planner()
        .plan_at(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
    let summary = migrator.migrate_tables(&window).await;

    assert_eq!(summary.failed_tables().len(), 8);
    assert!(gateway.executed().is_empty());
}
