//! Statements for hot-to-cold migration
//!
//! Copies execute on the cold server and read hot through a table reference;
//! confirmed deletes execute on the hot server and probe cold the same way.

use super::{datetime_literal, quote_str};
use crate::migrate::window::MigrationWindow;
use crate::storage::{StoreGateway, Tier};
use crate::tables::{TableSpec, TIMESTAMP_COLUMN};

/// How one table is named from each side of the migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRefs {
    /// Hot table, from the hot server
    pub hot: String,
    /// Cold table, from the cold server
    pub cold: String,
    /// Hot table, from the cold server
    pub hot_from_cold: String,
    /// Cold table, from the hot server
    pub cold_from_hot: String,
}

impl TableRefs {
    pub fn resolve(gateway: &dyn StoreGateway, table: &str) -> Self {
        Self {
            hot: gateway.table_ref(Tier::Hot, table, Tier::Hot),
            cold: gateway.table_ref(Tier::Cold, table, Tier::Cold),
            hot_from_cold: gateway.table_ref(Tier::Hot, table, Tier::Cold),
            cold_from_hot: gateway.table_ref(Tier::Cold, table, Tier::Hot),
        }
    }
}

/// `WHERE` predicate for a window.
pub fn window_filter(window: &MigrationWindow) -> String {
    let mut clauses = vec![format!("{} < {}", TIMESTAMP_COLUMN, datetime_literal(&window.cutoff))];
    if let Some(since) = &window.since {
        clauses.push(format!("{} >= {}", TIMESTAMP_COLUMN, datetime_literal(since)));
    }
    if let Some(prefix) = &window.symbol_prefix {
        clauses.push(format!("startsWith(symbol, {})", quote_str(prefix)));
    }
    if let Some(exchange) = &window.exchange {
        clauses.push(format!("exchange = {}", quote_str(exchange)));
    }
    if let Some(market_type) = &window.market_type {
        clauses.push(format!("market_type = {}", quote_str(market_type)));
    }
    clauses.join(" AND ")
}

pub fn count(table_ref: &str, window: &MigrationWindow) -> String {
    format!("SELECT count() FROM {} WHERE {}", table_ref, window_filter(window))
}

pub fn count_all(table_ref: &str) -> String {
    format!("SELECT count() FROM {}", table_ref)
}

/// Plain projecting copy of every hot row in the window, capped at `row_cap`.
pub fn copy(spec: &TableSpec, refs: &TableRefs, window: &MigrationWindow, row_cap: u64) -> String {
    let columns = column_list(spec);
    format!(
        "INSERT INTO {cold} ({cols}) SELECT {cols} FROM {hot} WHERE {filter} ORDER BY {ts} LIMIT {cap}",
        cold = refs.cold,
        cols = columns,
        hot = refs.hot_from_cold,
        filter = window_filter(window),
        ts = TIMESTAMP_COLUMN,
        cap = row_cap,
    )
}

/// Anti-join copy: only hot rows whose natural key is absent from cold.
pub fn copy_missing(
    spec: &TableSpec,
    refs: &TableRefs,
    window: &MigrationWindow,
    row_cap: u64,
) -> String {
    let columns = column_list(spec);
    let key = spec.natural_key.join(", ");
    let filter = window_filter(window);
    format!(
        "INSERT INTO {cold} ({cols}) SELECT {cols} FROM \
         (SELECT {cols} FROM {hot} WHERE {filter}) AS h \
         LEFT ANTI JOIN (SELECT DISTINCT {key} FROM {cold} WHERE {filter}) AS c USING ({key}) \
         ORDER BY {ts} LIMIT {cap}",
        cold = refs.cold,
        cols = columns,
        hot = refs.hot_from_cold,
        filter = filter,
        key = key,
        ts = TIMESTAMP_COLUMN,
        cap = row_cap,
    )
}

/// Delete hot rows in the window whose natural key is already in cold.
pub fn delete_migrated(spec: &TableSpec, refs: &TableRefs, window: &MigrationWindow) -> String {
    let key = spec.natural_key.join(", ");
    let filter = window_filter(window);
    format!(
        "ALTER TABLE {hot} DELETE WHERE {filter} AND ({key}) IN \
         (SELECT {key} FROM {cold} WHERE {filter})",
        hot = refs.hot,
        filter = filter,
        key = key,
        cold = refs.cold_from_hot,
    )
}

fn column_list(spec: &TableSpec) -> String {
    spec.column_names().collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::Catalog;
    use chrono::{TimeZone, Utc};

    fn refs() -> TableRefs {
        TableRefs {
            hot: "market_hot.t".into(),
            cold: "market_cold.t".into(),
            hot_from_cold: "remote_hot".into(),
            cold_from_hot: "remote_cold".into(),
        }
    }

    fn window() -> MigrationWindow {
        MigrationWindow::before(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap())
    }

    #[test]
    fn test_filter_cutoff_only() {
        assert_eq!(
            window_filter(&window()),
            "timestamp < toDateTime64('2024-06-01 08:00:00.000', 3, 'UTC')"
        );
    }

    #[test]
    fn test_filter_all_clauses() {
        let mut w = window();
        w.since = Some(Utc.with_ymd_and_hms(2024, 5, 29, 8, 0, 0).unwrap());
        w.symbol_prefix = Some("BTC".into());
        w.exchange = Some("binance".into());
        w.market_type = Some("futures".into());
        assert_eq!(
            window_filter(&w),
            "timestamp < toDateTime64('2024-06-01 08:00:00.000', 3, 'UTC') \
             AND timestamp >= toDateTime64('2024-05-29 08:00:00.000', 3, 'UTC') \
             AND startsWith(symbol, 'BTC') AND exchange = 'binance' AND market_type = 'futures'"
        );
    }

    #[test]
    fn test_filter_escapes_values() {
        let mut w = window();
        w.exchange = Some("x' OR 1=1 --".into());
        assert!(window_filter(&w).contains(r"exchange = 'x\' OR 1=1 --'"));
    }

    #[test]
    fn test_copy_reads_hot_through_cold_side_ref() {
        let catalog = Catalog::standard();
        let spec = catalog.get("open_interest").unwrap();
        let sql = copy(spec, &refs(), &window(), 1000);
        assert!(sql.starts_with(
            "INSERT INTO market_cold.t (exchange, market_type, symbol, timestamp, open_interest, \
             open_interest_value, data_source) SELECT exchange, market_type, symbol, timestamp, \
             open_interest, open_interest_value, data_source FROM remote_hot WHERE "
        ));
        assert!(sql.ends_with("ORDER BY timestamp LIMIT 1000"));
    }

    #[test]
    fn test_copy_missing_anti_joins_on_natural_key() {
        let catalog = Catalog::standard();
        let spec = catalog.get("lsr_top_positions").unwrap();
        let sql = copy_missing(spec, &refs(), &window(), 50);
        assert!(sql.contains("LEFT ANTI JOIN (SELECT DISTINCT exchange, market_type, symbol, timestamp, period FROM market_cold.t WHERE"));
        assert!(sql.contains("USING (exchange, market_type, symbol, timestamp, period)"));
        assert!(sql.contains("FROM remote_hot WHERE"));
        assert!(sql.ends_with("LIMIT 50"));
    }

    #[test]
    fn test_delete_confirms_against_cold() {
        let catalog = Catalog::standard();
        let spec = catalog.get("trades").unwrap();
        let sql = delete_migrated(spec, &refs(), &window());
        assert!(sql.starts_with("ALTER TABLE market_hot.t DELETE WHERE timestamp <"));
        assert!(sql.contains(
            "AND (exchange, market_type, symbol, timestamp, trade_id) IN (SELECT exchange, \
             market_type, symbol, timestamp, trade_id FROM remote_cold WHERE"
        ));
    }

    #[test]
    fn test_counts() {
        assert_eq!(count_all("market_cold.t"), "SELECT count() FROM market_cold.t");
        assert!(count("market_hot.t", &window()).starts_with("SELECT count() FROM market_hot.t WHERE timestamp <"));
    }
}
