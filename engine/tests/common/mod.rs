//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use strata_engine::error::StoreError;
use strata_engine::migrate::{MigrationWindow, TierStore};
use strata_engine::storage::{StoreGateway, Tier};
use strata_engine::tables::TableSpec;

// ── Recording gateway ────────────────────────────────────────────────────────

/// `StoreGateway` that records every statement and can be told to fail or
/// to stall, tracking how many writes per table overlap.
#[derive(Default)]
pub struct RecordingGateway {
    executed: Mutex<Vec<(Tier, String)>>,
    attempts: Mutex<Vec<(Tier, String)>>,
    counts: Mutex<Vec<(Tier, String)>>,
    failing: AtomicBool,
    delay_ms: AtomicU64,
    count_result: AtomicU64,
    in_flight: Mutex<HashMap<String, usize>>,
    max_in_flight: Mutex<HashMap<String, usize>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_count_result(&self, count: u64) {
        self.count_result.store(count, Ordering::SeqCst);
    }

    /// Statements the store accepted, in order.
    pub fn executed(&self) -> Vec<(Tier, String)> {
        self.executed.lock().unwrap().clone()
    }

    /// Successful hot inserts only.
    pub fn inserts(&self) -> Vec<String> {
        self.executed()
            .into_iter()
            .filter(|(tier, sql)| *tier == Tier::Hot && sql.starts_with("INSERT INTO"))
            .map(|(_, sql)| sql)
            .collect()
    }

    /// Every execute call, failed ones included.
    pub fn attempts(&self) -> Vec<(Tier, String)> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn count_queries(&self) -> Vec<(Tier, String)> {
        self.counts.lock().unwrap().clone()
    }

    /// Highest number of overlapping writes seen for one table.
    pub fn max_concurrent(&self, table: &str) -> usize {
        self.max_in_flight
            .lock()
            .unwrap()
            .get(table)
            .copied()
            .unwrap_or(0)
    }

    fn target(statement: &str) -> String {
        statement
            .strip_prefix("INSERT INTO ")
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap_or("")
            .to_string()
    }
}

#[async_trait]
impl StoreGateway for RecordingGateway {
    async fn execute(&self, tier: Tier, statement: &str) -> Result<(), StoreError> {
        let target = Self::target(statement);
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            let current = in_flight.entry(target.clone()).or_insert(0);
            *current += 1;
            let mut max = self.max_in_flight.lock().unwrap();
            let seen = max.entry(target.clone()).or_insert(0);
            *seen = (*seen).max(*current);
        }
        self.attempts
            .lock()
            .unwrap()
            .push((tier, statement.to_string()));

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let failing = self.failing.load(Ordering::SeqCst);
        if !failing {
            self.executed
                .lock()
                .unwrap()
                .push((tier, statement.to_string()));
        }
        *self.in_flight.lock().unwrap().entry(target).or_insert(1) -= 1;

        if failing {
            Err(StoreError::query(tier, "injected failure"))
        } else {
            Ok(())
        }
    }

    async fn fetch_count(&self, tier: Tier, statement: &str) -> Result<u64, StoreError> {
        self.counts
            .lock()
            .unwrap()
            .push((tier, statement.to_string()));
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::query(tier, "injected failure"));
        }
        Ok(self.count_result.load(Ordering::SeqCst))
    }

    fn table_ref(&self, tier: Tier, table: &str, from: Tier) -> String {
        if tier == from {
            format!("{}.{}", tier, table)
        } else {
            format!("remote({}.{})", tier, table)
        }
    }
}

// ── In-memory tier store ─────────────────────────────────────────────────────

/// One stored row: routing columns, event time and the table-specific key
/// part (trade id, period, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub exchange: String,
    pub market_type: String,
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub key: String,
}

impl Row {
    pub fn new(symbol: &str, timestamp: DateTime<Utc>, key: &str) -> Self {
        Self {
            exchange: "binance".to_string(),
            market_type: "futures".to_string(),
            symbol: symbol.to_string(),
            timestamp,
            key: key.to_string(),
        }
    }

    fn in_window(&self, window: &MigrationWindow) -> bool {
        window.matches(&self.exchange, &self.market_type, &self.symbol, self.timestamp)
    }
}

#[derive(Default)]
struct Tables {
    hot: HashMap<String, Vec<Row>>,
    cold: HashMap<String, Vec<Row>>,
    fail_tables: HashSet<String>,
    fail_copy_missing: HashSet<String>,
    fail_cold_count: HashSet<String>,
    fail_delete_once: HashSet<String>,
    ops: Vec<(String, String)>,
    copied_rows: HashMap<String, u64>,
}

/// `TierStore` over two maps of rows, with per-table failure injection.
#[derive(Default)]
pub struct MemoryTierStore {
    tables: Mutex<Tables>,
}

impl MemoryTierStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_hot(&self, table: &str, rows: impl IntoIterator<Item = Row>) {
        let mut tables = self.tables.lock().unwrap();
        tables.hot.entry(table.to_string()).or_default().extend(rows);
    }

    pub fn insert_cold(&self, table: &str, rows: impl IntoIterator<Item = Row>) {
        let mut tables = self.tables.lock().unwrap();
        tables.cold.entry(table.to_string()).or_default().extend(rows);
    }

    pub fn hot_rows(&self, table: &str) -> Vec<Row> {
        let tables = self.tables.lock().unwrap();
        tables.hot.get(table).cloned().unwrap_or_default()
    }

    pub fn cold_rows(&self, table: &str) -> Vec<Row> {
        let tables = self.tables.lock().unwrap();
        tables.cold.get(table).cloned().unwrap_or_default()
    }

    /// Every operation on `table` fails.
    pub fn fail_table(&self, table: &str) {
        self.tables.lock().unwrap().fail_tables.insert(table.to_string());
    }

    /// Only the anti-join copy on `table` fails.
    pub fn fail_copy_missing(&self, table: &str) {
        self.tables
            .lock()
            .unwrap()
            .fail_copy_missing
            .insert(table.to_string());
    }

    /// The next delete on `table` fails; later ones succeed.
    pub fn fail_delete_once(&self, table: &str) {
        self.tables
            .lock()
            .unwrap()
            .fail_delete_once
            .insert(table.to_string());
    }

    /// Cold counts on `table` fail.
    pub fn fail_cold_count(&self, table: &str) {
        self.tables
            .lock()
            .unwrap()
            .fail_cold_count
            .insert(table.to_string());
    }

    /// `(operation, table)` for every mutating call, in order.
    pub fn ops(&self) -> Vec<(String, String)> {
        self.tables.lock().unwrap().ops.clone()
    }

    pub fn ops_on(&self, table: &str) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter(|(_, t)| t == table)
            .map(|(op, _)| op)
            .collect()
    }

    /// Rows physically written to cold for `table`.
    pub fn copied_rows(&self, table: &str) -> u64 {
        self.tables
            .lock()
            .unwrap()
            .copied_rows
            .get(table)
            .copied()
            .unwrap_or(0)
    }

    fn check(tables: &Tables, tier: Tier, table: &str) -> Result<(), StoreError> {
        if tables.fail_tables.contains(table) {
            return Err(StoreError::query(tier, format!("injected failure on {}", table)));
        }
        Ok(())
    }

    fn copy_rows(&self, table: &TableSpec, window: &MigrationWindow, row_cap: u64, missing_only: bool) {
        let mut tables = self.tables.lock().unwrap();
        let existing = tables.cold.get(&table.name).cloned().unwrap_or_default();
        let mut eligible: Vec<Row> = tables
            .hot
            .get(&table.name)
            .map(|rows| rows.iter().filter(|r| r.in_window(window)).cloned().collect())
            .unwrap_or_default();
        eligible.sort_by_key(|r| r.timestamp);
        let copied: Vec<Row> = eligible
            .into_iter()
            .filter(|r| !missing_only || !existing.contains(r))
            .take(row_cap as usize)
            .collect();
        *tables.copied_rows.entry(table.name.clone()).or_insert(0) += copied.len() as u64;
        tables.cold.entry(table.name.clone()).or_default().extend(copied);
    }
}

#[async_trait]
impl TierStore for MemoryTierStore {
    async fn count(
        &self,
        tier: Tier,
        table: &TableSpec,
        window: &MigrationWindow,
    ) -> Result<u64, StoreError> {
        let tables = self.tables.lock().unwrap();
        Self::check(&tables, tier, &table.name)?;
        if tier == Tier::Cold && tables.fail_cold_count.contains(&table.name) {
            return Err(StoreError::query(tier, "injected cold count failure"));
        }
        let rows = match tier {
            Tier::Hot => tables.hot.get(&table.name),
            Tier::Cold => tables.cold.get(&table.name),
        };
        Ok(rows
            .map(|rows| rows.iter().filter(|r| r.in_window(window)).count() as u64)
            .unwrap_or(0))
    }

    async fn count_all(&self, tier: Tier, table: &TableSpec) -> Result<u64, StoreError> {
        let tables = self.tables.lock().unwrap();
        Self::check(&tables, tier, &table.name)?;
        if tier == Tier::Cold && tables.fail_cold_count.contains(&table.name) {
            return Err(StoreError::query(tier, "injected cold count failure"));
        }
        let rows = match tier {
            Tier::Hot => tables.hot.get(&table.name),
            Tier::Cold => tables.cold.get(&table.name),
        };
        Ok(rows.map(|rows| rows.len() as u64).unwrap_or(0))
    }

    async fn copy(
        &self,
        table: &TableSpec,
        window: &MigrationWindow,
        row_cap: u64,
    ) -> Result<(), StoreError> {
        {
            let mut tables = self.tables.lock().unwrap();
            Self::check(&tables, Tier::Cold, &table.name)?;
            tables.ops.push(("copy".to_string(), table.name.clone()));
        }
        self.copy_rows(table, window, row_cap, false);
        Ok(())
    }

    async fn copy_missing(
        &self,
        table: &TableSpec,
        window: &MigrationWindow,
        row_cap: u64,
    ) -> Result<(), StoreError> {
        {
            let mut tables = self.tables.lock().unwrap();
            Self::check(&tables, Tier::Cold, &table.name)?;
            tables.ops.push(("copy_missing".to_string(), table.name.clone()));
            if tables.fail_copy_missing.contains(&table.name) {
                return Err(StoreError::query(Tier::Cold, "anti-join not supported"));
            }
        }
        self.copy_rows(table, window, row_cap, true);
        Ok(())
    }

    async fn delete_migrated(
        &self,
        table: &TableSpec,
        window: &MigrationWindow,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        Self::check(&tables, Tier::Hot, &table.name)?;
        if tables.fail_delete_once.remove(&table.name) {
            return Err(StoreError::query(Tier::Hot, "injected delete failure"));
        }
        tables.ops.push(("delete".to_string(), table.name.clone()));
        let cold = tables.cold.get(&table.name).cloned().unwrap_or_default();
        if let Some(hot) = tables.hot.get_mut(&table.name) {
            hot.retain(|r| !(r.in_window(window) && cold.contains(r)));
        }
        Ok(())
    }
}
