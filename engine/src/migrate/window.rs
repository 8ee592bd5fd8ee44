//! Migration window planning

use crate::config::MigrationConfig;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Rows eligible for one migration run. Immutable for the run's duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationWindow {
    /// Exclusive upper bound on `timestamp`
    pub cutoff: DateTime<Utc>,
    /// Inclusive lower bound on `timestamp` (repair lookback only)
    pub since: Option<DateTime<Utc>>,
    pub symbol_prefix: Option<String>,
    pub exchange: Option<String>,
    pub market_type: Option<String>,
    pub dry_run: bool,
}

impl MigrationWindow {
    /// Window with only a cutoff.
    pub fn before(cutoff: DateTime<Utc>) -> Self {
        Self {
            cutoff,
            since: None,
            symbol_prefix: None,
            exchange: None,
            market_type: None,
            dry_run: false,
        }
    }

    /// True when a row with these attributes falls inside the window. All
    /// filters are ANDed with the time bounds.
    pub fn matches(
        &self,
        exchange: &str,
        market_type: &str,
        symbol: &str,
        timestamp: DateTime<Utc>,
    ) -> bool {
        timestamp < self.cutoff
            && self.since.map_or(true, |since| timestamp >= since)
            && self
                .symbol_prefix
                .as_deref()
                .map_or(true, |prefix| symbol.starts_with(prefix))
            && self.exchange.as_deref().map_or(true, |e| e == exchange)
            && self.market_type.as_deref().map_or(true, |m| m == market_type)
    }

    pub fn has_filters(&self) -> bool {
        self.symbol_prefix.is_some() || self.exchange.is_some() || self.market_type.is_some()
    }
}

/// Computes migration windows from configuration and the current time.
#[derive(Debug, Clone)]
pub struct ColdMigrationPlanner {
    config: MigrationConfig,
}

impl ColdMigrationPlanner {
    pub fn new(config: MigrationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn plan(&self) -> MigrationWindow {
        self.plan_at(Utc::now())
    }

    /// Normal run: everything older than `now - window_hours`, narrowed by
    /// the configured filters.
    pub fn plan_at(&self, now: DateTime<Utc>) -> MigrationWindow {
        MigrationWindow {
            cutoff: now - Duration::hours(i64::from(self.config.window_hours)),
            since: None,
            symbol_prefix: self.config.symbol_prefix.clone(),
            exchange: self.config.exchange.clone(),
            market_type: self.config.market_type.clone(),
            dry_run: self.config.dry_run,
        }
    }

    /// Repair run: the last `repair_window_hours` up to now, unfiltered, so
    /// rows the normal cutoff has not reached yet still land in cold.
    pub fn repair_window_at(&self, now: DateTime<Utc>) -> MigrationWindow {
        MigrationWindow {
            cutoff: now,
            since: Some(now - Duration::hours(i64::from(self.config.repair_window_hours))),
            symbol_prefix: None,
            exchange: None,
            market_type: None,
            dry_run: false,
        }
    }
}
