//! Per-table migration results and the run summary

use crate::migrate::window::MigrationWindow;
use serde::Serialize;
use std::fmt;
use std::fmt::Write as _;

/// Copy strategy used for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Projecting copy of every row in the window
    Simple,
    /// Anti-join copy on the natural key
    Complex,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Simple => "simple",
            Strategy::Complex => "complex",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationStatus {
    Ok,
    /// Nothing in the window
    Skip,
    /// Counted only
    DryRun,
    Failed,
}

impl MigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStatus::Ok => "OK",
            MigrationStatus::Skip => "SKIP",
            MigrationStatus::DryRun => "DRY_RUN",
            MigrationStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableMigrationResult {
    pub table: String,
    pub strategy: Strategy,
    pub hot_count_before: u64,
    pub copied: u64,
    pub deleted: u64,
    pub status: MigrationStatus,
    /// The anti-join copy failed and the simple copy ran instead
    pub fell_back: bool,
    pub error: Option<String>,
}

impl TableMigrationResult {
    pub fn new(table: &str, strategy: Strategy, status: MigrationStatus) -> Self {
        Self {
            table: table.to_string(),
            strategy,
            hot_count_before: 0,
            copied: 0,
            deleted: 0,
            status,
            fell_back: false,
            error: None,
        }
    }

    pub fn failed(table: &str, strategy: Strategy, error: impl fmt::Display) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(table, strategy, MigrationStatus::Failed)
        }
    }
}

/// Results of one migration pass over every table.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub window: MigrationWindow,
    pub results: Vec<TableMigrationResult>,
}

impl RunSummary {
    pub fn total_copied(&self) -> u64 {
        self.results.iter().map(|r| r.copied).sum()
    }

    pub fn total_deleted(&self) -> u64 {
        self.results.iter().map(|r| r.deleted).sum()
    }

    pub fn count(&self, status: MigrationStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn failed_tables(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.status == MigrationStatus::Failed)
            .map(|r| r.table.as_str())
            .collect()
    }

    /// Fixed-width table of per-table results followed by totals.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let width = self
            .results
            .iter()
            .map(|r| r.table.len())
            .max()
            .unwrap_or(5)
            .max(5);

        let _ = writeln!(
            out,
            "{:<width$}  {:<8}  {:<7}  {:>12}  {:>12}  {:>12}",
            "TABLE", "STRATEGY", "STATUS", "HOT", "COPIED", "DELETED",
        );
        for r in &self.results {
            let strategy = if r.fell_back {
                format!("{}*", r.strategy)
            } else {
                r.strategy.to_string()
            };
            let _ = writeln!(
                out,
                "{:<width$}  {:<8}  {:<7}  {:>12}  {:>12}  {:>12}",
                r.table, strategy, r.status, r.hot_count_before, r.copied, r.deleted,
            );
        }
        let _ = writeln!(
            out,
            "total: {} copied, {} deleted ({} ok, {} skipped, {} dry-run, {} failed)",
            self.total_copied(),
            self.total_deleted(),
            self.count(MigrationStatus::Ok),
            self.count(MigrationStatus::Skip),
            self.count(MigrationStatus::DryRun),
            self.count(MigrationStatus::Failed),
        );
        if self.results.iter().any(|r| r.fell_back) {
            let _ = writeln!(out, "* anti-join copy failed, simple copy used");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ok(table: &str, copied: u64) -> TableMigrationResult {
        TableMigrationResult {
            hot_count_before: copied,
            copied,
            deleted: copied,
            ..TableMigrationResult::new(table, Strategy::Simple, MigrationStatus::Ok)
        }
    }

    #[test]
    fn test_totals() {
        let summary = RunSummary {
            window: MigrationWindow::before(Utc::now()),
            results: vec![
                ok("trades", 10),
                ok("orderbooks", 5),
                TableMigrationResult::failed("liquidations", Strategy::Simple, "boom"),
            ],
        };
        assert_eq!(summary.total_copied(), 15);
        assert_eq!(summary.total_deleted(), 15);
        assert_eq!(summary.failed_tables(), vec!["liquidations"]);
        assert_eq!(summary.count(MigrationStatus::Ok), 2);
    }

    #[test]
    fn test_render_lists_every_table() {
        let mut fallback = ok("open_interest", 3);
        fallback.fell_back = true;
        let summary = RunSummary {
            window: MigrationWindow::before(Utc::now()),
            results: vec![ok("trades", 10), fallback],
        };
        let text = summary.render();
        assert!(text.starts_with("TABLE"));
        assert!(text.contains("trades"));
        assert!(text.contains("simple*"));
        assert!(text.contains("total: 13 copied, 13 deleted (2 ok, 0 skipped, 0 dry-run, 0 failed)"));
        assert!(text.contains("simple copy used"));
    }

    #[test]
    fn test_status_serializes_upper_case() {
        let json = serde_json::to_string(&MigrationStatus::DryRun).unwrap();
        assert_eq!(json, "\"DRY_RUN\"");
    }
}
