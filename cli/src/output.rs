//! Output formatting for CLI commands

use colored::Colorize;
use strata_engine::migrate::{RepairStatus, TableRepair};

/// Print success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print warning message
pub fn warning(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// One repaired table, marked by outcome.
pub fn repair(table: &TableRepair) {
    let line = format!(
        "{}: {} hot rows, {} cold rows after",
        table.table.bold(),
        table.hot_rows,
        table.cold_rows_after
    );
    match table.status {
        RepairStatus::Repaired => success(&line),
        RepairStatus::StillEmpty => warning(&line),
        RepairStatus::Failed => error(&format!(
            "{} ({})",
            line,
            table.error.as_deref().unwrap_or("unknown error")
        )),
    }
}
