//! Repair command implementation

use super::migrator;
use crate::output;
use anyhow::{bail, Result};
use chrono::Utc;
use clap::Args;
use strata_engine::config::EngineConfig;

#[derive(Args, Debug)]
pub struct RepairArgs {
    /// Tables to repair (default: every empty cold table)
    pub tables: Vec<String>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Returns false when a table selected for repair is still empty.
pub async fn run(args: RepairArgs, config: EngineConfig) -> Result<bool> {
    let migrator = migrator(&config).await?;
    for name in &args.tables {
        if migrator.catalog().get(name).is_none() {
            bail!("Unknown table: {}", name);
        }
    }

    let integrity = migrator.verify().await;
    let selected: Vec<String> = if args.tables.is_empty() {
        integrity.empty_tables.clone()
    } else {
        // Repair is for empty tables only; it never deduplicates.
        args.tables
            .iter()
            .filter(|name| {
                let empty = integrity.empty_tables.contains(name);
                if !empty && !args.json {
                    output::info(&format!("{}: cold already has rows, skipped", name));
                }
                empty
            })
            .cloned()
            .collect()
    };

    if selected.is_empty() {
        if !args.json {
            output::success("Nothing to repair");
        }
        return Ok(true);
    }

    let report = migrator.repair_at(&selected, Utc::now()).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for table in &report.tables {
            output::repair(table);
        }
    }

    Ok(report.unrepaired().is_empty())
}
