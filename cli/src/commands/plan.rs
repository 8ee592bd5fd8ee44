//! Plan command implementation

use super::WindowArgs;
use crate::output;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use strata_engine::build_catalog;
use strata_engine::config::EngineConfig;
use strata_engine::migrate::{ColdMigrationPlanner, MigrationWindow};

#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub window: WindowArgs,
}

/// Print both windows and the strategy per table. No store access.
pub fn run(args: PlanArgs, mut config: EngineConfig) -> Result<bool> {
    args.window.apply(&mut config.migration);
    config.validate().context("Invalid migration options")?;

    let planner = ColdMigrationPlanner::new(config.migration.clone());
    let now = Utc::now();
    let window = planner.plan_at(now);
    let repair = planner.repair_window_at(now);

    output::info(&format!("Migration window: {}", describe(&window)));
    output::info(&format!("Repair window:    {}", describe(&repair)));
    output::info(&format!("Row cap per copy: {}", config.migration.row_cap));
    if window.dry_run {
        output::warning("Dry run is enabled in configuration");
    }

    println!();
    let catalog = build_catalog(&config)?;
    for table in catalog.tables() {
        let strategy = if table.dedup { "anti-join" } else { "simple" };
        println!(
            "  {:<20} {:<10} key ({})",
            table.name,
            strategy,
            table.natural_key.join(", ")
        );
    }
    Ok(true)
}

fn describe(window: &MigrationWindow) -> String {
    let mut parts = Vec::new();
    if let Some(since) = window.since {
        parts.push(format!("timestamp >= {}", since.to_rfc3339()));
    }
    parts.push(format!("timestamp < {}", window.cutoff.to_rfc3339()));
    if let Some(prefix) = &window.symbol_prefix {
        parts.push(format!("symbol starts with {}", prefix));
    }
    if let Some(exchange) = &window.exchange {
        parts.push(format!("exchange = {}", exchange));
    }
    if let Some(market_type) = &window.market_type {
        parts.push(format!("market_type = {}", market_type));
    }
    parts.join(", ")
}
