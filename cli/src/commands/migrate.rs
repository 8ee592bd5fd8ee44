//! Migrate command implementation

use super::{migrator, print_integrity, WindowArgs};
use crate::output;
use anyhow::{Context, Result};
use clap::Args;
use strata_engine::config::EngineConfig;
use strata_engine::migrate::{MigrationReport, RunOptions};

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Count eligible rows without copying or deleting
    #[arg(long)]
    pub dry_run: bool,

    /// Skip migration; verify and repair only
    #[arg(long)]
    pub force_repair: bool,

    #[command(flatten)]
    pub window: WindowArgs,

    /// Print the full report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Returns false when cold tables are still empty after repair.
pub async fn run(args: MigrateArgs, mut config: EngineConfig) -> Result<bool> {
    args.window.apply(&mut config.migration);
    config.validate().context("Invalid migration options")?;

    let migrator = migrator(&config).await?;
    let report = migrator
        .run(RunOptions {
            dry_run: args.dry_run,
            force_repair: args.force_repair,
        })
        .await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let order: Vec<String> = migrator
            .catalog()
            .tables()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        print_report(&report, &order);
    }

    Ok(!report.requires_operator())
}

fn print_report(report: &MigrationReport, order: &[String]) {
    match &report.summary {
        Some(summary) => {
            let window = &summary.window;
            output::info(&format!(
                "Window: rows before {}{}",
                window.cutoff.to_rfc3339(),
                if window.dry_run { " (dry run)" } else { "" }
            ));
            println!();
            print!("{}", summary.render());
            for table in summary.failed_tables() {
                let reason = summary
                    .results
                    .iter()
                    .find(|r| r.table == table)
                    .and_then(|r| r.error.as_deref())
                    .unwrap_or("unknown error");
                output::error(&format!("{}: {}", table, reason));
            }
        }
        None => output::info("Forced repair, migration skipped"),
    }

    println!();
    output::info("Cold tier:");
    print_integrity(&report.integrity, order);

    if let Some(repair) = &report.repair {
        println!();
        output::info(&format!(
            "Repair window: {} to {}",
            repair
                .window
                .since
                .map(|s| s.to_rfc3339())
                .unwrap_or_default(),
            repair.window.cutoff.to_rfc3339()
        ));
        for table in &repair.tables {
            output::repair(table);
        }
        println!();
        output::info("Cold tier after repair:");
        print_integrity(&report.final_integrity, order);
    }

    if report.requires_operator() {
        output::error(&format!(
            "Empty cold tables need attention: {}",
            report.final_integrity.empty_tables.join(", ")
        ));
    }
}
