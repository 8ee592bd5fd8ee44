//! Verify command implementation

use super::{migrator, print_integrity};
use anyhow::Result;
use clap::Args;
use strata_engine::config::EngineConfig;

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Returns false when any cold table is empty.
pub async fn run(args: VerifyArgs, config: EngineConfig) -> Result<bool> {
    let migrator = migrator(&config).await?;
    let report = migrator.verify().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let order: Vec<String> = migrator
            .catalog()
            .tables()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        print_integrity(&report, &order);
    }

    Ok(report.is_complete())
}
