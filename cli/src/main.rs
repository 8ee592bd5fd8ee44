//! CLI for Strata
//!
//! Operator commands around the hot-to-cold migration:
//! - migrate: one migration run with verification and repair
//! - verify: cold tier integrity report
//! - repair: re-copy into empty cold tables
//! - plan: show the window a run would use
//! - config: print the effective configuration

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use strata_engine::config::EngineConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Strata - tiered market data storage", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (TOML)
    #[arg(short, long, global = true, env = "STRATA_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one hot-to-cold migration, then verify and repair
    Migrate(commands::migrate::MigrateArgs),

    /// Count rows in every cold table
    Verify(commands::verify::VerifyArgs),

    /// Re-copy recent hot rows into empty cold tables
    Repair(commands::repair::RepairArgs),

    /// Show the migration and repair windows for now
    Plan(commands::plan::PlanArgs),

    /// Print the effective configuration
    Config(commands::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = EngineConfig::load(cli.config.as_deref())?;
    let healthy = match cli.command {
        Commands::Migrate(args) => commands::migrate::run(args, config).await?,
        Commands::Verify(args) => commands::verify::run(args, config).await?,
        Commands::Repair(args) => commands::repair::run(args, config).await?,
        Commands::Plan(args) => commands::plan::run(args, config)?,
        Commands::Config(args) => commands::config::run(args, config)?,
    };

    Ok(if healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["strata", "verify", "--config", "strata.toml", "-v"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("strata.toml")));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Verify(_)));
    }
}
