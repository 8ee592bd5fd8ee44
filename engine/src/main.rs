//! Strata engine service
//!
//! Buffers inbound market data into the hot store, runs scheduled hot-to-cold
//! migrations, and serves admin endpoints. Messages arrive as NDJSON on stdin
//! unless `--no-stdin` is given (a bus adapter then feeds the channel).

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use strata_engine::{
    build_catalog,
    cache::{FlushScheduler, HotCache},
    config::EngineConfig,
    connect_store, feed,
    migrate::{ColdMigrator, MigrationScheduler, SqlTierStore},
    server::http::serve_admin,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Inbound messages buffered between the feed and the router.
const FEED_CAPACITY: usize = 10_000;

#[derive(Parser)]
#[command(name = "strata-engine")]
#[command(about = "Strata hot-cache and migration service", long_about = None)]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, env = "STRATA_CONFIG")]
    config: Option<PathBuf>,

    /// Do not read inbound messages from stdin
    #[arg(long)]
    no_stdin: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = EngineConfig::load(args.config.as_deref()).context("Load configuration")?;
    let admin_addr: SocketAddr = config
        .admin_addr
        .parse()
        .context("Invalid admin address")?;
    info!(
        hot = %config.store.hot.url(),
        cold = %config.store.cold.url(),
        "Starting Strata engine"
    );

    let gateway = connect_store(&config)
        .await
        .context("Store connection failed")?;
    let catalog = build_catalog(&config)?;
    let cache = Arc::new(HotCache::new(&config.cache, &catalog, gateway.clone())?);
    let migrator = Arc::new(ColdMigrator::new(
        Arc::new(SqlTierStore::new(gateway)),
        catalog,
        config.migration.clone(),
    ));

    let cancel = CancellationToken::new();
    let flush_task = FlushScheduler::spawn(cache.clone(), config.cache.tick(), cancel.clone());
    let migration_task =
        MigrationScheduler::spawn(migrator, config.migration.interval(), cancel.clone());

    let admin_task = {
        let cancel = cancel.clone();
        let cache = cache.clone();
        tokio::spawn(async move {
            let shutdown = async move { cancel.cancelled().await };
            if let Err(e) = serve_admin(admin_addr, cache, shutdown).await {
                error!(error = %e, "Admin HTTP server failed");
            }
        })
    };

    let (tx, rx) = mpsc::channel(FEED_CAPACITY);
    let pump_task = tokio::spawn(feed::pump(rx, cache.clone(), cancel.clone()));
    let feed_task = if args.no_stdin {
        // Keep the channel open; messages come from elsewhere.
        let cancel = cancel.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            drop(tx);
            0u64
        })
    } else {
        tokio::spawn(feed::stdin_feed(tx, cancel.clone()))
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupt received, shutting down"),
        forwarded = feed_task => {
            info!(forwarded = forwarded.unwrap_or_default(), "Inbound feed ended, shutting down");
            // Let the pump route what is still in the channel.
            if let Err(e) = pump_task.await {
                error!(error = %e, "Inbound pump failed");
            }
        }
    }

    cancel.cancel();
    let report = cache.shutdown().await;
    if !report.is_clean() {
        warn!(stranded = ?report.stranded, "Records lost at shutdown");
    }

    for (name, task) in [
        ("flush scheduler", flush_task),
        ("migration scheduler", migration_task),
        ("admin server", admin_task),
    ] {
        if let Err(e) = task.await {
            error!(task = name, error = %e, "Task failed during shutdown");
        }
    }

    info!("Strata engine stopped");
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
