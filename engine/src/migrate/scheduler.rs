//! Periodic migration runs inside the engine service

use crate::migrate::{ColdMigrator, RunOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs [`ColdMigrator`] every `interval` until cancelled.
///
/// Cancellation is only observed between runs, so awaiting the handle after
/// cancelling waits for an in-flight run to finish.
pub struct MigrationScheduler;

impl MigrationScheduler {
    pub fn spawn(
        migrator: Arc<ColdMigrator>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = interval.as_secs(), "Migration scheduler started");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let report = migrator.run(RunOptions::default()).await;
                if report.requires_operator() {
                    warn!(
                        tables = ?report.final_integrity.empty_tables,
                        "Scheduled migration left empty cold tables"
                    );
                }
            }

            info!("Migration scheduler stopped");
        })
    }
}
