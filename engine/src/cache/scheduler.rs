//! Time-based flush evaluation

use crate::cache::HotCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Re-checks every buffer on a fixed period so a quiet data type still
/// flushes once its `max_wait` has passed. Uses the same claim as the append
/// path, so the two never schedule the same buffer twice.
pub struct FlushScheduler;

impl FlushScheduler {
    pub fn spawn(
        cache: Arc<HotCache>,
        period: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(period_ms = period.as_millis() as u64, "Flush scheduler started");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let started = cache.check_all();
                        if started > 0 {
                            debug!(started, "Scheduler started flushes");
                        }
                    }
                }
            }

            info!("Flush scheduler stopped");
        })
    }
}
