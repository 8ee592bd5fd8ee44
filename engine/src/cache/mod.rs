//! Hot cache: per-type write buffering in front of the hot store
//!
//! Inbound records are routed by topic into one [`TypeBuffer`] per data
//! type. Every append re-evaluates that buffer's [`FlushPolicy`]; the
//! [`FlushScheduler`] re-evaluates all of them on a tick so quiet types
//! still flush on their timeout. A due buffer hands one batch to a tracked
//! flush task, which renders it with [`BatchSqlBuilder`] and writes it to
//! the hot tier. Failed batches go back to the head of their queue.

pub mod buffer;
pub mod dead_letter;
pub mod policy;
pub mod router;
pub mod scheduler;

pub use buffer::{BufferSnapshot, Claim, Completion, Push, TypeBuffer};
pub use dead_letter::{DeadLetterEntry, DeadLetterSink};
pub use policy::FlushPolicy;
pub use router::{resolve_topic, TopicInfo};
pub use scheduler::FlushScheduler;

use crate::config::CacheConfig;
use crate::error::ConfigError;
use crate::metrics;
use crate::sql::BatchSqlBuilder;
use crate::storage::{StoreGateway, Tier};
use crate::tables::Catalog;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strata_shared::{DataType, Record};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Buffered,
    /// Buffer full; the record was refused
    Shed,
    /// Topic matched no data type
    Unroutable,
    /// Payload was not a JSON object
    Malformed,
    /// Shutdown has begun
    Closed,
}

impl RouteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteOutcome::Buffered => "buffered",
            RouteOutcome::Shed => "shed",
            RouteOutcome::Unroutable => "unroutable",
            RouteOutcome::Malformed => "malformed",
            RouteOutcome::Closed => "closed",
        }
    }
}

/// Outcome of [`HotCache::shutdown`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShutdownReport {
    /// Rows written by the final forced flush
    pub drained_rows: usize,
    /// Rows written to the dead-letter file during shutdown
    pub dead_lettered_rows: usize,
    /// Rows that could not be persisted anywhere
    pub stranded: BTreeMap<DataType, usize>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.stranded.is_empty()
    }
}

struct DeadLetter {
    max_attempts: u32,
    sink: DeadLetterSink,
}

/// Registry of per-type buffers plus the flush machinery.
pub struct HotCache {
    buffers: BTreeMap<DataType, Arc<TypeBuffer>>,
    gateway: Arc<dyn StoreGateway>,
    dead_letter: Option<DeadLetter>,
    tasks: TaskTracker,
    accepting: AtomicBool,
}

impl HotCache {
    /// One buffer per data type, targeting its catalog table in the hot tier.
    pub fn new(
        config: &CacheConfig,
        catalog: &Catalog,
        gateway: Arc<dyn StoreGateway>,
    ) -> Result<Self, ConfigError> {
        let mut buffers = BTreeMap::new();
        for data_type in DataType::ALL {
            let spec = catalog
                .for_type(data_type)
                .ok_or_else(|| ConfigError::UnknownTable(data_type.table().to_string()))?;
            let table = gateway.table_ref(Tier::Hot, &spec.name, Tier::Hot);
            let buffer = TypeBuffer::new(
                data_type,
                config.policy(data_type),
                table,
                spec.columns.clone(),
            );
            buffers.insert(data_type, Arc::new(buffer));
        }

        let dead_letter = config.dead_letter.max_attempts.map(|max_attempts| DeadLetter {
            max_attempts,
            sink: DeadLetterSink::new(config.dead_letter.path.clone()),
        });

        Ok(Self {
            buffers,
            gateway,
            dead_letter,
            tasks: TaskTracker::new(),
            accepting: AtomicBool::new(true),
        })
    }

    pub fn buffer(&self, data_type: DataType) -> Option<&Arc<TypeBuffer>> {
        self.buffers.get(&data_type)
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Route one inbound message. Never blocks on I/O; a due flush is
    /// spawned on the current runtime.
    pub fn route(self: &Arc<Self>, topic: &str, payload: serde_json::Value) -> RouteOutcome {
        if !self.is_accepting() {
            return RouteOutcome::Closed;
        }

        let Some(info) = resolve_topic(topic) else {
            metrics::UNROUTABLE_TOTAL.with_label_values(&["unknown_topic"]).inc();
            warn!(topic, "Dropping record for unrecognized topic");
            return RouteOutcome::Unroutable;
        };

        let record = match Record::from_json(info.data_type, payload) {
            Ok(record) => record,
            Err(e) => {
                metrics::UNROUTABLE_TOTAL.with_label_values(&["malformed"]).inc();
                warn!(topic, error = %e, "Dropping malformed record");
                return RouteOutcome::Malformed;
            }
        };

        self.append(enrich(record, &info))
    }

    /// Append an already-typed record and evaluate its buffer's policy.
    pub fn append(self: &Arc<Self>, record: Record) -> RouteOutcome {
        if !self.is_accepting() {
            return RouteOutcome::Closed;
        }
        let data_type = record.data_type;
        let Some(buffer) = self.buffers.get(&data_type) else {
            return RouteOutcome::Unroutable;
        };

        let outcome = match buffer.push(record) {
            Push::Shed => {
                metrics::SHED_TOTAL.with_label_values(&[data_type.as_str()]).inc();
                debug!(data_type = %data_type, "Buffer full, record shed");
                // A full buffer is always due.
                self.schedule(buffer, Claim::Due);
                RouteOutcome::Shed
            }
            Push::Accepted => {
                self.schedule(buffer, Claim::Due);
                RouteOutcome::Buffered
            }
        };
        metrics::ROUTED_TOTAL
            .with_label_values(&[data_type.as_str(), outcome.as_str()])
            .inc();
        outcome
    }

    /// Re-evaluate every buffer's flush condition. Returns how many flushes
    /// were started.
    pub fn check_all(self: &Arc<Self>) -> usize {
        self.buffers
            .values()
            .filter(|buffer| self.schedule(buffer, Claim::Due))
            .count()
    }

    /// Claim a batch and spawn its flush. The claim sets the buffer's flush
    /// guard, so a second caller finds nothing to do.
    fn schedule(self: &Arc<Self>, buffer: &Arc<TypeBuffer>, claim: Claim) -> bool {
        let Some(batch) = buffer.try_claim(Instant::now(), claim) else {
            return false;
        };
        let cache = Arc::clone(self);
        let buffer = Arc::clone(buffer);
        self.tasks.spawn(async move {
            cache.flush(buffer, batch).await;
        });
        true
    }

    /// Write one claimed batch and release the guard. Returns whether the
    /// store accepted it.
    async fn flush(self: Arc<Self>, buffer: Arc<TypeBuffer>, batch: Vec<Record>) -> bool {
        let data_type = buffer.data_type();
        let label = data_type.as_str();
        let rows = batch.len();
        let start = Instant::now();

        let result = match BatchSqlBuilder::build(buffer.table(), buffer.columns(), &batch) {
            Some(statement) => self
                .gateway
                .execute(Tier::Hot, &statement.sql)
                .await
                .map(|()| statement.rows),
            // Nothing survived projection; the batch is consumed.
            None => Ok(0),
        };

        let error = match &result {
            Ok(written) => {
                metrics::FLUSH_TOTAL.with_label_values(&[label, "ok"]).inc();
                metrics::FLUSH_ROWS
                    .with_label_values(&[label])
                    .inc_by(*written as f64);
                metrics::FLUSH_DURATION
                    .with_label_values(&[label])
                    .observe(start.elapsed().as_secs_f64());
                debug!(data_type = label, rows = written, "Flushed batch to hot store");
                None
            }
            Err(e) => {
                metrics::FLUSH_TOTAL.with_label_values(&[label, "error"]).inc();
                Some(e.to_string())
            }
        };

        let max_attempts = self.dead_letter.as_ref().map(|d| d.max_attempts);
        match buffer.complete(batch, error.is_none(), max_attempts, Instant::now()) {
            Completion::Flushed => {
                // Backlog beyond one batch goes out right away.
                self.schedule(&buffer, Claim::Due);
                true
            }
            Completion::Requeued { attempts } => {
                warn!(
                    data_type = label,
                    rows,
                    attempts,
                    error = error.as_deref().unwrap_or_default(),
                    "Flush failed, batch restored to head of queue"
                );
                false
            }
            Completion::Exhausted { batch, attempts } => {
                let reason = error.unwrap_or_default();
                self.send_to_dead_letter(data_type, &batch, attempts, &reason).await;
                false
            }
        }
    }

    async fn send_to_dead_letter(
        &self,
        data_type: DataType,
        batch: &[Record],
        attempts: u32,
        reason: &str,
    ) -> bool {
        let Some(dead_letter) = &self.dead_letter else {
            return false;
        };
        match dead_letter.sink.write(batch, attempts, reason).await {
            Ok(()) => {
                metrics::DEAD_LETTER_ROWS
                    .with_label_values(&[data_type.as_str()])
                    .inc_by(batch.len() as f64);
                crate::audit::batch_dead_lettered(
                    data_type.as_str(),
                    batch.len(),
                    &dead_letter.sink.path().display().to_string(),
                );
                debug!(data_type = %data_type, attempts, "Dead-letter write complete");
                true
            }
            Err(e) => {
                error!(
                    data_type = %data_type,
                    rows = batch.len(),
                    error = %e,
                    "Dead-letter write failed, records dropped"
                );
                false
            }
        }
    }

    /// Wait until no flush task is running.
    pub async fn wait_idle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    pub fn snapshot(&self) -> Vec<BufferSnapshot> {
        self.buffers.values().map(|b| b.snapshot()).collect()
    }

    /// Stop accepting records, let in-flight flushes finish, then force one
    /// flush of everything still queued in every buffer.
    pub async fn shutdown(self: &Arc<Self>) -> ShutdownReport {
        self.accepting.store(false, Ordering::Release);
        self.wait_idle().await;

        let mut drains = JoinSet::new();
        for buffer in self.buffers.values() {
            if let Some(batch) = buffer.try_claim(Instant::now(), Claim::Drain) {
                let cache = Arc::clone(self);
                let buffer = Arc::clone(buffer);
                let rows = batch.len();
                drains.spawn(async move { (cache.flush(buffer, batch).await, rows) });
            }
        }

        let mut report = ShutdownReport::default();
        while let Some(joined) = drains.join_next().await {
            match joined {
                Ok((true, rows)) => report.drained_rows += rows,
                Ok((false, _)) => {}
                Err(e) => error!(error = %e, "Shutdown flush task failed"),
            }
        }
        // Rescheduled follow-ups from the drain flushes, if any.
        self.wait_idle().await;

        for buffer in self.buffers.values() {
            let remaining = buffer.take_remaining();
            if remaining.is_empty() {
                continue;
            }
            let data_type = buffer.data_type();
            let attempts = buffer.snapshot().consecutive_failures;
            if self
                .send_to_dead_letter(data_type, &remaining, attempts, "unflushed at shutdown")
                .await
            {
                report.dead_lettered_rows += remaining.len();
            } else {
                error!(data_type = %data_type, rows = remaining.len(), "Records stranded at shutdown");
                report.stranded.insert(data_type, remaining.len());
            }
        }

        info!(
            drained = report.drained_rows,
            dead_lettered = report.dead_lettered_rows,
            stranded = report.stranded.values().sum::<usize>(),
            "Hot cache shut down"
        );
        report
    }
}

/// Fill routing fields from the topic when the payload lacks them.
fn enrich(mut record: Record, info: &TopicInfo) -> Record {
    for (field, value) in [
        ("exchange", &info.exchange),
        ("market_type", &info.market_type),
        ("symbol", &info.symbol),
    ] {
        if let Some(value) = value {
            record = record.with_default(field, value.as_str());
        }
    }
    record
}
