//! Per-type pending record queue

use crate::cache::policy::FlushPolicy;
use crate::tables::Column;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use strata_shared::{DataType, Record};
use tokio::time::Instant;

/// Result of an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Push {
    Accepted,
    /// Queued plus in-flight records already at `max_queue`
    Shed,
}

/// How much of the queue a claim may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// Only when the policy says a flush is due; up to `batch_size`
    Due,
    /// Regardless of thresholds; the whole queue
    Drain,
}

/// What happened to a batch after its store write resolved.
#[derive(Debug)]
pub enum Completion {
    Flushed,
    /// Restored at the head of the queue
    Requeued { attempts: u32 },
    /// Retries exhausted; the batch is handed back for dead-lettering
    Exhausted { batch: Vec<Record>, attempts: u32 },
}

#[derive(Debug, Clone, Serialize)]
pub struct BufferSnapshot {
    pub data_type: DataType,
    pub table: String,
    pub queued: usize,
    pub in_flight: usize,
    pub flushing: bool,
    pub consecutive_failures: u32,
    pub policy: FlushPolicy,
}

#[derive(Debug)]
struct BufferState {
    queue: VecDeque<Record>,
    in_flight: usize,
    /// Set when a batch is claimed, cleared when its write resolves
    flushing: bool,
    last_flush: Instant,
    failures: u32,
}

/// Insertion-ordered queue for one data type plus its flush guard.
///
/// All mutation happens under one short, non-async lock. At most one batch
/// is claimed at a time; producers keep appending while it is in flight.
#[derive(Debug)]
pub struct TypeBuffer {
    data_type: DataType,
    policy: FlushPolicy,
    /// Qualified hot table the batch is inserted into
    table: String,
    columns: Vec<Column>,
    state: Mutex<BufferState>,
}

impl TypeBuffer {
    pub fn new(data_type: DataType, policy: FlushPolicy, table: String, columns: Vec<Column>) -> Self {
        Self {
            data_type,
            policy,
            table,
            columns,
            state: Mutex::new(BufferState {
                queue: VecDeque::with_capacity(policy.batch_size.min(4096)),
                in_flight: 0,
                flushing: false,
                last_flush: Instant::now(),
                failures: 0,
            }),
        }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    // A panic while holding the lock cannot leave the queue half-edited, so
    // a poisoned lock is still usable.
    fn state(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append at the tail unless the buffer is full.
    pub fn push(&self, record: Record) -> Push {
        let mut state = self.state();
        if state.queue.len() + state.in_flight >= self.policy.max_queue {
            return Push::Shed;
        }
        state.queue.push_back(record);
        self.publish_depth(&state);
        Push::Accepted
    }

    /// Take a batch from the head and set the flush guard, if no flush is
    /// running and the claim mode allows it.
    pub fn try_claim(&self, now: Instant, claim: Claim) -> Option<Vec<Record>> {
        let mut state = self.state();
        if state.flushing || state.queue.is_empty() {
            return None;
        }
        let take = match claim {
            Claim::Due => {
                let elapsed = now.saturating_duration_since(state.last_flush);
                if !self.policy.is_due(state.queue.len(), elapsed) {
                    return None;
                }
                self.policy.batch_size.min(state.queue.len())
            }
            Claim::Drain => state.queue.len(),
        };
        let batch: Vec<Record> = state.queue.drain(..take).collect();
        state.in_flight = batch.len();
        state.flushing = true;
        Some(batch)
    }

    /// Release the flush guard after the store write for `batch` resolved.
    ///
    /// On failure the batch goes back to the head in its original order,
    /// unless `max_attempts` consecutive failures have been reached.
    pub fn complete(
        &self,
        batch: Vec<Record>,
        succeeded: bool,
        max_attempts: Option<u32>,
        now: Instant,
    ) -> Completion {
        let mut state = self.state();
        state.in_flight = 0;
        state.flushing = false;
        state.last_flush = now;

        let completion = if succeeded {
            state.failures = 0;
            Completion::Flushed
        } else {
            state.failures += 1;
            let attempts = state.failures;
            if max_attempts.map_or(false, |max| attempts >= max) {
                state.failures = 0;
                Completion::Exhausted { batch, attempts }
            } else {
                for record in batch.into_iter().rev() {
                    state.queue.push_front(record);
                }
                Completion::Requeued { attempts }
            }
        };
        self.publish_depth(&state);
        completion
    }

    pub fn is_flushing(&self) -> bool {
        self.state().flushing
    }

    pub fn queued(&self) -> usize {
        self.state().queue.len()
    }

    /// Remove everything still queued. Used once shutdown has given up.
    pub fn take_remaining(&self) -> Vec<Record> {
        let mut state = self.state();
        let remaining = state.queue.drain(..).collect();
        self.publish_depth(&state);
        remaining
    }

    pub fn snapshot(&self) -> BufferSnapshot {
        let state = self.state();
        BufferSnapshot {
            data_type: self.data_type,
            table: self.table.clone(),
            queued: state.queue.len(),
            in_flight: state.in_flight,
            flushing: state.flushing,
            consecutive_failures: state.failures,
            policy: self.policy,
        }
    }

    fn publish_depth(&self, state: &BufferState) {
        crate::metrics::BUFFER_DEPTH
            .with_label_values(&[self.data_type.as_str()])
            .set((state.queue.len() + state.in_flight) as f64);
    }
}
