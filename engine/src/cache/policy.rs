//! Per-type flush policy

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When a buffer must be flushed. Fixed per data type at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushPolicy {
    /// Max records per flush
    pub batch_size: usize,

    /// Max time a non-empty buffer may stay unflushed, in milliseconds
    pub max_wait_ms: u64,

    /// Hard cap on buffered records; reaching it forces a flush
    pub max_queue: usize,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_wait_ms: 5_000,
            max_queue: 10_000,
        }
    }
}

impl FlushPolicy {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    /// Flush is due on size, on age of a non-empty buffer, or at the queue cap.
    pub fn is_due(&self, queued: usize, since_last_flush: Duration) -> bool {
        queued >= self.batch_size
            || (queued > 0 && since_last_flush >= self.max_wait())
            || queued >= self.max_queue
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("batch_size must be greater than 0".to_string());
        }
        if self.max_wait_ms == 0 {
            return Err("max_wait_ms must be greater than 0".to_string());
        }
        if self.max_queue < self.batch_size {
            return Err(format!(
                "max_queue ({}) must be >= batch_size ({})",
                self.max_queue, self.batch_size
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(batch_size: usize, max_wait_ms: u64, max_queue: usize) -> FlushPolicy {
        FlushPolicy {
            batch_size,
            max_wait_ms,
            max_queue,
        }
    }

    #[test]
    fn test_due_on_batch_size() {
        let p = policy(3, 60_000, 100);
        assert!(!p.is_due(2, Duration::ZERO));
        assert!(p.is_due(3, Duration::ZERO));
    }

    #[test]
    fn test_due_on_timeout_only_when_non_empty() {
        let p = policy(100, 2_000, 100);
        assert!(!p.is_due(0, Duration::from_secs(10)));
        assert!(!p.is_due(1, Duration::from_millis(1_999)));
        assert!(p.is_due(1, Duration::from_secs(2)));
    }

    #[test]
    fn test_due_at_queue_cap() {
        // batch_size larger than the cap is rejected by validate, but the cap
        // still wins if it is ever reached first.
        let p = policy(500, 60_000, 200);
        assert!(p.is_due(200, Duration::ZERO));
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_validate() {
        assert!(policy(10, 1_000, 10).validate().is_ok());
        assert!(policy(0, 1_000, 10).validate().is_err());
        assert!(policy(10, 0, 10).validate().is_err());
    }
}
