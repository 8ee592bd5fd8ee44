//! NDJSON sink for batches that exhausted their flush attempts

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strata_shared::utils::time::now_millis;
use strata_shared::{DataType, Record};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// One line of the dead-letter file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub data_type: DataType,
    pub record: serde_json::Value,
    /// Milliseconds since Unix epoch
    pub timestamp: i64,
    pub attempts: u32,
    pub error_message: String,
}

/// Append-only dead-letter file. Writes are serialized so lines never
/// interleave.
#[derive(Debug)]
pub struct DeadLetterSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl DeadLetterSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(
        &self,
        records: &[Record],
        attempts: u32,
        error_message: &str,
    ) -> std::io::Result<()> {
        let timestamp = now_millis();
        let mut lines = String::new();
        for record in records {
            let entry = DeadLetterEntry {
                data_type: record.data_type,
                record: record.to_json(),
                timestamp,
                attempts,
                error_message: error_message.to_string(),
            };
            lines.push_str(&serde_json::to_string(&entry)?);
            lines.push('\n');
        }

        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(lines.as_bytes()).await?;
        file.flush().await
    }
}
