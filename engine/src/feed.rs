//! Inbound message feed
//!
//! The bus adapter is external; it hands the engine `InboundMessage`s over
//! an mpsc channel. `stdin_feed` is the local transport: one JSON object per
//! line, `{"topic": "...", "payload": {...}}`.

use crate::cache::{HotCache, RouteOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One message as delivered by the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: serde_json::Value,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }

    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Counts of what the pump did with each message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PumpStats {
    pub received: u64,
    pub buffered: u64,
    pub shed: u64,
    pub dropped: u64,
}

/// Route every message from `rx` into the cache until the channel closes,
/// `cancel` fires, or the cache stops accepting.
pub async fn pump(
    mut rx: mpsc::Receiver<InboundMessage>,
    cache: Arc<HotCache>,
    cancel: CancellationToken,
) -> PumpStats {
    let mut stats = PumpStats::default();
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = rx.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        stats.received += 1;
        match cache.route(&message.topic, message.payload) {
            RouteOutcome::Buffered => stats.buffered += 1,
            RouteOutcome::Shed => stats.shed += 1,
            RouteOutcome::Unroutable | RouteOutcome::Malformed => stats.dropped += 1,
            RouteOutcome::Closed => {
                stats.dropped += 1;
                break;
            }
        }
    }
    info!(
        received = stats.received,
        buffered = stats.buffered,
        shed = stats.shed,
        dropped = stats.dropped,
        "Inbound pump stopped"
    );
    stats
}

/// Read NDJSON messages from stdin into `tx`. Returns at end of input.
pub async fn stdin_feed(tx: mpsc::Sender<InboundMessage>, cancel: CancellationToken) -> u64 {
    read_feed(tokio::io::stdin(), tx, cancel).await
}

/// Read NDJSON messages from any reader. Lines that do not parse are
/// counted and skipped.
pub async fn read_feed<R>(
    reader: R,
    tx: mpsc::Sender<InboundMessage>,
    cancel: CancellationToken,
) -> u64
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut forwarded = 0u64;
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("Inbound feed reached end of input");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Inbound feed read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match InboundMessage::from_line(&line) {
            Ok(message) => {
                if tx.send(message).await.is_err() {
                    break;
                }
                forwarded += 1;
            }
            Err(e) => {
                crate::metrics::UNROUTABLE_TOTAL
                    .with_label_values(&["malformed"])
                    .inc();
                warn!(error = %e, "Skipping unparseable inbound line");
            }
        }
    }
    forwarded
}
