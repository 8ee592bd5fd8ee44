//! Prometheus metrics for the storage engine

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram_vec,
    CounterVec, Encoder, Gauge, GaugeVec, HistogramVec, TextEncoder,
};

// ── Routing metrics ──────────────────────────────────────────────────────────

pub static ROUTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "strata_routed_records_total",
        "Inbound records by routing outcome",
        &["data_type", "outcome"]
    )
    .unwrap()
});

pub static UNROUTABLE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "strata_unroutable_records_total",
        "Inbound records dropped before reaching a buffer",
        &["reason"]
    )
    .unwrap()
});

// ── Buffer metrics ───────────────────────────────────────────────────────────

pub static BUFFER_DEPTH: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "strata_buffer_records",
        "Records queued or in flight per data type",
        &["data_type"]
    )
    .unwrap()
});

pub static SHED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "strata_buffer_shed_total",
        "Records refused because the buffer was at max_queue",
        &["data_type"]
    )
    .unwrap()
});

// ── Flush metrics ────────────────────────────────────────────────────────────

pub static FLUSH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "strata_flush_total",
        "Hot store flush attempts",
        &["data_type", "status"]
    )
    .unwrap()
});

pub static FLUSH_ROWS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "strata_flush_rows_total",
        "Rows written to the hot store",
        &["data_type"]
    )
    .unwrap()
});

pub static FLUSH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "strata_flush_duration_seconds",
        "Hot store flush latency",
        &["data_type"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap()
});

pub static DEAD_LETTER_ROWS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "strata_dead_letter_rows_total",
        "Rows moved to the dead-letter file after exhausting retries",
        &["data_type"]
    )
    .unwrap()
});

// ── Migration metrics ────────────────────────────────────────────────────────

pub static MIGRATION_TABLES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "strata_migration_tables_total",
        "Per-table migration results",
        &["table", "status"]
    )
    .unwrap()
});

pub static MIGRATED_ROWS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "strata_migrated_rows_total",
        "Rows copied from hot to cold",
        &["table"]
    )
    .unwrap()
});

pub static DELETED_ROWS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "strata_deleted_rows_total",
        "Rows deleted from hot after migration",
        &["table"]
    )
    .unwrap()
});

pub static DEDUP_FALLBACK_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "strata_dedup_fallback_total",
        "Anti-join copies that failed and fell back to the simple copy",
        &["table"]
    )
    .unwrap()
});

pub static INTEGRITY_SCORE: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "strata_integrity_score",
        "Fraction of cold tables holding at least one row"
    )
    .unwrap()
});

pub static REPAIR_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "strata_repair_total",
        "Repair attempts by outcome",
        &["table", "outcome"]
    )
    .unwrap()
});

/// Render all registered metrics to Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_includes_touched_metrics() {
        FLUSH_TOTAL.with_label_values(&["trade", "ok"]).inc();
        INTEGRITY_SCORE.set(0.5);
        let text = encode_metrics();
        assert!(text.contains("strata_flush_total"));
        assert!(text.contains("strata_integrity_score"));
    }
}
