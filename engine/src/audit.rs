//! Audit logging for operations that remove or divert data.
//!
//! All events are emitted via `tracing` with a dedicated target so they can be
//! filtered and routed separately from the regular engine log.

use tracing::{info, warn};

const AUDIT_TARGET: &str = "strata::audit";

/// A migration run started.
pub fn migration_started(dry_run: bool, force_repair: bool, cutoff: &str) {
    info!(
        target: AUDIT_TARGET,
        event = "migration_started",
        dry_run,
        force_repair,
        cutoff = %cutoff,
    );
}

/// Rows were deleted from the hot tier after cold confirmed them.
pub fn hot_rows_deleted(table: &str, rows: u64) {
    info!(
        target: AUDIT_TARGET,
        event = "hot_rows_deleted",
        table = %table,
        rows,
    );
}

/// A batch left the retry path and went to the dead-letter file.
pub fn batch_dead_lettered(data_type: &str, rows: usize, path: &str) {
    warn!(
        target: AUDIT_TARGET,
        event = "batch_dead_lettered",
        data_type = %data_type,
        rows,
        path = %path,
    );
}

/// Log admin HTTP request (metrics, readiness, buffer state).
pub fn admin_http_request(path: &str, status: u16) {
    info!(
        target: AUDIT_TARGET,
        event = "admin_http_request",
        path = %path,
        status = %status,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_target_is_static() {
        assert_eq!(AUDIT_TARGET, "strata::audit");
    }
}
