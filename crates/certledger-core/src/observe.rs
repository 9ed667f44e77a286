//! Optional metrics instrumentation for the ledger.
//!
//! When the `observe` feature is enabled, ledger operations emit counters
//! and histograms via the [`metrics`] crate. A downstream application must
//! install a metrics recorder to collect the data.
//!
//! When the feature is **not** enabled every function in this module is a
//! zero-cost no-op.

use std::time::Duration;

/// Record a finished ledger operation.
///
/// - `certledger.operation.total` – counter with `op` and `outcome` labels
/// - `certledger.operation.duration_seconds` – histogram with `op` label
#[inline]
pub fn record_operation(op: &'static str, outcome: &'static str, duration: Duration) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("certledger.operation.total", "op" => op, "outcome" => outcome)
            .increment(1);
        metrics::histogram!("certledger.operation.duration_seconds", "op" => op)
            .record(duration.as_secs_f64());
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (op, outcome, duration);
    }
}

/// Record how long row lock acquisition took.
///
/// - `certledger.lock.wait_duration_seconds` – histogram
#[inline]
pub fn record_lock_wait(duration: Duration) {
    #[cfg(feature = "observe")]
    {
        metrics::histogram!("certledger.lock.wait_duration_seconds").record(duration.as_secs_f64());
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = duration;
    }
}

/// Record an audit entry diverted to the fallback file.
///
/// - `certledger.audit.fallback_total` – counter
#[inline]
pub fn record_audit_fallback() {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("certledger.audit.fallback_total").increment(1);
    }
}

/// Record an audit entry lost entirely (primary and fallback both failed).
///
/// - `certledger.audit.lost_total` – counter
#[inline]
pub fn record_audit_lost() {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("certledger.audit.lost_total").increment(1);
    }
}

/// Record the result of a recovery pass.
///
/// - `certledger.recovery.entries_total` – counter with `outcome` label
#[inline]
pub fn record_recovery(recovered: usize, failed: usize) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("certledger.recovery.entries_total", "outcome" => "recovered")
            .increment(recovered as u64);
        metrics::counter!("certledger.recovery.entries_total", "outcome" => "failed")
            .increment(failed as u64);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (recovered, failed);
    }
}

/// Record ledger entries removed by retention cleanup.
///
/// - `certledger.retention.deleted_total` – counter
#[inline]
pub fn record_retention(deleted: usize) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("certledger.retention.deleted_total").increment(deleted as u64);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = deleted;
    }
}
