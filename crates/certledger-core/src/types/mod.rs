pub mod entry;
pub mod ids;
pub mod report;
pub mod stock;

pub use entry::{
    ActionKind, AuditOutcome, FailedLedgerEntry, LedgerEntry, LedgerRecord, RecoveryReport,
};
pub use ids::{BatchId, BranchCode};
pub use report::{BranchSummary, CumulativeTotal, LogFilter};
pub use stock::{
    AllocationPlan, Batch, BatchCreated, BranchStock, ClearReport, StockAmount, StockMovement,
};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

/// Current time at the precision the store keeps (microseconds)
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Render a timestamp the way the store persists it
///
/// UTC, RFC 3339, microsecond precision and a `Z` suffix: fixed width, so
/// lexicographic order on the stored text equals chronological order.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp previously written by [`format_timestamp`]
pub fn parse_timestamp(raw: &str) -> crate::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| crate::LedgerError::Serialization(format!("bad timestamp {raw:?}: {e}")))
}
