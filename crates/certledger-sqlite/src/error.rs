use certledger_core::LedgerError;
use rusqlite::ErrorCode;

/// Map a SQLite failure at the store boundary
///
/// Busy/locked means the busy timeout expired while another connection held
/// the write lock; everything else is a persistence fault.
pub(crate) fn sql_err(err: rusqlite::Error, busy_timeout_ms: u64) -> LedgerError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => LedgerError::Timeout {
            what: "SQLite write lock".into(),
            timeout_ms: busy_timeout_ms,
        },
        _ => LedgerError::Persistence(err.to_string()),
    }
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE)
    )
}
