//! Audit Log Writer
//!
//! Every ledger operation produces exactly one [`LedgerEntry`]. The writer
//! inserts it into the ledger table inside the operation's own transaction,
//! under a savepoint. If that insert fails only the savepoint is undone: the
//! stock mutation still commits, and after commit the entry is appended to
//! the fallback file instead. A failed audit write never fails the
//! operation; it shows up in the returned [`AuditOutcome`] and in the logs.

use crate::fallback::FallbackLog;
use certledger_core::error::Result;
use certledger_core::observe;
use certledger_core::types::{AuditOutcome, FailedLedgerEntry, LedgerEntry};
use certledger_sqlite::{SqliteStockStore, StockTxn};
use std::sync::Arc;
use std::time::Duration;

const AUDIT_SAVEPOINT: &str = "ledger_audit";

/// Primary destination for ledger entries
///
/// The production implementation is [`SqliteAuditTable`]. Implementations
/// must only write through the supplied transaction.
pub trait AuditTable: Send + Sync {
    fn insert(&self, txn: &StockTxn<'_>, entry: &LedgerEntry) -> Result<i64>;
}

/// Inserts into the `ledger_entries` table of the stock store
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteAuditTable;

impl AuditTable for SqliteAuditTable {
    fn insert(&self, txn: &StockTxn<'_>, entry: &LedgerEntry) -> Result<i64> {
        txn.insert_entry(entry)
    }
}

/// Result of the in-transaction half of an audit write
///
/// Must be passed to [`AuditWriter::settle`] once the transaction has
/// committed. Dropping it instead (because the transaction rolled back)
/// discards the entry, which is correct: nothing happened to audit.
#[must_use = "settle the attempt after commit"]
#[derive(Debug)]
pub enum AuditAttempt {
    Recorded { id: i64 },
    Pending { record: FailedLedgerEntry },
}

pub struct AuditWriter {
    store: SqliteStockStore,
    table: Arc<dyn AuditTable>,
    fallback: Arc<FallbackLog>,
    timeout: Duration,
}

impl AuditWriter {
    pub fn new(
        store: SqliteStockStore,
        table: Arc<dyn AuditTable>,
        fallback: Arc<FallbackLog>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            table,
            fallback,
            timeout,
        }
    }

    pub fn fallback(&self) -> &Arc<FallbackLog> {
        &self.fallback
    }

    /// Insert `entry` inside the caller's transaction
    pub fn record_in(&self, txn: &StockTxn<'_>, entry: LedgerEntry) -> AuditAttempt {
        match txn.savepoint(AUDIT_SAVEPOINT, |t| self.table.insert(t, &entry)) {
            Ok(id) => AuditAttempt::Recorded { id },
            Err(err) => {
                tracing::warn!(
                    batch_id = %entry.batch_id,
                    action = %entry.action,
                    "Primary audit insert failed, entry will go to the fallback file: {}",
                    err
                );
                AuditAttempt::Pending {
                    record: FailedLedgerEntry::new(entry, err),
                }
            }
        }
    }

    /// Finish an attempt after the surrounding transaction committed
    pub fn settle(&self, attempt: AuditAttempt) -> AuditOutcome {
        match attempt {
            AuditAttempt::Recorded { id } => AuditOutcome::Recorded { id },
            AuditAttempt::Pending { record } => self.divert(record),
        }
    }

    /// Record `entry` in a transaction of its own
    pub fn record(&self, entry: LedgerEntry) -> AuditOutcome {
        let inserted = self.store.begin(self.timeout).and_then(|txn| {
            let id = self.table.insert(&txn, &entry)?;
            txn.commit()?;
            Ok(id)
        });

        match inserted {
            Ok(id) => AuditOutcome::Recorded { id },
            Err(err) => {
                tracing::warn!(
                    batch_id = %entry.batch_id,
                    action = %entry.action,
                    "Primary audit insert failed: {}",
                    err
                );
                self.divert(FailedLedgerEntry::new(entry, err))
            }
        }
    }

    fn divert(&self, record: FailedLedgerEntry) -> AuditOutcome {
        match self.fallback.append(&record) {
            Ok(()) => {
                observe::record_audit_fallback();
                tracing::warn!(
                    batch_id = %record.entry.batch_id,
                    action = %record.entry.action,
                    path = %self.fallback.path().display(),
                    "Audit entry written to fallback file"
                );
                AuditOutcome::Deferred {
                    path: self.fallback.path().to_path_buf(),
                }
            }
            Err(err) => {
                observe::record_audit_lost();
                tracing::error!(
                    batch_id = %record.entry.batch_id,
                    action = %record.entry.action,
                    description = %record.entry.description,
                    actor = %record.entry.actor,
                    primary_error = %record.error,
                    path = %self.fallback.path().display(),
                    "AUDIT RECORD LOST: fallback file write failed: {}",
                    err
                );
                AuditOutcome::Lost {
                    error: format!("primary: {}; fallback: {}", record.error, err),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certledger_core::types::{ActionKind, LogFilter};
    use certledger_core::{LedgerError, StoreConfig};
    use tempfile::TempDir;

    struct RejectingTable;

    impl AuditTable for RejectingTable {
        fn insert(&self, _txn: &StockTxn<'_>, _entry: &LedgerEntry) -> Result<i64> {
            Err(LedgerError::AuditWrite("ledger table unavailable".into()))
        }
    }

    fn writer(dir: &TempDir, table: Arc<dyn AuditTable>) -> AuditWriter {
        let store = SqliteStockStore::open(StoreConfig::new(dir.path().join("ledger.db"))).unwrap();
        let fallback = Arc::new(FallbackLog::new(dir.path().join("fallback.jsonl"), false));
        AuditWriter::new(store, table, fallback, Duration::from_secs(1))
    }

    fn entry() -> LedgerEntry {
        LedgerEntry::new("BATCH-1", ActionKind::Create, "Created BATCH-1", "ops")
    }

    #[test]
    fn test_record_standalone() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir, Arc::new(SqliteAuditTable));

        assert!(w.record(entry()).is_recorded());
        assert_eq!(w.store.count_logs(&LogFilter::new()).unwrap(), 1);
        assert_eq!(w.fallback().pending().unwrap(), 0);
    }

    #[test]
    fn test_record_standalone_falls_back() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir, Arc::new(RejectingTable));

        let outcome = w.record(entry());
        assert_eq!(
            outcome,
            AuditOutcome::Deferred {
                path: dir.path().join("fallback.jsonl")
            }
        );
        assert_eq!(w.fallback().pending().unwrap(), 1);
    }

    #[test]
    fn test_pending_attempt_dropped_on_rollback() {
        let dir = TempDir::new().unwrap();
        let w = writer(&dir, Arc::new(RejectingTable));

        {
            let txn = w.store.begin(Duration::from_secs(1)).unwrap();
            let attempt = w.record_in(&txn, entry());
            assert!(matches!(attempt, AuditAttempt::Pending { .. }));
            txn.rollback();
        }
        assert_eq!(w.fallback().pending().unwrap(), 0);
    }

    #[test]
    fn test_lost_when_fallback_unwritable() {
        let dir = TempDir::new().unwrap();
        // A regular file where the fallback directory should be
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();

        let store = SqliteStockStore::open(StoreConfig::new(dir.path().join("ledger.db"))).unwrap();
        let fallback = Arc::new(FallbackLog::new(blocker.join("fallback.jsonl"), false));
        let w = AuditWriter::new(store, Arc::new(RejectingTable), fallback, Duration::from_secs(1));

        let outcome = w.record(entry());
        assert!(!outcome.is_durable());
        match outcome {
            AuditOutcome::Lost { error } => assert!(error.contains("ledger table unavailable")),
            other => panic!("expected Lost, got {other:?}"),
        }
    }
}
