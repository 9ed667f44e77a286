use certledger_core::error::{LedgerError, Result};
use certledger_core::observe;
use certledger_sqlite::SqliteStockStore;
use chrono::{DateTime, Duration, Utc};

/// Deletes ledger entries older than the retention horizon
///
/// The only deletion path for ledger entries. It is never called by ledger
/// operations and selects rows by timestamp alone.
#[derive(Clone)]
pub struct RetentionCleaner {
    store: SqliteStockStore,
    retention_days: u32,
}

impl RetentionCleaner {
    pub fn new(store: SqliteStockStore, retention_days: u32) -> Self {
        Self {
            store,
            retention_days,
        }
    }

    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    /// Entries strictly older than this are eligible for deletion
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.retention_days))
    }

    /// Delete entries older than `retention_days` before `now`
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        if self.retention_days == 0 {
            return Err(LedgerError::Config("retention_days must be at least 1".into()));
        }

        let cutoff = self.cutoff(now);
        let deleted = self.store.delete_entries_before(&cutoff)?;

        observe::record_retention(deleted);
        tracing::info!(
            deleted,
            retention_days = self.retention_days,
            cutoff = %cutoff,
            "Purged expired ledger entries"
        );
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certledger_core::types::{ActionKind, LedgerEntry, LogFilter};
    use certledger_core::StoreConfig;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_purge_by_age() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStockStore::open(StoreConfig::new(dir.path().join("ledger.db"))).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();

        let txn = store.begin(std::time::Duration::from_secs(1)).unwrap();
        for days_ago in [1, 89, 91, 400] {
            let entry = LedgerEntry::new("BATCH-1", ActionKind::Print, "printed", "ops")
                .with_timestamp(now - Duration::days(days_ago));
            txn.insert_entry(&entry).unwrap();
        }
        txn.commit().unwrap();

        let cleaner = RetentionCleaner::new(store.clone(), 90);
        assert_eq!(cleaner.purge_expired(now).unwrap(), 2);
        assert_eq!(store.count_logs(&LogFilter::new()).unwrap(), 2);
        assert_eq!(cleaner.purge_expired(now).unwrap(), 0);
    }

    #[test]
    fn test_zero_retention_refused() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStockStore::open(StoreConfig::new(dir.path().join("ledger.db"))).unwrap();
        assert!(RetentionCleaner::new(store, 0).purge_expired(Utc::now()).is_err());
    }
}
