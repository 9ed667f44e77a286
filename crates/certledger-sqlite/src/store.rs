use certledger_core::error::{LedgerError, Result};
use certledger_core::types::{
    Batch, BranchStock, BranchSummary, CumulativeTotal, LedgerRecord, LogFilter,
};
use certledger_core::StoreConfig;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::sql_err;
use crate::queries;
use crate::read_pool::SqliteReadPool;
use crate::schema;
use crate::txn::StockTxn;

/// SQLite-backed stock store
///
/// One writer connection serialized behind a mutex, plus an optional pool
/// of read-only connections for reporting. Clones share both.
#[derive(Clone)]
pub struct SqliteStockStore {
    writer: Arc<Mutex<Connection>>,
    read_pool: Option<Arc<SqliteReadPool>>,
    config: StoreConfig,
}

impl SqliteStockStore {
    /// Open (creating if needed) the database and bring its schema current
    pub fn open(config: StoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let busy = config.busy_timeout_ms;
        let mut conn = Connection::open_with_flags(
            &config.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|e| sql_err(e, busy))?;

        Self::configure_connection(&conn, &config)?;
        let version = schema::migrate(&mut conn)?;

        let read_pool = if config.read_pool.enabled {
            let pool = SqliteReadPool::new(&config.path, &config.read_pool, busy)?;
            Some(Arc::new(pool))
        } else {
            None
        };

        tracing::info!(
            path = %config.path.display(),
            schema_version = version,
            read_pool = read_pool.as_ref().map(|p| p.pool_size()).unwrap_or(0),
            "Opened stock store"
        );

        Ok(Self {
            writer: Arc::new(Mutex::new(conn)),
            read_pool,
            config,
        })
    }

    fn configure_connection(conn: &Connection, cfg: &StoreConfig) -> Result<()> {
        let config_err = |e: rusqlite::Error| LedgerError::Config(e.to_string());

        if cfg.wal_mode {
            // journal_mode returns the resulting mode as a row
            let _mode: String = conn
                .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
                .map_err(config_err)?;
        }

        conn.pragma_update(None, "synchronous", cfg.synchronous.as_pragma())
            .map_err(config_err)?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(config_err)?;
        conn.pragma_update(None, "cache_size", cfg.cache_size)
            .map_err(config_err)?;
        conn.busy_timeout(Duration::from_millis(cfg.busy_timeout_ms))
            .map_err(config_err)?;

        Ok(())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub(crate) fn busy_timeout_ms(&self) -> u64 {
        self.config.busy_timeout_ms
    }

    /// Begin a write transaction
    ///
    /// Waits at most `timeout` for the writer connection, then issues
    /// `BEGIN IMMEDIATE` so the SQLite write lock is held from the start.
    pub fn begin(&self, timeout: Duration) -> Result<StockTxn<'_>> {
        let guard = self
            .writer
            .try_lock_for(timeout)
            .ok_or_else(|| LedgerError::Timeout {
                what: "writer connection".into(),
                timeout_ms: timeout.as_millis() as u64,
            })?;
        StockTxn::begin(guard, self.busy_timeout_ms())
    }

    /// Run a read-only query against committed state
    ///
    /// Uses the read pool when enabled, otherwise the writer connection.
    pub fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let busy = self.busy_timeout_ms();
        match &self.read_pool {
            Some(pool) => {
                let conn = pool.acquire()?;
                f(conn.connection()).map_err(|e| sql_err(e, busy))
            }
            None => {
                let conn = self.writer.lock();
                f(&conn).map_err(|e| sql_err(e, busy))
            }
        }
    }

    pub fn read_pool(&self) -> Option<&SqliteReadPool> {
        self.read_pool.as_deref()
    }

    pub fn schema_version(&self) -> Result<u32> {
        let conn = self.writer.lock();
        schema::current_version(&conn)
    }

    pub fn get_batch(&self, batch_id: &str) -> Result<Option<Batch>> {
        self.read(|conn| queries::get_batch(conn, batch_id))
    }

    pub fn list_batches(&self) -> Result<Vec<Batch>> {
        self.read(queries::list_batches)
    }

    /// Stock rows of one batch, ordered by branch
    pub fn batch_stock(&self, batch_id: &str) -> Result<Vec<BranchStock>> {
        self.read(|conn| queries::stock_for_batch(conn, batch_id))
    }

    pub fn stock(&self, batch_id: &str, branch: &str) -> Result<Option<BranchStock>> {
        self.read(|conn| queries::get_stock(conn, batch_id, branch))
    }

    pub fn all_stock(&self) -> Result<Vec<BranchStock>> {
        self.read(queries::all_stock)
    }

    pub fn summary_by_branch(&self) -> Result<Vec<BranchSummary>> {
        self.read(queries::summary_by_branch)
    }

    pub fn cumulative_totals(&self) -> Result<Vec<CumulativeTotal>> {
        self.read(queries::cumulative_totals)
    }

    pub fn query_logs(&self, filter: &LogFilter) -> Result<Vec<LedgerRecord>> {
        self.read(|conn| queries::query_logs(conn, filter))
    }

    pub fn count_logs(&self, filter: &LogFilter) -> Result<usize> {
        self.read(|conn| queries::count_logs(conn, filter))
    }

    /// Record which region a branch belongs to (used by log filtering)
    pub fn set_branch_region(&self, branch: &str, region: &str) -> Result<()> {
        let conn = self.writer.lock();
        queries::upsert_branch_region(&conn, branch, region)
            .map_err(|e| sql_err(e, self.busy_timeout_ms()))
    }

    /// Delete ledger entries created strictly before `cutoff`
    pub fn delete_entries_before(&self, cutoff: &DateTime<Utc>) -> Result<usize> {
        let conn = self.writer.lock();
        queries::delete_entries_before(&conn, cutoff)
            .map_err(|e| sql_err(e, self.busy_timeout_ms()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certledger_core::types::{ActionKind, LedgerEntry, StockAmount};
    use certledger_core::ReadPoolConfig;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> SqliteStockStore {
        SqliteStockStore::open(StoreConfig::new(dir.path().join("data").join("ledger.db")))
            .unwrap()
    }

    #[test]
    fn test_open_creates_parent_and_schema() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        assert!(store.path().exists());
        assert_eq!(store.schema_version().unwrap(), schema::SCHEMA_VERSION);
        assert!(store.list_batches().unwrap().is_empty());
    }

    #[test]
    fn test_committed_writes_visible_to_readers() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        let now = Utc::now();

        let txn = store.begin(Duration::from_secs(1)).unwrap();
        txn.insert_batch("B-1", &now).unwrap();
        txn.write_stock("B-1", "SND", &StockAmount::new(10, 2), &now)
            .unwrap();
        txn.commit().unwrap();

        let rows = store.batch_stock("B-1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, StockAmount::new(10, 2));
        assert!(store.get_batch("B-1").unwrap().is_some());
    }

    #[test]
    fn test_dropped_txn_leaves_no_trace() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        {
            let txn = store.begin(Duration::from_secs(1)).unwrap();
            txn.insert_batch("B-1", &Utc::now()).unwrap();
        }
        assert!(store.get_batch("B-1").unwrap().is_none());
    }

    #[test]
    fn test_begin_times_out_while_writer_busy() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        let _txn = store.begin(Duration::from_secs(1)).unwrap();

        let other = store.clone();
        let result = std::thread::spawn(move || {
            other.begin(Duration::from_millis(20)).map(|_| ()).unwrap_err()
        })
        .join()
        .unwrap();
        assert!(matches!(result, LedgerError::Timeout { timeout_ms: 20, .. }));
    }

    #[test]
    fn test_reads_without_pool_use_writer() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(dir.path().join("ledger.db"))
            .with_read_pool(ReadPoolConfig::disabled());
        let store = SqliteStockStore::open(config).unwrap();
        assert!(store.read_pool().is_none());
        assert_eq!(store.count_logs(&LogFilter::new()).unwrap(), 0);
    }

    #[test]
    fn test_retention_delete() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        let old = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let recent = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();

        let txn = store.begin(Duration::from_secs(1)).unwrap();
        for ts in [old, recent] {
            let entry =
                LedgerEntry::new("B-1", ActionKind::Create, "Created", "ops").with_timestamp(ts);
            txn.insert_entry(&entry).unwrap();
        }
        txn.commit().unwrap();

        let cutoff = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(store.delete_entries_before(&cutoff).unwrap(), 1);
        assert_eq!(store.count_logs(&LogFilter::new()).unwrap(), 1);
    }
}
