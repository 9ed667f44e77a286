use certledger_core::error::{LedgerError, Result};
use certledger_core::types::{BranchStock, LedgerEntry, StockAmount};
use chrono::{DateTime, Utc};
use parking_lot::MutexGuard;
use rusqlite::Connection;

use crate::error::{is_unique_violation, sql_err};
use crate::queries;

/// One write transaction on the stock store
///
/// Opened with `BEGIN IMMEDIATE`, so the SQLite write lock is held for the
/// whole lifetime. Dropping without [`commit`](Self::commit) rolls back.
pub struct StockTxn<'a> {
    conn: MutexGuard<'a, Connection>,
    busy_timeout_ms: u64,
    in_txn: bool,
}

impl<'a> StockTxn<'a> {
    pub(crate) fn begin(conn: MutexGuard<'a, Connection>, busy_timeout_ms: u64) -> Result<Self> {
        conn.execute_batch("BEGIN IMMEDIATE TRANSACTION")
            .map_err(|e| sql_err(e, busy_timeout_ms))?;

        Ok(Self {
            conn,
            busy_timeout_ms,
            in_txn: true,
        })
    }

    fn map(&self, err: rusqlite::Error) -> LedgerError {
        sql_err(err, self.busy_timeout_ms)
    }

    /// Raw connection for statements not covered here
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn batch_exists(&self, batch_id: &str) -> Result<bool> {
        queries::batch_exists(&self.conn, batch_id).map_err(|e| self.map(e))
    }

    /// Insert a batch row; an existing id is `DuplicateEntry`
    pub fn insert_batch(&self, batch_id: &str, created_at: &DateTime<Utc>) -> Result<()> {
        queries::insert_batch(&self.conn, batch_id, created_at).map_err(|e| {
            if is_unique_violation(&e) {
                LedgerError::DuplicateEntry(format!("batch {batch_id} already exists"))
            } else {
                self.map(e)
            }
        })
    }

    pub fn stock_row(&self, batch_id: &str, branch: &str) -> Result<Option<BranchStock>> {
        queries::get_stock(&self.conn, batch_id, branch).map_err(|e| self.map(e))
    }

    /// Insert or overwrite the counters of one stock row
    pub fn write_stock(
        &self,
        batch_id: &str,
        branch: &str,
        amount: &StockAmount,
        updated_at: &DateTime<Utc>,
    ) -> Result<()> {
        queries::put_stock(&self.conn, batch_id, branch, amount, updated_at)
            .map_err(|e| self.map(e))
    }

    pub fn all_stock(&self) -> Result<Vec<BranchStock>> {
        queries::all_stock(&self.conn).map_err(|e| self.map(e))
    }

    pub fn count_batches(&self) -> Result<usize> {
        self.conn
            .query_row("SELECT COUNT(*) FROM batches", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(|e| self.map(e))
    }

    /// Delete every stock row and batch. Returns `(stock_rows, batches)`.
    pub fn delete_all(&self) -> Result<(usize, usize)> {
        queries::delete_all_batches(&self.conn).map_err(|e| self.map(e))
    }

    /// Append a ledger entry and return its id
    pub fn insert_entry(&self, entry: &LedgerEntry) -> Result<i64> {
        queries::insert_ledger_entry(&self.conn, entry).map_err(|e| self.map(e))
    }

    /// Run `f` inside a named savepoint
    ///
    /// On error only the work done by `f` is undone; the enclosing
    /// transaction stays open and usable.
    pub fn savepoint<T, F>(&self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        self.conn
            .execute_batch(&format!("SAVEPOINT {name}"))
            .map_err(|e| self.map(e))?;

        match f(self) {
            Ok(value) => {
                self.conn
                    .execute_batch(&format!("RELEASE {name}"))
                    .map_err(|e| self.map(e))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(undo) = self
                    .conn
                    .execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"))
                {
                    tracing::warn!(savepoint = name, "Savepoint rollback failed: {}", undo);
                }
                Err(err)
            }
        }
    }

    pub fn commit(mut self) -> Result<()> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| sql_err(e, self.busy_timeout_ms))?;
        self.in_txn = false;
        Ok(())
    }

    pub fn rollback(mut self) {
        if self.in_txn {
            let _ = self.conn.execute_batch("ROLLBACK");
            self.in_txn = false;
        }
    }
}

impl Drop for StockTxn<'_> {
    fn drop(&mut self) {
        if self.in_txn {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!("Rollback on drop failed: {}", e);
            }
        }
    }
}
