//! SQLite read connection pool
//!
//! Reporting queries run on read-only connections so they never wait behind
//! the writer connection. Under WAL each reader sees the last committed
//! state and never observes a half-applied ledger operation.

use crate::error::sql_err;
use certledger_core::error::{LedgerError, Result};
use certledger_core::ReadPoolConfig;
use parking_lot::{Condvar, Mutex, MutexGuard};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// A read-only connection borrowed from the pool
///
/// Returned to the pool when dropped.
pub struct PooledSqliteConnection<'a> {
    pool: &'a SqliteReadPool,
    slot: usize,
    conn: MutexGuard<'a, Connection>,
}

impl PooledSqliteConnection<'_> {
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl std::ops::Deref for PooledSqliteConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for PooledSqliteConnection<'_> {
    fn drop(&mut self) {
        // `conn` unlocks right after this body, so a woken waiter blocks on
        // the slot mutex only for that instant
        self.pool.idle.lock().push(self.slot);
        self.pool.returned.notify_one();
    }
}

/// Fixed set of read-only connections
///
/// Free slots sit on an idle list guarded by a mutex; callers that find it
/// empty park on a condition variable and are woken as each connection comes
/// back, so a waiter is handed the first connection released.
///
/// # Example
///
/// ```ignore
/// let pool = SqliteReadPool::new(&db_path, ReadPoolConfig::enabled(4), 5000)?;
/// let conn = pool.acquire()?;
/// let n: i64 = conn.query_row("SELECT COUNT(*) FROM batches", [], |row| row.get(0))?;
/// ```
pub struct SqliteReadPool {
    connections: Vec<Mutex<Connection>>,
    idle: Mutex<Vec<usize>>,
    returned: Condvar,
    acquire_timeout: Duration,
    db_path: PathBuf,
}

impl SqliteReadPool {
    /// Open `pool_size` read-only connections to an existing database
    pub fn new(db_path: &Path, config: &ReadPoolConfig, busy_timeout_ms: u64) -> Result<Self> {
        let pool_size = config.pool_size.max(1);
        let mut connections = Vec::with_capacity(pool_size);

        for _ in 0..pool_size {
            let conn = Connection::open_with_flags(
                db_path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|e| sql_err(e, busy_timeout_ms))?;
            conn.busy_timeout(Duration::from_millis(busy_timeout_ms))
                .map_err(|e| sql_err(e, busy_timeout_ms))?;
            connections.push(Mutex::new(conn));
        }

        Ok(Self {
            connections,
            idle: Mutex::new((0..pool_size).rev().collect()),
            returned: Condvar::new(),
            acquire_timeout: Duration::from_millis(config.acquire_timeout_ms),
            db_path: db_path.to_path_buf(),
        })
    }

    /// Borrow a connection, waiting up to the configured acquire timeout
    pub fn acquire(&self) -> Result<PooledSqliteConnection<'_>> {
        let deadline = Instant::now() + self.acquire_timeout;
        let mut idle = self.idle.lock();
        let mut timed_out = false;
        loop {
            if let Some(slot) = idle.pop() {
                drop(idle);
                return Ok(self.checkout(slot));
            }
            if timed_out {
                return Err(LedgerError::Timeout {
                    what: "read pool connection".into(),
                    timeout_ms: self.acquire_timeout.as_millis() as u64,
                });
            }
            timed_out = self.returned.wait_until(&mut idle, deadline).timed_out();
        }
    }

    /// Borrow a connection only if one is free right now
    pub fn try_acquire(&self) -> Option<PooledSqliteConnection<'_>> {
        let slot = self.idle.lock().pop()?;
        Some(self.checkout(slot))
    }

    fn checkout(&self, slot: usize) -> PooledSqliteConnection<'_> {
        PooledSqliteConnection {
            pool: self,
            slot,
            conn: self.connections[slot].lock(),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.connections.len()
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}
