//! SQLite-backed stock store
//!
//! Holds batches, per-branch stock counters and the append-only ledger
//! table.
//!
//! Key features:
//! - Versioned schema applied on open
//! - Single writer connection, `BEGIN IMMEDIATE` transactions with savepoints
//! - WAL mode so reporting reads never block writers
//! - Read-only connection pool for reporting and log queries

mod error;
pub mod queries;
pub mod read_pool;
pub mod schema;
pub mod store;
pub mod txn;

pub use read_pool::{PooledSqliteConnection, SqliteReadPool};
pub use store::SqliteStockStore;
pub use txn::StockTxn;

/// Re-exported so callers implementing audit sinks against a connection
/// don't need a direct rusqlite dependency
pub use rusqlite::Connection;
