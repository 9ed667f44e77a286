//! Certledger Core: types and primitives for the certificate stock ledger
//!
//! This crate defines everything the ledger needs that is independent of
//! the storage engine:
//! - Error taxonomy separating business-rule rejections from infrastructure faults
//! - Configuration for the stock store, ledger operations and audit trail
//! - Domain types: batches, per-branch stock, ledger entries, fallback records
//! - A single typed validation module used by every ledger operation
//! - Row lock manager with a fixed global acquisition order and bounded waits
//! - Optional metrics hooks (`observe` feature)

pub mod config;
pub mod error;
pub mod lock_manager;
pub mod observe;
pub mod types;
pub mod validate;

pub use config::{
    AuditConfig, CertLedgerConfig, LedgerConfig, MigrationPolicy, ReadPoolConfig, StoreConfig,
    SynchronousMode,
};
pub use error::{ErrorKind, LedgerError, Result};
pub use lock_manager::{RowKey, RowLockGuard, RowLockManager};
pub use types::{
    ActionKind, AllocationPlan, AuditOutcome, Batch, BatchCreated, BranchCode, BranchStock,
    BranchSummary, BatchId, ClearReport, CumulativeTotal, FailedLedgerEntry, LedgerEntry,
    LedgerRecord, LogFilter, RecoveryReport, StockAmount, StockMovement,
};
