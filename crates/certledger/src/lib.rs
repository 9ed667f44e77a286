//! Certledger: certificate and medal stock ledger
//!
//! Tracks how many certificates and medals each batch holds at each branch
//! and allows stock to change only through audited, atomic operations:
//! - **Ledger operations**: create, migrate, consume (print), bulk reset
//! - **Audit log writer**: one entry per operation, with a local fallback
//!   file when the ledger table cannot take it
//! - **Recovery service**: replays the fallback file and archives it
//! - **Retention cleanup** and read-only **reporting**
//!
//! # Quick Start
//!
//! ```no_run
//! use certledger::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let db = CertLedger::open("./data")?;
//! let ctx = OperationContext::new("registrar")?;
//!
//! let plan = AllocationPlan::new().with("SND", 100, 10)?;
//! db.ledger().create_batch(&ctx, "BATCH-007", &plan)?;
//! db.ledger().migrate_stock(&ctx, "BATCH-007", "SND", "MKW", 40, 0)?;
//! db.ledger().consume_stock(&ctx, "BATCH-007", "MKW", 5, 0)?;
//!
//! let report = db.recovery().recover_failed_entries()?;
//! println!("recovered {} audit entries", report.recovered);
//! # Ok(())
//! # }
//! ```

pub mod async_ledger;
pub mod audit;
pub mod context;
pub mod db;
pub mod fallback;
pub mod ledger;
pub mod prelude;
pub mod recovery;
pub mod reporting;
pub mod retention;

pub use certledger_core::{
    config::{AuditConfig, CertLedgerConfig, LedgerConfig, MigrationPolicy, StoreConfig},
    error::{ErrorKind, LedgerError, Result},
    lock_manager::{RowKey, RowLockGuard, RowLockManager},
    types::{
        ActionKind, AllocationPlan, AuditOutcome, Batch, BatchCreated, BatchId, BranchCode,
        BranchStock, BranchSummary, ClearReport, CumulativeTotal, FailedLedgerEntry,
        LedgerEntry, LedgerRecord, LogFilter, RecoveryReport, StockAmount, StockMovement,
    },
};
pub use certledger_core::types::{format_timestamp, parse_timestamp};
pub use certledger_core::validate::MAX_AMOUNT;
pub use certledger_sqlite::{SqliteStockStore, StockTxn};

pub use async_ledger::AsyncLedger;
pub use audit::{AuditAttempt, AuditTable, AuditWriter, SqliteAuditTable};
pub use context::{CancelToken, OperationContext, ResetAcknowledgement};
pub use db::{CertLedger, LedgerStatus};
pub use fallback::FallbackLog;
pub use ledger::Ledger;
pub use recovery::RecoveryService;
pub use reporting::Reporting;
pub use retention::RetentionCleaner;
