//! Certledger Prelude
//!
//! ```
//! use certledger::prelude::*;
//! ```

pub use crate::{CertLedger, LedgerError, LedgerStatus, Result};

// Configs
pub use crate::{AuditConfig, CertLedgerConfig, LedgerConfig, MigrationPolicy, StoreConfig};

// Operations
pub use crate::{
    AsyncLedger, CancelToken, Ledger, OperationContext, RecoveryService, Reporting,
    ResetAcknowledgement, RetentionCleaner,
};

// Audit
pub use crate::{AuditOutcome, AuditTable, AuditWriter, FallbackLog, SqliteAuditTable};

// Domain types
pub use crate::{
    ActionKind, AllocationPlan, Batch, BatchCreated, BranchStock, BranchSummary, ClearReport,
    CumulativeTotal, LedgerEntry, LedgerRecord, LogFilter, RecoveryReport, StockAmount,
    StockMovement,
};
