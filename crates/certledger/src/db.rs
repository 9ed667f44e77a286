//! Unified ledger instance
//!
//! Wires one stock store, its audit writer and fallback file, the ledger
//! operations and the maintenance services together. Every instance is
//! independent, so tests open as many isolated ledgers as they like.

use crate::async_ledger::AsyncLedger;
use crate::audit::{AuditTable, AuditWriter, SqliteAuditTable};
use crate::fallback::FallbackLog;
use crate::ledger::Ledger;
use crate::recovery::RecoveryService;
use crate::reporting::Reporting;
use crate::retention::RetentionCleaner;
use certledger_core::error::Result;
use certledger_core::CertLedgerConfig;
use certledger_sqlite::SqliteStockStore;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Health snapshot for operators
#[derive(Debug, Clone, Serialize)]
pub struct LedgerStatus {
    pub store_path: PathBuf,
    pub schema_version: u32,
    pub batches: usize,
    pub fallback_path: PathBuf,
    /// Audit entries waiting in the fallback file
    pub pending_fallback_entries: usize,
    pub retention_days: u32,
}

pub struct CertLedger {
    config: CertLedgerConfig,
    store: SqliteStockStore,
    audit: Arc<AuditWriter>,
    ledger: Arc<Ledger>,
    recovery: RecoveryService,
    retention: RetentionCleaner,
    reporting: Reporting,
}

impl CertLedger {
    /// Open a ledger with the default layout under `dir`
    ///
    /// Creates:
    /// - `{dir}/ledger.db` - stock store
    /// - `{dir}/audit-fallback/failed_ledger_entries.jsonl` - on first audit failure
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::open_with_config(CertLedgerConfig::for_data_dir(dir))
    }

    pub fn open_with_config(config: CertLedgerConfig) -> Result<Self> {
        Self::open_with_audit_table(config, Arc::new(SqliteAuditTable))
    }

    /// Open with a custom primary audit destination
    pub fn open_with_audit_table(
        config: CertLedgerConfig,
        table: Arc<dyn AuditTable>,
    ) -> Result<Self> {
        config.validate()?;

        let store = SqliteStockStore::open(config.store.clone())?;
        let timeout = Duration::from_millis(config.ledger.lock_timeout_ms);
        let fallback = Arc::new(FallbackLog::new(
            config.audit.fallback_path.clone(),
            config.audit.fsync_fallback,
        ));

        let audit = Arc::new(AuditWriter::new(
            store.clone(),
            Arc::clone(&table),
            Arc::clone(&fallback),
            timeout,
        ));
        let ledger = Arc::new(Ledger::new(
            store.clone(),
            Arc::clone(&audit),
            config.ledger.clone(),
        ));
        let recovery = RecoveryService::new(store.clone(), table, fallback, timeout);
        let retention = RetentionCleaner::new(store.clone(), config.audit.retention_days);
        let reporting = Reporting::new(store.clone());

        Ok(Self {
            config,
            store,
            audit,
            ledger,
            recovery,
            retention,
            reporting,
        })
    }

    pub fn config(&self) -> &CertLedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &SqliteStockStore {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn async_ledger(&self) -> AsyncLedger {
        AsyncLedger::new(Arc::clone(&self.ledger))
    }

    pub fn audit(&self) -> &Arc<AuditWriter> {
        &self.audit
    }

    pub fn recovery(&self) -> &RecoveryService {
        &self.recovery
    }

    pub fn retention(&self) -> &RetentionCleaner {
        &self.retention
    }

    pub fn reporting(&self) -> &Reporting {
        &self.reporting
    }

    pub fn status(&self) -> Result<LedgerStatus> {
        Ok(LedgerStatus {
            store_path: self.store.path().to_path_buf(),
            schema_version: self.store.schema_version()?,
            batches: self.store.list_batches()?.len(),
            fallback_path: self.audit.fallback().path().to_path_buf(),
            pending_fallback_entries: self.audit.fallback().pending()?,
            retention_days: self.retention.retention_days(),
        })
    }
}
