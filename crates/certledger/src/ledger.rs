//! Ledger Operations
//!
//! The only write path for batches and stock rows. Every operation runs the
//! same phases:
//! 1. **Validate**: typed checks on every input, before anything is locked
//! 2. **Lock**: row locks on every (batch, branch) it will mutate, in the
//!    lock manager's fixed global order, bounded by the lock timeout
//! 3. **Mutate**: one `BEGIN IMMEDIATE` transaction; sufficiency checks read
//!    the locked rows, so they always see the latest committed counts
//! 4. **Audit**: one ledger entry, inserted under a savepoint
//! 5. **Commit**: then any diverted audit entry goes to the fallback file
//!
//! A rejection in phases 1-3 returns before anything is written, audit
//! entry included. Cancellation is honored after phase 2 and before phase 5.

use crate::audit::AuditWriter;
use crate::context::{OperationContext, ResetAcknowledgement};
use certledger_core::error::{LedgerError, Result};
use certledger_core::types::{
    self, ActionKind, AllocationPlan, AuditOutcome, BatchCreated, BatchId, BranchCode,
    ClearReport, LedgerEntry, StockAmount, StockMovement,
};
use certledger_core::{observe, validate, LedgerConfig, MigrationPolicy, RowKey, RowLockManager};
use certledger_sqlite::{SqliteStockStore, StockTxn};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Batch id recorded on the bulk-reset ledger entry
pub const BULK_DELETE_BATCH_ID: &str = "ALL";

pub struct Ledger {
    store: SqliteStockStore,
    locks: RowLockManager,
    audit: Arc<AuditWriter>,
    config: LedgerConfig,
}

impl Ledger {
    pub fn new(store: SqliteStockStore, audit: Arc<AuditWriter>, config: LedgerConfig) -> Self {
        let locks = RowLockManager::new(
            config.stripe_count,
            Duration::from_millis(config.lock_timeout_ms),
        );
        Self {
            store,
            locks,
            audit,
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn lock_manager(&self) -> &RowLockManager {
        &self.locks
    }

    /// Create a batch and its initial per-branch stock
    ///
    /// One stock row is written per branch with a non-zero allocation. The
    /// whole allocation is recorded as a single CREATE entry.
    pub fn create_batch(
        &self,
        ctx: &OperationContext,
        batch_id: &str,
        plan: &AllocationPlan,
    ) -> Result<BatchCreated> {
        let batch_id = validate::batch_id(batch_id)?;
        let total = plan.total()?;
        if total.is_zero() {
            return Err(LedgerError::validation(
                "allocations",
                "at least one branch must receive a non-zero amount",
            ));
        }

        let funded: Vec<(BranchCode, StockAmount)> = plan
            .funded()
            .map(|(branch, amount)| (branch.clone(), *amount))
            .collect();
        let rows: Vec<RowKey> = funded
            .iter()
            .map(|(branch, _)| RowKey::new(batch_id.as_str(), branch.as_str()))
            .collect();

        let (created_at, audit) = self.execute("create_batch", ctx, Locking::Rows(&rows), |txn| {
            let now = types::now();
            txn.insert_batch(batch_id.as_str(), &now)?;
            for (branch, amount) in &funded {
                txn.write_stock(batch_id.as_str(), branch.as_str(), amount, &now)?;
            }

            let allocations = funded
                .iter()
                .map(|(branch, amount)| format!("{branch} {amount}"))
                .collect::<Vec<_>>()
                .join(", ");
            let entry = LedgerEntry::new(
                batch_id.as_str(),
                ActionKind::Create,
                format!("Created batch {batch_id}: {allocations}"),
                ctx.actor(),
            )
            .with_deltas(total.certificates, total.medals)
            .with_snapshots(json!({}), snapshot(funded.iter().map(|(b, a)| (b, a))))
            .with_timestamp(now);

            Ok((now, entry))
        })?;

        tracing::info!(
            batch_id = %batch_id,
            branches = funded.len(),
            certificates = total.certificates,
            medals = total.medals,
            actor = ctx.actor(),
            "Created batch"
        );

        Ok(BatchCreated {
            batch_id,
            created_at,
            rows: funded,
            total,
            audit,
        })
    }

    /// Move stock of one batch from `source` to `destination`
    ///
    /// Fails with `InsufficientStock` (and writes nothing) unless the source
    /// holds at least the requested certificates and medals.
    pub fn migrate_stock(
        &self,
        ctx: &OperationContext,
        batch_id: &str,
        source: &str,
        destination: &str,
        certificates: i64,
        medals: i64,
    ) -> Result<StockMovement> {
        let batch_id = validate::batch_id(batch_id)?;
        let source = validate::branch_code(source)?;
        let destination = validate::branch_code(destination)?;
        let requested = validate::movement(certificates, medals)?;

        if source == destination {
            return Err(LedgerError::validation(
                "branch",
                format!("source and destination are both {source}"),
            ));
        }
        if let MigrationPolicy::FromHub { hub } = &self.config.migration_policy {
            if !source.as_str().eq_ignore_ascii_case(hub) {
                return Err(LedgerError::validation(
                    "branch",
                    format!("stock may only be migrated from hub branch {hub}, not {source}"),
                ));
            }
        }

        let rows = [
            RowKey::new(batch_id.as_str(), source.as_str()),
            RowKey::new(batch_id.as_str(), destination.as_str()),
        ];

        let (counts, audit) = self.execute("migrate_stock", ctx, Locking::Rows(&rows), |txn| {
            let source_before = self.debit_check(txn, &batch_id, &source, &requested)?;
            let source_after = source_before
                .checked_sub(&requested)
                .ok_or_else(|| insufficient(&batch_id, &source, source_before, requested))?;

            let dest_before = txn
                .stock_row(batch_id.as_str(), destination.as_str())?
                .map(|row| row.amount)
                .unwrap_or(StockAmount::ZERO);
            let dest_after = dest_before.checked_add(&requested).ok_or_else(|| {
                LedgerError::validation("amount", format!("{destination} stock would overflow"))
            })?;

            let now = types::now();
            txn.write_stock(batch_id.as_str(), source.as_str(), &source_after, &now)?;
            txn.write_stock(batch_id.as_str(), destination.as_str(), &dest_after, &now)?;

            let entry = LedgerEntry::new(
                batch_id.as_str(),
                ActionKind::Migrate,
                format!("Migrated {requested} of {batch_id} from {source} to {destination}"),
                ctx.actor(),
            )
            .with_branches(Some(source.as_str()), Some(destination.as_str()))
            .with_deltas(requested.certificates, requested.medals)
            .with_snapshots(
                snapshot([(&source, &source_before), (&destination, &dest_before)]),
                snapshot([(&source, &source_after), (&destination, &dest_after)]),
            )
            .with_timestamp(now);

            Ok(((source_before, source_after, dest_before, dest_after), entry))
        })?;
        let (source_before, source_after, dest_before, dest_after) = counts;

        tracing::info!(
            batch_id = %batch_id,
            source = %source,
            destination = %destination,
            certificates = requested.certificates,
            medals = requested.medals,
            actor = ctx.actor(),
            "Migrated stock"
        );

        Ok(StockMovement {
            batch_id,
            source,
            source_before,
            source_after,
            destination: Some((destination, dest_before, dest_after)),
            moved: requested,
            audit,
        })
    }

    /// Decrement stock at one branch when certificates are physically issued
    pub fn consume_stock(
        &self,
        ctx: &OperationContext,
        batch_id: &str,
        branch: &str,
        certificates: i64,
        medals: i64,
    ) -> Result<StockMovement> {
        let batch_id = validate::batch_id(batch_id)?;
        let branch = validate::branch_code(branch)?;
        let requested = validate::movement(certificates, medals)?;

        let rows = [RowKey::new(batch_id.as_str(), branch.as_str())];

        let (counts, audit) = self.execute("consume_stock", ctx, Locking::Rows(&rows), |txn| {
            let before = self.debit_check(txn, &batch_id, &branch, &requested)?;
            let after = before
                .checked_sub(&requested)
                .ok_or_else(|| insufficient(&batch_id, &branch, before, requested))?;

            let now = types::now();
            txn.write_stock(batch_id.as_str(), branch.as_str(), &after, &now)?;

            let removed = requested.negated();
            let entry = LedgerEntry::new(
                batch_id.as_str(),
                ActionKind::Print,
                format!("Printed {requested} of {batch_id} at {branch}"),
                ctx.actor(),
            )
            .with_branches(Some(branch.as_str()), None)
            .with_deltas(removed.certificates, removed.medals)
            .with_snapshots(
                snapshot([(&branch, &before)]),
                snapshot([(&branch, &after)]),
            )
            .with_timestamp(now);

            Ok(((before, after), entry))
        })?;
        let (before, after) = counts;

        tracing::info!(
            batch_id = %batch_id,
            branch = %branch,
            certificates = requested.certificates,
            medals = requested.medals,
            actor = ctx.actor(),
            "Consumed stock"
        );

        Ok(StockMovement {
            batch_id,
            source: branch,
            source_before: before,
            source_after: after,
            destination: None,
            moved: requested,
            audit,
        })
    }

    /// Delete every batch and stock row. Irreversible.
    ///
    /// The aggregate totals destroyed are recorded as one BULK_DELETE entry.
    pub fn clear_all_batches(
        &self,
        ctx: &OperationContext,
        _ack: ResetAcknowledgement,
    ) -> Result<ClearReport> {
        let (counts, audit) = self.execute("clear_all_batches", ctx, Locking::All, |txn| {
            let stock = txn.all_stock()?;
            let total = StockAmount::checked_sum(stock.iter().map(|row| row.amount))
                .ok_or_else(|| LedgerError::validation("amount", "total stock overflows"))?;
            let batch_count = txn.count_batches()?;

            let (stock_rows_deleted, batches_deleted) = txn.delete_all()?;

            let removed = total.negated();
            let entry = LedgerEntry::new(
                BULK_DELETE_BATCH_ID,
                ActionKind::BulkDelete,
                format!(
                    "Deleted all {batches_deleted} batches ({stock_rows_deleted} stock rows): {total}"
                ),
                ctx.actor(),
            )
            .with_deltas(removed.certificates, removed.medals)
            .with_snapshots(
                json!({
                    "batches": batch_count,
                    "stock_rows": stock.len(),
                    "certificates": total.certificates,
                    "medals": total.medals,
                }),
                json!({
                    "batches": 0,
                    "stock_rows": 0,
                    "certificates": 0,
                    "medals": 0,
                }),
            );

            Ok(((batches_deleted, stock_rows_deleted, total), entry))
        })?;
        let (batches_deleted, stock_rows_deleted, total) = counts;

        tracing::warn!(
            batches = batches_deleted,
            stock_rows = stock_rows_deleted,
            certificates = total.certificates,
            medals = total.medals,
            actor = ctx.actor(),
            "Cleared all batches"
        );

        Ok(ClearReport {
            batches_deleted,
            stock_rows_deleted,
            total,
            audit,
        })
    }

    /// Current counts of a locked row that is about to be debited
    fn debit_check(
        &self,
        txn: &StockTxn<'_>,
        batch_id: &BatchId,
        branch: &BranchCode,
        requested: &StockAmount,
    ) -> Result<StockAmount> {
        if !txn.batch_exists(batch_id.as_str())? {
            return Err(LedgerError::NotFound(format!("batch {batch_id}")));
        }
        let row = txn
            .stock_row(batch_id.as_str(), branch.as_str())?
            .ok_or_else(|| {
                LedgerError::NotFound(format!("no stock for batch {batch_id} at branch {branch}"))
            })?;

        tracing::debug!(
            batch_id = %batch_id,
            branch = %branch,
            available = %row.amount,
            requested = %requested,
            "Sufficiency check"
        );
        Ok(row.amount)
    }

    /// Run the lock / mutate / audit / commit phases for one operation
    fn execute<T, F>(
        &self,
        op: &'static str,
        ctx: &OperationContext,
        locking: Locking<'_>,
        body: F,
    ) -> Result<(T, AuditOutcome)>
    where
        F: FnOnce(&StockTxn<'_>) -> Result<(T, LedgerEntry)>,
    {
        let started = Instant::now();
        let result = self.run_phases(ctx, locking, body);

        let outcome = match &result {
            Ok(_) => "committed",
            Err(e) if e.is_rejection() => "rejected",
            Err(LedgerError::Timeout { .. }) => "timeout",
            Err(LedgerError::Cancelled) => "cancelled",
            Err(_) => "failed",
        };
        observe::record_operation(op, outcome, started.elapsed());

        if let Err(e) = &result {
            if e.is_rejection() || e.is_retryable() {
                tracing::debug!(op, actor = ctx.actor(), "Operation rejected: {}", e);
            } else {
                tracing::error!(op, actor = ctx.actor(), "Operation failed: {}", e);
            }
        }
        result
    }

    fn run_phases<T, F>(
        &self,
        ctx: &OperationContext,
        locking: Locking<'_>,
        body: F,
    ) -> Result<(T, AuditOutcome)>
    where
        F: FnOnce(&StockTxn<'_>) -> Result<(T, LedgerEntry)>,
    {
        let timeout = self.locks.default_timeout();
        let deadline = Instant::now() + timeout;

        let _rows = match locking {
            Locking::Rows(keys) => self.locks.acquire_rows_with_timeout(keys, timeout)?,
            Locking::All => self.locks.acquire_all(timeout)?,
        };
        ctx.ensure_active()?;

        let txn = self
            .store
            .begin(deadline.saturating_duration_since(Instant::now()))?;
        let (value, entry) = body(&txn)?;
        let attempt = self.audit.record_in(&txn, entry);

        // Dropping txn (and the attempt) here rolls everything back
        ctx.ensure_active()?;
        txn.commit()?;

        Ok((value, self.audit.settle(attempt)))
    }
}

enum Locking<'a> {
    Rows(&'a [RowKey]),
    All,
}

fn insufficient(
    batch_id: &BatchId,
    branch: &BranchCode,
    available: StockAmount,
    requested: StockAmount,
) -> LedgerError {
    LedgerError::InsufficientStock {
        batch_id: batch_id.to_string(),
        branch: branch.to_string(),
        available,
        requested,
    }
}

/// `{"SND": {"certificates": 10, "medals": 2}, ...}`
fn snapshot<'a>(rows: impl IntoIterator<Item = (&'a BranchCode, &'a StockAmount)>) -> Value {
    let mut map = Map::new();
    for (branch, amount) in rows {
        map.insert(
            branch.to_string(),
            json!({
                "certificates": amount.certificates,
                "medals": amount.medals,
            }),
        );
    }
    Value::Object(map)
}
