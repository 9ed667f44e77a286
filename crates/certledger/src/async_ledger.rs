//! Async front-end for [`Ledger`]
//!
//! Each call runs the blocking operation on tokio's blocking pool. If the
//! returned future is dropped before the operation finishes (for example a
//! client disconnect), the operation's cancel token is set and it rolls back
//! at its next checkpoint instead of committing.

use crate::context::{CancelToken, OperationContext, ResetAcknowledgement};
use crate::ledger::Ledger;
use certledger_core::error::{LedgerError, Result};
use certledger_core::types::{AllocationPlan, BatchCreated, ClearReport, StockMovement};
use std::sync::Arc;

#[derive(Clone)]
pub struct AsyncLedger {
    inner: Arc<Ledger>,
}

/// Cancels the wrapped token on drop unless disarmed
struct CancelOnDrop(Option<CancelToken>);

impl CancelOnDrop {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(token) = self.0.take() {
            tracing::debug!("Ledger call abandoned, cancelling operation");
            token.cancel();
        }
    }
}

impl AsyncLedger {
    pub fn new(inner: Arc<Ledger>) -> Self {
        Self { inner }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.inner
    }

    async fn run<T, F>(&self, ctx: OperationContext, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Ledger, &OperationContext) -> Result<T> + Send + 'static,
    {
        let guard = CancelOnDrop(Some(ctx.cancel_token().clone()));
        let ledger = Arc::clone(&self.inner);

        let result = tokio::task::spawn_blocking(move || f(&ledger, &ctx))
            .await
            .map_err(|e| LedgerError::Persistence(format!("ledger worker failed: {e}")))?;

        guard.disarm();
        result
    }

    pub async fn create_batch(
        &self,
        ctx: OperationContext,
        batch_id: String,
        plan: AllocationPlan,
    ) -> Result<BatchCreated> {
        self.run(ctx, move |ledger, ctx| {
            ledger.create_batch(ctx, &batch_id, &plan)
        })
        .await
    }

    pub async fn migrate_stock(
        &self,
        ctx: OperationContext,
        batch_id: String,
        source: String,
        destination: String,
        certificates: i64,
        medals: i64,
    ) -> Result<StockMovement> {
        self.run(ctx, move |ledger, ctx| {
            ledger.migrate_stock(ctx, &batch_id, &source, &destination, certificates, medals)
        })
        .await
    }

    pub async fn consume_stock(
        &self,
        ctx: OperationContext,
        batch_id: String,
        branch: String,
        certificates: i64,
        medals: i64,
    ) -> Result<StockMovement> {
        self.run(ctx, move |ledger, ctx| {
            ledger.consume_stock(ctx, &batch_id, &branch, certificates, medals)
        })
        .await
    }

    pub async fn clear_all_batches(
        &self,
        ctx: OperationContext,
        ack: ResetAcknowledgement,
    ) -> Result<ClearReport> {
        self.run(ctx, move |ledger, ctx| ledger.clear_all_batches(ctx, ack))
            .await
    }
}
