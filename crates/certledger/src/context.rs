//! Per-call context for ledger operations

use certledger_core::error::{LedgerError, Result};
use certledger_core::validate;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared between a caller and an operation
///
/// The ledger checks it after row locks are taken and again immediately
/// before commit. Once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Who is performing an operation, and whether they still want it
#[derive(Debug, Clone)]
pub struct OperationContext {
    actor: String,
    cancel: CancelToken,
}

impl OperationContext {
    /// Context for `actor`; the name is trimmed and must be 1-100 characters
    pub fn new(actor: &str) -> Result<Self> {
        Ok(Self {
            actor: validate::actor(actor)?,
            cancel: CancelToken::new(),
        })
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub(crate) fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(LedgerError::Cancelled);
        }
        Ok(())
    }
}

/// Proof that the caller asked for the irreversible bulk reset
///
/// Only obtainable by typing [`ResetAcknowledgement::PHRASE`] exactly.
#[derive(Debug)]
pub struct ResetAcknowledgement {
    _private: (),
}

impl ResetAcknowledgement {
    pub const PHRASE: &'static str = "DELETE ALL BATCHES";

    pub fn confirm(phrase: &str) -> Result<Self> {
        if phrase != Self::PHRASE {
            return Err(LedgerError::validation(
                "confirmation",
                format!("type {:?} exactly to delete every batch", Self::PHRASE),
            ));
        }
        Ok(Self { _private: () })
    }
}
