use crate::types::StockAmount;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Validation error: {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error(
        "Insufficient stock for batch {batch_id} at {branch}. Available: {available}, Requested: {requested}"
    )]
    InsufficientStock {
        batch_id: String,
        branch: String,
        available: StockAmount,
        requested: StockAmount,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timed out after {timeout_ms}ms waiting for {what}")]
    Timeout { what: String, timeout_ms: u64 },

    #[error("Operation cancelled before commit")]
    Cancelled,

    #[error("Audit write failed: {0}")]
    AuditWrite(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Coarse classification of a [`LedgerError`]
///
/// Mirrors the operator-facing taxonomy: request-local rejections
/// (`ValidationError`, `DuplicateEntry`, `InsufficientStock`, `NotFound`),
/// bounded waits (`Timeout`, `Cancelled`) and faults (`AuditWriteFailure`,
/// `PersistenceFailure`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ValidationError,
    DuplicateEntry,
    InsufficientStock,
    NotFound,
    Timeout,
    Cancelled,
    AuditWriteFailure,
    PersistenceFailure,
}

impl LedgerError {
    /// Shorthand for a validation failure on a named input field
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::Config(_) => ErrorKind::ValidationError,
            Self::DuplicateEntry(_) => ErrorKind::DuplicateEntry,
            Self::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::AuditWrite(_) => ErrorKind::AuditWriteFailure,
            Self::Persistence(_) | Self::Io(_) | Self::Serialization(_) => {
                ErrorKind::PersistenceFailure
            }
        }
    }

    /// True for expected business-rule outcomes that leave no state behind.
    ///
    /// Rejections are never retried automatically; faults may be.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ValidationError
                | ErrorKind::DuplicateEntry
                | ErrorKind::InsufficientStock
                | ErrorKind::NotFound
        )
    }

    /// True when the operation had no partial effect and the caller may simply retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Timeout | ErrorKind::Cancelled)
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
