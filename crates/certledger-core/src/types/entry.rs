use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Kind of mutation a ledger entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Create,
    Migrate,
    Print,
    BulkDelete,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Create => "CREATE",
            ActionKind::Migrate => "MIGRATE",
            ActionKind::Print => "PRINT",
            ActionKind::BulkDelete => "BULK_DELETE",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATE" => Ok(ActionKind::Create),
            "MIGRATE" => Ok(ActionKind::Migrate),
            "PRINT" => Ok(ActionKind::Print),
            "BULK_DELETE" => Ok(ActionKind::BulkDelete),
            other => Err(LedgerError::validation(
                "action",
                format!("unknown action kind {other:?}"),
            )),
        }
    }
}

/// Immutable audit record of one ledger operation
///
/// Old and new values are denormalized snapshots keyed by branch code, so
/// historical reads never depend on current stock rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub batch_id: String,
    pub action: ActionKind,
    pub description: String,
    pub source_branch: Option<String>,
    pub dest_branch: Option<String>,
    pub certificate_delta: i64,
    pub medal_delta: i64,
    pub old_values: serde_json::Value,
    pub new_values: serde_json::Value,
    pub actor: String,
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        batch_id: impl Into<String>,
        action: ActionKind,
        description: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            batch_id: batch_id.into(),
            action,
            description: description.into(),
            source_branch: None,
            dest_branch: None,
            certificate_delta: 0,
            medal_delta: 0,
            old_values: serde_json::Value::Null,
            new_values: serde_json::Value::Null,
            actor: actor.into(),
            timestamp: super::now(),
        }
    }

    pub fn with_branches(mut self, source: Option<&str>, dest: Option<&str>) -> Self {
        self.source_branch = source.map(str::to_string);
        self.dest_branch = dest.map(str::to_string);
        self
    }

    pub fn with_deltas(mut self, certificates: i64, medals: i64) -> Self {
        self.certificate_delta = certificates;
        self.medal_delta = medals;
        self
    }

    pub fn with_snapshots(mut self, old: serde_json::Value, new: serde_json::Value) -> Self {
        self.old_values = old;
        self.new_values = new;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A ledger entry as stored, with its row id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: i64,
    #[serde(flatten)]
    pub entry: LedgerEntry,
}

/// One line of the fallback file
///
/// The full entry plus the error that kept it out of the primary store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedLedgerEntry {
    pub failed_at: DateTime<Utc>,
    pub error: String,
    #[serde(flatten)]
    pub entry: LedgerEntry,
}

impl FailedLedgerEntry {
    pub fn new(entry: LedgerEntry, error: impl fmt::Display) -> Self {
        Self {
            failed_at: super::now(),
            error: error.to_string(),
            entry,
        }
    }
}

/// Where the audit record of a committed operation ended up
///
/// Never an error: a degraded audit path does not fail the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOutcome {
    /// Inserted into the primary ledger table
    Recorded { id: i64 },

    /// Primary insert failed; appended to the fallback file
    Deferred { path: PathBuf },

    /// Both the primary insert and the fallback append failed
    Lost { error: String },
}

impl AuditOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, AuditOutcome::Recorded { .. })
    }

    /// Recorded or deferred: the entry survives a restart
    pub fn is_durable(&self) -> bool {
        !matches!(self, AuditOutcome::Lost { .. })
    }
}

/// Counts from one recovery pass over the fallback file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryReport {
    pub recovered: usize,
    pub failed: usize,
    /// Archive name the processed file was renamed to, if any
    pub archived_to: Option<PathBuf>,
    /// Failed records that could not be written back to the fresh fallback file
    #[serde(default)]
    pub lost: usize,
}
