use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Newline-delimited JSON file receiving entries the primary store rejected
    pub fallback_path: PathBuf,

    /// `fsync` the fallback file after every append (default: true)
    #[serde(default = "default_true")]
    pub fsync_fallback: bool,

    /// Ledger entries older than this are removed by retention cleanup
    /// Default: 90
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_true() -> bool {
    true
}

fn default_retention_days() -> u32 {
    90
}

impl AuditConfig {
    pub fn new(fallback_path: PathBuf) -> Self {
        Self {
            fallback_path,
            fsync_fallback: default_true(),
            retention_days: default_retention_days(),
        }
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    pub fn with_fsync(mut self, enabled: bool) -> Self {
        self.fsync_fallback = enabled;
        self
    }
}
