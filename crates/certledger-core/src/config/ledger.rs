use serde::{Deserialize, Serialize};

/// Default row lock acquisition timeout (5 seconds)
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

/// Which branches may act as a migration source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MigrationPolicy {
    /// Any branch may migrate stock to any other branch
    #[default]
    Any,

    /// Stock only ever moves away from a single hub branch
    FromHub { hub: String },
}

/// Configuration for ledger operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Number of stripes in the row lock manager
    /// Default: 256
    #[serde(default = "default_stripe_count")]
    pub stripe_count: usize,

    /// Row lock acquisition timeout in milliseconds (default: 5000)
    ///
    /// Also bounds the wait for the writer connection. Expiry fails the
    /// operation with `Timeout` and nothing is written.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_ms: u64,

    #[serde(default)]
    pub migration_policy: MigrationPolicy,
}

fn default_stripe_count() -> usize {
    256
}

fn default_lock_timeout() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            stripe_count: default_stripe_count(),
            lock_timeout_ms: default_lock_timeout(),
            migration_policy: MigrationPolicy::default(),
        }
    }
}

impl LedgerConfig {
    pub fn with_stripe_count(mut self, stripe_count: usize) -> Self {
        self.stripe_count = stripe_count;
        self
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    pub fn with_migration_policy(mut self, policy: MigrationPolicy) -> Self {
        self.migration_policy = policy;
        self
    }
}
