//! Row lock manager for (batch, branch) stock rows
//!
//! Every ledger operation locks each stock row it will mutate before its
//! database transaction begins, and holds the locks until commit or
//! rollback. Rows are hashed to stripes and stripes are always acquired in
//! ascending index order, so two operations locking the same pair of rows
//! in opposite argument order can never deadlock.

use crate::error::{LedgerError, Result};
use crate::observe;
use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeSet;
use std::fmt;
use std::time::{Duration, Instant};
use xxhash_rust::xxh3::xxh3_64;

pub use crate::config::ledger::DEFAULT_LOCK_TIMEOUT_MS;

/// Identity of one stock row
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowKey {
    pub batch_id: String,
    pub branch: String,
}

impl RowKey {
    pub fn new(batch_id: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            branch: branch.into(),
        }
    }

    fn hash_input(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.batch_id.len() + self.branch.len() + 1);
        buf.extend_from_slice(self.batch_id.as_bytes());
        buf.push(b'/');
        buf.extend_from_slice(self.branch.as_bytes());
        buf
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.batch_id, self.branch)
    }
}

/// Striped row locks with a fixed global acquisition order
///
/// # Deadlock Prevention
///
/// 1. **Fixed order**: `acquire_rows()` maps rows to stripes, deduplicates,
///    and acquires in ascending stripe index regardless of argument order.
/// 2. **Bounded wait**: each stripe is taken with `try_lock_for()`; expiry
///    releases everything already held and returns `Timeout`.
///
/// # Example
///
/// ```
/// use certledger_core::{RowKey, RowLockManager};
///
/// let locks = RowLockManager::with_stripes(256);
/// let _guard = locks
///     .acquire_rows(&[RowKey::new("BATCH-1", "SND"), RowKey::new("BATCH-1", "MKW")])
///     .unwrap();
/// ```
pub struct RowLockManager {
    stripes: Vec<Mutex<()>>,
    default_timeout: Duration,
}

/// Guard holding every stripe a ledger operation needs
///
/// Released in reverse acquisition order when dropped.
pub struct RowLockGuard<'a> {
    _guards: Vec<MutexGuard<'a, ()>>,
    stripes: Vec<usize>,
}

impl RowLockGuard<'_> {
    /// Stripe indices held, in acquisition order
    pub fn stripes(&self) -> &[usize] {
        &self.stripes
    }
}

impl RowLockManager {
    /// # Panics
    ///
    /// Panics if `num_stripes` is 0.
    pub fn new(num_stripes: usize, default_timeout: Duration) -> Self {
        assert!(num_stripes > 0, "num_stripes must be positive");
        Self {
            stripes: (0..num_stripes).map(|_| Mutex::new(())).collect(),
            default_timeout,
        }
    }

    pub fn with_stripes(num_stripes: usize) -> Self {
        Self::new(num_stripes, Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS))
    }

    fn stripe_index(&self, key: &RowKey) -> usize {
        (xxh3_64(&key.hash_input()) as usize) % self.stripes.len()
    }

    /// The order in which `acquire_rows` would take stripes for `keys`
    pub fn lock_order(&self, keys: &[RowKey]) -> Vec<usize> {
        keys.iter()
            .map(|k| self.stripe_index(k))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn acquire_rows(&self, keys: &[RowKey]) -> Result<RowLockGuard<'_>> {
        self.acquire_rows_with_timeout(keys, self.default_timeout)
    }

    pub fn acquire_rows_with_timeout(
        &self,
        keys: &[RowKey],
        timeout: Duration,
    ) -> Result<RowLockGuard<'_>> {
        let order = self.lock_order(keys);
        self.acquire_stripes(order, timeout, || display_keys(keys))
    }

    /// Take every stripe, for operations that mutate all rows
    pub fn acquire_all(&self, timeout: Duration) -> Result<RowLockGuard<'_>> {
        let order = (0..self.stripes.len()).collect();
        self.acquire_stripes(order, timeout, || "all rows".to_string())
    }

    fn acquire_stripes(
        &self,
        order: Vec<usize>,
        timeout: Duration,
        describe: impl Fn() -> String,
    ) -> Result<RowLockGuard<'_>> {
        let started = Instant::now();
        let mut guards = Vec::with_capacity(order.len());

        for &stripe in &order {
            // The whole acquisition shares one deadline
            let remaining = timeout.saturating_sub(started.elapsed());
            match self.stripes[stripe].try_lock_for(remaining) {
                Some(guard) => guards.push(guard),
                None => {
                    tracing::debug!(
                        rows = %describe(),
                        "row lock wait exceeded {:?}",
                        timeout
                    );
                    return Err(LedgerError::Timeout {
                        what: format!("row lock on {}", describe()),
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
            }
        }

        observe::record_lock_wait(started.elapsed());
        Ok(RowLockGuard {
            _guards: guards,
            stripes: order,
        })
    }

    pub fn num_stripes(&self) -> usize {
        self.stripes.len()
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }
}

fn display_keys(keys: &[RowKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
