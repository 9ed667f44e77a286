use crate::error::{LedgerError, Result};
use crate::types::{AuditOutcome, BatchId, BranchCode};
use crate::validate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A pair of certificate and medal counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAmount {
    pub certificates: i64,
    pub medals: i64,
}

impl StockAmount {
    pub const ZERO: StockAmount = StockAmount {
        certificates: 0,
        medals: 0,
    };

    pub fn new(certificates: i64, medals: i64) -> Self {
        Self {
            certificates,
            medals,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.certificates == 0 && self.medals == 0
    }

    /// True when both counts are at least those of `requested`
    pub fn covers(&self, requested: &StockAmount) -> bool {
        self.certificates >= requested.certificates && self.medals >= requested.medals
    }

    pub fn checked_add(&self, other: &StockAmount) -> Option<StockAmount> {
        Some(StockAmount {
            certificates: self.certificates.checked_add(other.certificates)?,
            medals: self.medals.checked_add(other.medals)?,
        })
    }

    /// Sum of `amounts`, or `None` if either count overflows
    pub fn checked_sum(amounts: impl IntoIterator<Item = StockAmount>) -> Option<StockAmount> {
        amounts
            .into_iter()
            .try_fold(StockAmount::ZERO, |acc, a| acc.checked_add(&a))
    }

    /// Subtract, returning `None` if either count would go negative
    pub fn checked_sub(&self, other: &StockAmount) -> Option<StockAmount> {
        if !self.covers(other) {
            return None;
        }
        Some(StockAmount {
            certificates: self.certificates - other.certificates,
            medals: self.medals - other.medals,
        })
    }

    pub fn negated(&self) -> StockAmount {
        StockAmount {
            certificates: -self.certificates,
            medals: -self.medals,
        }
    }
}

impl fmt::Display for StockAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} certificates / {} medals",
            self.certificates, self.medals
        )
    }
}

/// A named lot of certificates and medals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: String,
    pub created_at: DateTime<Utc>,
}

/// Current holdings of one batch at one branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchStock {
    pub batch_id: String,
    pub branch: String,
    pub amount: StockAmount,
    pub updated_at: DateTime<Utc>,
}

/// Initial per-branch allocation for a new batch
///
/// Keys are normalized branch codes; a branch may appear only once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationPlan {
    branches: BTreeMap<BranchCode, StockAmount>,
}

impl AllocationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a branch allocation, validating the code and both amounts
    pub fn insert(&mut self, branch: &str, certificates: i64, medals: i64) -> Result<()> {
        let code = validate::branch_code(branch)?;
        let amount = validate::stock_amount(certificates, medals)?;
        if self.branches.contains_key(&code) {
            return Err(LedgerError::validation(
                "branch",
                format!("branch {code} allocated more than once"),
            ));
        }
        self.branches.insert(code, amount);
        Ok(())
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with(mut self, branch: &str, certificates: i64, medals: i64) -> Result<Self> {
        self.insert(branch, certificates, medals)?;
        Ok(self)
    }

    /// Parse `{"SND": {"certificates": 10, "medals": 2}, ...}`
    ///
    /// Missing fields count as zero; negative or non-integer numbers are
    /// rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            LedgerError::validation("allocations", "expected an object keyed by branch code")
        })?;

        let mut plan = Self::new();
        for (branch, amounts) in object {
            let fields = amounts.as_object().ok_or_else(|| {
                LedgerError::validation(
                    "allocations",
                    format!("allocation for {branch} must be an object"),
                )
            })?;
            let certificates = match fields.get("certificates") {
                Some(v) => validate::amount_from_json("certificates", v)?,
                None => 0,
            };
            let medals = match fields.get("medals") {
                Some(v) => validate::amount_from_json("medals", v)?,
                None => 0,
            };
            plan.insert(branch, certificates, medals)?;
        }
        Ok(plan)
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Sum across all branches
    pub fn total(&self) -> Result<StockAmount> {
        StockAmount::checked_sum(self.branches.values().copied()).ok_or_else(|| {
            LedgerError::validation("allocations", "total allocation overflows")
        })
    }

    /// Branches receiving a non-zero amount, in branch code order
    pub fn funded(&self) -> impl Iterator<Item = (&BranchCode, &StockAmount)> {
        self.branches.iter().filter(|(_, amount)| !amount.is_zero())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BranchCode, &StockAmount)> {
        self.branches.iter()
    }
}

/// Result of a successful `create_batch`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCreated {
    pub batch_id: BatchId,
    pub created_at: DateTime<Utc>,
    /// Rows created, one per funded branch
    pub rows: Vec<(BranchCode, StockAmount)>,
    pub total: StockAmount,
    pub audit: AuditOutcome,
}

/// Before/after snapshot of a committed migration or consumption
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockMovement {
    pub batch_id: BatchId,
    pub source: BranchCode,
    pub source_before: StockAmount,
    pub source_after: StockAmount,
    /// Present for migrations only
    pub destination: Option<(BranchCode, StockAmount, StockAmount)>,
    pub moved: StockAmount,
    pub audit: AuditOutcome,
}

/// Aggregate totals destroyed by `clear_all_batches`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearReport {
    pub batches_deleted: usize,
    pub stock_rows_deleted: usize,
    pub total: StockAmount,
    pub audit: AuditOutcome,
}
