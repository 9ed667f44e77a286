//! Read-only projections over the stock store

use certledger_core::error::{LedgerError, Result};
use certledger_core::types::{
    Batch, BranchStock, BranchSummary, CumulativeTotal, LedgerRecord, LogFilter,
};
use certledger_core::validate;
use certledger_sqlite::SqliteStockStore;

/// Upper bound on one page of log results
pub const MAX_LOG_PAGE_SIZE: usize = 1000;

pub struct Reporting {
    store: SqliteStockStore,
}

impl Reporting {
    pub fn new(store: SqliteStockStore) -> Self {
        Self { store }
    }

    /// Totals held per branch across all batches
    pub fn summary_by_branch(&self) -> Result<Vec<BranchSummary>> {
        self.store.summary_by_branch()
    }

    /// Per-batch totals with running sums in creation order
    pub fn cumulative_totals(&self) -> Result<Vec<CumulativeTotal>> {
        self.store.cumulative_totals()
    }

    pub fn list_batches(&self) -> Result<Vec<Batch>> {
        self.store.list_batches()
    }

    /// Stock rows of one batch; unknown batches are `NotFound`
    pub fn batch_stock(&self, batch_id: &str) -> Result<Vec<BranchStock>> {
        let batch_id = validate::batch_id(batch_id)?;
        if self.store.get_batch(batch_id.as_str())?.is_none() {
            return Err(LedgerError::NotFound(format!("batch {batch_id}")));
        }
        self.store.batch_stock(batch_id.as_str())
    }

    /// Ledger entries matching `filter`, newest first
    pub fn query_logs(&self, filter: &LogFilter) -> Result<Vec<LedgerRecord>> {
        check_filter(filter)?;
        self.store.query_logs(filter)
    }

    /// Total number of entries matching `filter`, ignoring paging
    pub fn count_logs(&self, filter: &LogFilter) -> Result<usize> {
        check_filter(filter)?;
        self.store.count_logs(filter)
    }

    /// Publish the region a branch belongs to, for the region log filter
    pub fn set_branch_region(&self, branch: &str, region: &str) -> Result<()> {
        let branch = validate::branch_code(branch)?;
        let region = region.trim();
        if region.is_empty() {
            return Err(LedgerError::validation("region", "must not be empty"));
        }
        self.store.set_branch_region(branch.as_str(), region)
    }
}

fn check_filter(filter: &LogFilter) -> Result<()> {
    if filter.limit == 0 || filter.limit > MAX_LOG_PAGE_SIZE {
        return Err(LedgerError::validation(
            "limit",
            format!("must be 1-{MAX_LOG_PAGE_SIZE}, got {}", filter.limit),
        ));
    }
    if let (Some(from), Some(to)) = (&filter.from, &filter.to) {
        if from > to {
            return Err(LedgerError::validation("to", "date range ends before it starts"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_filter_checks() {
        assert!(check_filter(&LogFilter::new()).is_ok());
        assert!(check_filter(&LogFilter::new().page(0, 0)).is_err());
        assert!(check_filter(&LogFilter::new().page(MAX_LOG_PAGE_SIZE + 1, 0)).is_err());

        let now = Utc::now();
        let backwards = LogFilter::new().between(Some(now), Some(now - Duration::days(1)));
        assert!(check_filter(&backwards).is_err());
    }
}
