use crate::types::{ActionKind, StockAmount};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stock held by one branch across all batches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSummary {
    pub branch: String,
    pub total: StockAmount,
    pub batch_count: usize,
}

/// Totals of one batch plus running totals up to and including it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CumulativeTotal {
    pub batch_id: String,
    pub created_at: DateTime<Utc>,
    pub total: StockAmount,
    pub cumulative: StockAmount,
}

pub const DEFAULT_LOG_PAGE_SIZE: usize = 100;

/// Filter for ledger log queries
///
/// All criteria are optional and combined with AND. `from` is inclusive,
/// `to` exclusive. `region` matches entries whose source or destination
/// branch belongs to the region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    pub batch_id: Option<String>,
    pub action: Option<ActionKind>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub search: Option<String>,
    pub region: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            batch_id: None,
            action: None,
            from: None,
            to: None,
            search: None,
            region: None,
            limit: DEFAULT_LOG_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl LogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    pub fn action(mut self, action: ActionKind) -> Self {
        self.action = Some(action);
        self
    }

    pub fn between(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}
