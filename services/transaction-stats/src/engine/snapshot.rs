//! Point-in-time statistics views

use serde::{Deserialize, Serialize};
use services_common::{Amount, TransactionRecord};

/// Point-in-time read of the engine state
///
/// `average`, `min` and `max` are None when no transaction is recorded, which
/// distinguishes "no data" from data summing to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    /// Number of recorded transactions
    pub count: u64,
    /// Sum of recorded amounts in ticks (1 tick = 0.0001)
    pub sum: i128,
    /// Mean amount
    pub average: Option<Amount>,
    /// Smallest recorded amount
    pub min: Option<Amount>,
    /// Largest recorded amount
    pub max: Option<Amount>,
    /// Highest-amount records, descending, earlier insertion first on ties
    pub top_k: Vec<TransactionRecord>,
}

impl StatisticsSnapshot {
    /// Snapshot of an engine holding nothing
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            count: 0,
            sum: 0,
            average: None,
            min: None,
            max: None,
            top_k: Vec::new(),
        }
    }

    /// Whether no transaction is recorded
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Sum as f64 currency units, for display only
    #[must_use]
    pub fn sum_as_f64(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        {
            self.sum as f64 / services_common::FIXED_POINT_SCALE_F64
        }
    }

    /// Render as the statistics query response
    #[must_use]
    pub fn to_response(&self) -> StatisticsResponse {
        StatisticsResponse {
            total_transactions: self.count,
            average_transaction_amount: self.average.map_or(0.0, |avg| avg.as_f64()),
            top_transactions: self
                .top_k
                .iter()
                .map(|record| TopTransaction {
                    transaction_id: record.transaction_id().to_string(),
                    amount: record.amount().as_f64(),
                })
                .collect(),
        }
    }
}

impl Default for StatisticsSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Entry of the top transactions list in a statistics response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopTransaction {
    /// Transaction key
    pub transaction_id: String,
    /// Amount in currency units
    pub amount: f64,
}

/// Statistics query response body
///
/// Empty statistics report zeros here, as clients of the query endpoint
/// expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsResponse {
    /// Number of recorded transactions
    pub total_transactions: u64,
    /// Mean amount in currency units
    pub average_transaction_amount: f64,
    /// Highest-amount transactions, descending
    pub top_transactions: Vec<TopTransaction>,
}
