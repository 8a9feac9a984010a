//! Transaction Statistics Service
//!
//! Incremental statistics over ingested financial transactions:
//! - Running count, sum, mean, min and max
//! - Top-K transactions by amount via a bounded min-heap
//! - Idempotent inserts, atomic resets
//! - Recovery by replaying the transaction store
//!
//! Statistics queries cost O(K log K) regardless of how many transactions
//! have been recorded.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod recovery;
pub mod service;
pub mod storage;

use async_trait::async_trait;
use services_common::{ServiceError, TransactionCreate};

pub use config::{ReplayOrder, StatisticsConfig};
pub use dispatcher::{DispatchTicket, DispatcherStats, UpdateDispatcher};
pub use engine::{
    EngineMetricsSnapshot, InsertOutcome, StatisticsEngine, StatisticsResponse,
    StatisticsSnapshot, TopTransaction,
};
pub use error::{StatsError, StatsResult};
pub use recovery::RecoveryStats;
pub use service::{TransactionReceipt, TransactionService};
pub use storage::{
    InMemoryTransactionStore, JournalTransactionStore, StoredTransaction, TransactionStore,
};

/// Statistics service trait
#[async_trait]
pub trait StatisticsService: Send + Sync {
    /// Persist a transaction and queue its statistics update
    async fn create_transaction(
        &self,
        request: TransactionCreate,
    ) -> Result<TransactionReceipt, ServiceError>;

    /// Delete every transaction and queue a statistics reset
    async fn delete_transactions(&self) -> Result<u64, ServiceError>;

    /// Current statistics in response form
    async fn get_statistics(&self) -> Result<StatisticsResponse, ServiceError>;
}
