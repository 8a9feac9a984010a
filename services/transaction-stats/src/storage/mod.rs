//! Transaction storage backends
//!
//! The store is the authoritative record set; the statistics engine only
//! mirrors it. Recovery rebuilds the engine from `load_all`.

pub mod journal;

use crate::error::{StatsError, StatsResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use services_common::{TransactionId, TransactionRecord};

pub use journal::JournalTransactionStore;

/// A record as held by a store, tagged with its insertion sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTransaction {
    /// Insertion sequence, restarting at zero after a clear
    pub sequence: u64,
    /// The stored record
    pub record: TransactionRecord,
}

/// Storage backend trait
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Append a record; fails with `DuplicateTransaction` if its id is present
    async fn append(&self, record: TransactionRecord) -> StatsResult<StoredTransaction>;

    /// Remove every record, returning how many were removed
    async fn clear(&self) -> StatsResult<u64>;

    /// Every stored record in insertion order
    async fn load_all(&self) -> StatsResult<Vec<StoredTransaction>>;

    /// Number of stored records
    async fn len(&self) -> StatsResult<usize>;

    /// Whether a record with this id is stored
    async fn contains(&self, transaction_id: &TransactionId) -> StatsResult<bool>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    records: Vec<StoredTransaction>,
    ids: FxHashSet<TransactionId>,
    next_sequence: u64,
}

/// Volatile store for tests and ephemeral deployments
#[derive(Debug, Default)]
pub struct InMemoryTransactionStore {
    inner: RwLock<MemoryInner>,
}

impl InMemoryTransactionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn append(&self, record: TransactionRecord) -> StatsResult<StoredTransaction> {
        let mut inner = self.inner.write();
        if inner.ids.contains(record.transaction_id()) {
            return Err(StatsError::DuplicateTransaction {
                transaction_id: record.transaction_id().to_string(),
            });
        }

        let stored = StoredTransaction {
            sequence: inner.next_sequence,
            record,
        };
        inner.next_sequence += 1;
        inner.ids.insert(stored.record.transaction_id().clone());
        inner.records.push(stored.clone());
        Ok(stored)
    }

    async fn clear(&self) -> StatsResult<u64> {
        let mut inner = self.inner.write();
        let removed = inner.records.len() as u64;
        *inner = MemoryInner::default();
        Ok(removed)
    }

    async fn load_all(&self) -> StatsResult<Vec<StoredTransaction>> {
        Ok(self.inner.read().records.clone())
    }

    async fn len(&self) -> StatsResult<usize> {
        Ok(self.inner.read().records.len())
    }

    async fn contains(&self, transaction_id: &TransactionId) -> StatsResult<bool> {
        Ok(self.inner.read().ids.contains(transaction_id))
    }
}
