//! Incremental statistics engine
//!
//! Maintains running aggregates and a bounded top-K set over every applied
//! transaction, so statistics queries never rescan the transaction history.
//!
//! COMPLIANCE:
//! - Inserts are O(log K), snapshots O(K log K), independent of history size
//! - One `RwLock` guards all mutable state; writers are serialized
//! - Fixed-point arithmetic only
//! - A detected invariant violation latches the engine into a fault state

pub mod aggregate;
pub mod snapshot;
pub mod top_k;

use crate::config::StatisticsConfig;
use crate::error::{StatsError, StatsResult};
use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use services_common::{Amount, TransactionId, TransactionRecord};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, error, info};

pub use aggregate::AggregateState;
pub use snapshot::{StatisticsResponse, StatisticsSnapshot, TopTransaction};
pub use top_k::{TopK, TopKUpdate};

/// Outcome of `apply_insert`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertOutcome {
    /// Record folded into the statistics
    Applied,
    /// Transaction id was already applied; nothing changed
    Duplicate,
}

/// Mutable engine state, guarded as one unit
#[derive(Debug)]
struct EngineState {
    aggregate: AggregateState,
    top_k: TopK,
    applied: FxHashSet<TransactionId>,
    next_sequence: u64,
}

impl EngineState {
    fn new(top_k: usize) -> Self {
        Self {
            aggregate: AggregateState::new(),
            top_k: TopK::new(top_k),
            applied: FxHashSet::default(),
            next_sequence: 0,
        }
    }

    fn clear(&mut self) {
        self.aggregate.clear();
        self.top_k.clear();
        self.applied.clear();
        self.next_sequence = 0;
    }

    /// Fold one record in; `Err` carries the violated invariant
    fn apply(&mut self, record: TransactionRecord) -> Result<Applied, String> {
        if self.applied.contains(record.transaction_id()) {
            return Ok(Applied::Duplicate);
        }

        let amount = record.amount();
        if self.aggregate.record(amount).is_none() {
            return Err(format!(
                "aggregate overflow recording {} ({amount})",
                record.transaction_id()
            ));
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.applied.insert(record.transaction_id().clone());

        let evicted = match self.top_k.offer(sequence, record) {
            TopKUpdate::Replaced { evicted } => Some(evicted),
            TopKUpdate::Inserted | TopKUpdate::Rejected => None,
        };

        self.check_invariants()?;
        Ok(Applied::Inserted { evicted })
    }

    fn check_invariants(&self) -> Result<(), String> {
        self.aggregate.check_invariants()?;

        let count = self.aggregate.count();
        if self.applied.len() as u64 != count {
            return Err(format!(
                "applied id set holds {} ids but count is {count}",
                self.applied.len()
            ));
        }

        let expected_held = usize::try_from(count)
            .unwrap_or(usize::MAX)
            .min(self.top_k.capacity());
        if self.top_k.len() != expected_held {
            return Err(format!(
                "top-K holds {} records, expected {expected_held}",
                self.top_k.len()
            ));
        }

        if let (Some(weakest), Some(min), Some(max)) = (
            self.top_k.min_amount(),
            self.aggregate.min(),
            self.aggregate.max(),
        ) {
            if weakest < min || weakest > max {
                return Err(format!(
                    "top-K root {weakest} outside recorded range [{min}, {max}]"
                ));
            }
        }
        Ok(())
    }
}

/// What `EngineState::apply` did
enum Applied {
    Inserted { evicted: Option<Amount> },
    Duplicate,
}

/// Engine counters, readable without taking the state lock
#[derive(Debug, Default)]
pub struct EngineMetrics {
    inserts_applied: AtomicU64,
    duplicates_ignored: AtomicU64,
    top_k_evictions: AtomicU64,
    resets: AtomicU64,
}

/// Plain copy of the engine counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineMetricsSnapshot {
    /// Inserts folded into the statistics
    pub inserts_applied: u64,
    /// Inserts ignored as duplicates
    pub duplicates_ignored: u64,
    /// Records displaced from the top-K set
    pub top_k_evictions: u64,
    /// Completed resets
    pub resets: u64,
}

impl EngineMetrics {
    /// Read all counters
    pub fn snapshot(&self) -> EngineMetricsSnapshot {
        EngineMetricsSnapshot {
            inserts_applied: self.inserts_applied.load(Ordering::Relaxed),
            duplicates_ignored: self.duplicates_ignored.load(Ordering::Relaxed),
            top_k_evictions: self.top_k_evictions.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
        }
    }
}

/// In-memory incremental statistics engine
#[derive(Debug)]
pub struct StatisticsEngine {
    state: RwLock<EngineState>,
    faulted: AtomicBool,
    metrics: EngineMetrics,
    top_k_capacity: usize,
}

impl StatisticsEngine {
    /// Create an empty engine keeping the `top_k` highest-amount records
    #[must_use]
    pub fn new(top_k: usize) -> Self {
        Self {
            state: RwLock::new(EngineState::new(top_k)),
            faulted: AtomicBool::new(false),
            metrics: EngineMetrics::default(),
            top_k_capacity: top_k,
        }
    }

    /// Create an engine from validated configuration
    pub fn from_config(config: &StatisticsConfig) -> StatsResult<Self> {
        config.validate()?;
        Ok(Self::new(config.top_k))
    }

    /// Fold a transaction into the statistics - HOT PATH
    ///
    /// Re-applying an already applied `transaction_id` is a no-op reported as
    /// [`InsertOutcome::Duplicate`], whatever its payload.
    pub fn apply_insert(&self, record: TransactionRecord) -> StatsResult<InsertOutcome> {
        self.ensure_healthy()?;
        let transaction_id = record.transaction_id().clone();
        let amount = record.amount();

        let mut state = self.state.write();
        let applied = state.apply(record).map_err(|reason| self.fault(reason))?;
        let count = state.aggregate.count();
        drop(state);

        Ok(self.count_outcome(&transaction_id, amount, count, applied))
    }

    /// Start rebuilding the statistics off to the side
    ///
    /// Readers keep seeing the current state until the rebuild is installed.
    pub fn begin_rebuild(&self) -> StatsResult<EngineRebuild<'_>> {
        self.ensure_healthy()?;
        Ok(EngineRebuild {
            engine: self,
            state: EngineState::new(self.top_k_capacity),
        })
    }

    /// Swap a finished rebuild in as the live state in one step
    pub fn install(&self, rebuild: EngineRebuild<'_>) -> StatsResult<()> {
        self.ensure_healthy()?;
        let EngineRebuild { state, .. } = rebuild;
        let count = state.aggregate.count();
        *self.state.write() = state;
        info!("Installed rebuilt statistics over {} transactions", count);
        Ok(())
    }

    fn count_outcome(
        &self,
        transaction_id: &TransactionId,
        amount: Amount,
        count: u64,
        applied: Applied,
    ) -> InsertOutcome {
        match applied {
            Applied::Duplicate => {
                self.metrics.duplicates_ignored.fetch_add(1, Ordering::Relaxed);
                debug!("Ignoring duplicate transaction {}", transaction_id);
                InsertOutcome::Duplicate
            }
            Applied::Inserted { evicted } => {
                if let Some(evicted) = evicted {
                    self.metrics.top_k_evictions.fetch_add(1, Ordering::Relaxed);
                    debug!("Transaction {} evicted top-K entry of {}", transaction_id, evicted);
                }
                self.metrics.inserts_applied.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Applied transaction {}: {} (count={})",
                    transaction_id, amount, count
                );
                InsertOutcome::Applied
            }
        }
    }

    /// Atomically return to the empty state
    pub fn reset(&self) -> StatsResult<()> {
        self.ensure_healthy()?;
        let cleared = {
            let mut state = self.state.write();
            let cleared = state.aggregate.count();
            state.clear();
            cleared
        };
        self.metrics.resets.fetch_add(1, Ordering::Relaxed);
        info!("Statistics reset, {} transactions cleared", cleared);
        Ok(())
    }

    /// Current statistics - O(K log K), never mutates
    pub fn snapshot(&self) -> StatsResult<StatisticsSnapshot> {
        self.ensure_healthy()?;
        let state = self.state.read();
        let aggregate = &state.aggregate;

        let average = aggregate.average();
        if aggregate.count() > 0 && average.is_none() {
            drop(state);
            return Err(self.fault("average not representable".to_string()));
        }

        Ok(StatisticsSnapshot {
            count: aggregate.count(),
            sum: aggregate.sum(),
            average,
            min: aggregate.min(),
            max: aggregate.max(),
            top_k: state.top_k.sorted_desc(),
        })
    }

    /// Whether the id has been applied since the last reset
    pub fn contains(&self, transaction_id: &str) -> bool {
        self.state.read().applied.contains(transaction_id)
    }

    /// Number of applied transactions
    pub fn len(&self) -> u64 {
        self.state.read().aggregate.count()
    }

    /// Whether no transaction is applied
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured bound K
    #[must_use]
    pub const fn top_k_capacity(&self) -> usize {
        self.top_k_capacity
    }

    /// Whether an invariant violation has stopped the engine
    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    /// Engine counters
    pub fn metrics(&self) -> EngineMetricsSnapshot {
        self.metrics.snapshot()
    }

    fn ensure_healthy(&self) -> StatsResult<()> {
        if self.is_faulted() {
            return Err(StatsError::InternalStateFault {
                reason: "engine halted after an earlier invariant violation".to_string(),
            });
        }
        Ok(())
    }

    /// Latch the engine into the fault state
    pub(crate) fn fault(&self, reason: String) -> StatsError {
        self.faulted.store(true, Ordering::Release);
        error!("Statistics engine invariant violated: {}", reason);
        StatsError::InternalStateFault { reason }
    }
}

/// Statistics under reconstruction, private to the rebuilding task
///
/// Built with the same insert rules as the live engine and swapped in by
/// [`StatisticsEngine::install`]. An invariant violation while rebuilding
/// faults the owning engine.
#[derive(Debug)]
pub struct EngineRebuild<'a> {
    engine: &'a StatisticsEngine,
    state: EngineState,
}

impl EngineRebuild<'_> {
    /// Fold a record into the rebuilt state
    pub fn apply_insert(&mut self, record: TransactionRecord) -> StatsResult<InsertOutcome> {
        self.engine.ensure_healthy()?;
        let transaction_id = record.transaction_id().clone();
        let amount = record.amount();
        let applied = self
            .state
            .apply(record)
            .map_err(|reason| self.engine.fault(reason))?;
        let count = self.state.aggregate.count();
        Ok(self.engine.count_outcome(&transaction_id, amount, count, applied))
    }

    /// Records applied so far
    #[must_use]
    pub fn len(&self) -> u64 {
        self.state.aggregate.count()
    }

    /// Whether nothing has been applied yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
