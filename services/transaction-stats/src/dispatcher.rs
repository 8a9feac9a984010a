//! Asynchronous delivery of store events into the statistics engine
//!
//! One worker task owns the receiving end of a bounded channel and applies
//! commands to the engine strictly in submission order. Callers that submit
//! in persistence order therefore get engine updates in persistence order.

use crate::engine::{InsertOutcome, StatisticsEngine};
use crate::error::{StatsError, StatsResult};
use serde::{Deserialize, Serialize};
use services_common::TransactionRecord;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Identifier of a submitted engine update
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DispatchTicket(u64);

impl DispatchTicket {
    /// Submission sequence number
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DispatchTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stats-update-{:08}", self.0)
    }
}

/// Work item for the dispatcher worker
#[derive(Debug)]
enum EngineCommand {
    Insert {
        ticket: DispatchTicket,
        record: TransactionRecord,
    },
    Reset {
        ticket: DispatchTicket,
    },
    Flush(oneshot::Sender<()>),
}

/// Totals reported by the worker when it stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherStats {
    /// Inserts the engine applied
    pub inserts_applied: u64,
    /// Inserts the engine ignored as duplicates
    pub duplicates_ignored: u64,
    /// Resets applied
    pub resets_applied: u64,
    /// Whether the worker stopped because the engine faulted
    pub halted_on_fault: bool,
}

/// Serializing update dispatcher
#[derive(Debug)]
pub struct UpdateDispatcher {
    sender: mpsc::Sender<EngineCommand>,
    next_ticket: AtomicU64,
    worker: JoinHandle<DispatcherStats>,
}

impl UpdateDispatcher {
    /// Spawn the worker on the current tokio runtime
    #[must_use]
    pub fn spawn(engine: Arc<StatisticsEngine>, queue_capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let worker = tokio::spawn(run_worker(engine, receiver));
        info!("Update dispatcher started (queue capacity {})", queue_capacity);

        Self {
            sender,
            next_ticket: AtomicU64::new(1),
            worker,
        }
    }

    /// Queue `apply_insert(record)`
    pub async fn submit_insert(&self, record: TransactionRecord) -> StatsResult<DispatchTicket> {
        let ticket = self.issue_ticket();
        self.send(EngineCommand::Insert { ticket, record }).await?;
        Ok(ticket)
    }

    /// Queue `reset()`
    pub async fn submit_reset(&self) -> StatsResult<DispatchTicket> {
        let ticket = self.issue_ticket();
        self.send(EngineCommand::Reset { ticket }).await?;
        Ok(ticket)
    }

    /// Wait until every previously submitted command has been applied
    pub async fn flush(&self) -> StatsResult<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(EngineCommand::Flush(done_tx)).await?;
        done_rx.await.map_err(|_| StatsError::DispatcherClosed {
            reason: "worker stopped before reaching the flush marker".to_string(),
        })
    }

    /// Whether the worker is still accepting commands
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Close the queue, drain it and join the worker
    pub async fn shutdown(self) -> StatsResult<DispatcherStats> {
        drop(self.sender);
        let stats = self.worker.await.map_err(|e| StatsError::DispatcherClosed {
            reason: format!("worker task failed: {e}"),
        })?;
        info!(
            "Update dispatcher stopped: {} inserts, {} duplicates, {} resets",
            stats.inserts_applied, stats.duplicates_ignored, stats.resets_applied
        );
        Ok(stats)
    }

    fn issue_ticket(&self) -> DispatchTicket {
        DispatchTicket(self.next_ticket.fetch_add(1, Ordering::Relaxed))
    }

    async fn send(&self, command: EngineCommand) -> StatsResult<()> {
        self.sender
            .send(command)
            .await
            .map_err(|_| StatsError::DispatcherClosed {
                reason: "update queue closed".to_string(),
            })
    }
}

async fn run_worker(
    engine: Arc<StatisticsEngine>,
    mut receiver: mpsc::Receiver<EngineCommand>,
) -> DispatcherStats {
    let mut stats = DispatcherStats::default();

    while let Some(command) = receiver.recv().await {
        let result = match command {
            EngineCommand::Insert { ticket, record } => {
                let transaction_id = record.transaction_id().clone();
                engine.apply_insert(record).map(|outcome| match outcome {
                    InsertOutcome::Applied => {
                        stats.inserts_applied += 1;
                        debug!("{} applied {}", ticket, transaction_id);
                    }
                    InsertOutcome::Duplicate => {
                        stats.duplicates_ignored += 1;
                        debug!("{} ignored duplicate {}", ticket, transaction_id);
                    }
                })
            }
            EngineCommand::Reset { ticket } => engine.reset().map(|()| {
                stats.resets_applied += 1;
                debug!("{} applied reset", ticket);
            }),
            EngineCommand::Flush(done) => {
                // Receiver may have given up waiting
                let _ = done.send(());
                Ok(())
            }
        };

        if let Err(e) = result {
            error!("Update dispatcher halting: {}", e);
            stats.halted_on_fault = true;
            break;
        }
    }

    stats
}
