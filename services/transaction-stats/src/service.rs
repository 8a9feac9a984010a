//! Transaction service facade
//!
//! Glues the authoritative store, the update dispatcher and the engine
//! together the way the web handlers drive them: persist first, then notify
//! the engine asynchronously.

use crate::config::StatisticsConfig;
use crate::dispatcher::{DispatcherStats, UpdateDispatcher};
use crate::engine::{StatisticsEngine, StatisticsResponse, StatisticsSnapshot};
use crate::recovery::{self, RecoveryStats};
use crate::storage::TransactionStore;
use crate::StatisticsService;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use services_common::{
    ServiceError, TransactionCreate, TRANSACTION_RECEIVED, TRANSACTIONS_DELETED,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Acknowledgement for an accepted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    /// Human readable status
    pub message: String,
    /// Identifier of the queued statistics update
    pub task_id: String,
}

/// Store + dispatcher + engine
pub struct TransactionService {
    store: Arc<dyn TransactionStore>,
    engine: Arc<StatisticsEngine>,
    dispatcher: UpdateDispatcher,
    /// Held across persist-then-dispatch so dispatch order equals persist order
    write_order: Mutex<()>,
    config: StatisticsConfig,
}

impl std::fmt::Debug for TransactionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionService")
            .field("engine", &self.engine)
            .field("dispatcher", &self.dispatcher)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TransactionService {
    /// Create the service and start its dispatcher on the current runtime
    ///
    /// The engine starts empty; call [`TransactionService::recover`] to load
    /// records already held by the store.
    pub fn new(
        config: StatisticsConfig,
        store: Arc<dyn TransactionStore>,
    ) -> Result<Self, ServiceError> {
        let engine = Arc::new(StatisticsEngine::from_config(&config)?);
        let dispatcher =
            UpdateDispatcher::spawn(Arc::clone(&engine), config.dispatcher_queue_capacity);

        Ok(Self {
            store,
            engine,
            dispatcher,
            write_order: Mutex::new(()),
            config,
        })
    }

    /// Full engine snapshot with None sentinels for empty statistics
    pub fn snapshot(&self) -> Result<StatisticsSnapshot, ServiceError> {
        Ok(self.engine.snapshot()?)
    }

    /// Rebuild the engine from the store
    pub async fn recover(&self) -> Result<RecoveryStats, ServiceError> {
        let _order = self.write_order.lock().await;
        self.dispatcher.flush().await?;
        Ok(recovery::replay(self.store.as_ref(), &self.engine, self.config.replay_order).await?)
    }

    /// Wait until every dispatched update has reached the engine
    pub async fn flush(&self) -> Result<(), ServiceError> {
        Ok(self.dispatcher.flush().await?)
    }

    /// Shared engine handle
    #[must_use]
    pub fn engine(&self) -> &Arc<StatisticsEngine> {
        &self.engine
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &StatisticsConfig {
        &self.config
    }

    /// Refuse writes the engine can no longer mirror
    ///
    /// Checked under `write_order` before touching the store, so a halted
    /// dispatcher never leaves a stored record the engine will not see.
    fn ensure_accepting(&self) -> Result<(), ServiceError> {
        if self.engine.is_faulted() || !self.dispatcher.is_running() {
            return Err(ServiceError::ServiceUnavailable(
                "statistics updates are halted".to_string(),
            ));
        }
        Ok(())
    }

    /// Drain pending updates and stop the dispatcher
    pub async fn shutdown(self) -> Result<DispatcherStats, ServiceError> {
        Ok(self.dispatcher.shutdown().await?)
    }
}

#[async_trait]
impl StatisticsService for TransactionService {
    async fn create_transaction(
        &self,
        request: TransactionCreate,
    ) -> Result<TransactionReceipt, ServiceError> {
        let record = request.into_record()?;

        let _order = self.write_order.lock().await;
        self.ensure_accepting()?;
        let stored = match self.store.append(record).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Rejected transaction: {}", e);
                return Err(e.into());
            }
        };
        let ticket = self.dispatcher.submit_insert(stored.record).await?;

        Ok(TransactionReceipt {
            message: TRANSACTION_RECEIVED.to_string(),
            task_id: ticket.to_string(),
        })
    }

    async fn delete_transactions(&self) -> Result<u64, ServiceError> {
        let _order = self.write_order.lock().await;
        self.ensure_accepting()?;
        let removed = self.store.clear().await?;
        self.dispatcher.submit_reset().await?;
        info!("{}: {}", TRANSACTIONS_DELETED, removed);
        Ok(removed)
    }

    async fn get_statistics(&self) -> Result<StatisticsResponse, ServiceError> {
        Ok(self.engine.snapshot()?.to_response())
    }
}
