//! Error types for the transaction statistics service

use services_common::ServiceError;
use thiserror::Error;

/// Statistics service error types
#[derive(Error, Debug)]
pub enum StatsError {
    /// An engine invariant was violated; the engine refuses further work
    #[error("Internal state fault: {reason}")]
    InternalStateFault {
        /// Which invariant failed
        reason: String,
    },

    /// Transaction key already present in the store
    #[error("Transaction ID already exists: {transaction_id}")]
    DuplicateTransaction {
        /// The conflicting transaction key
        transaction_id: String,
    },

    /// Journal I/O error
    #[error("Journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Journal payload encoding error
    #[error("Journal encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    /// Journal failed validation on read
    #[error("Journal corrupted at entry {entry}: {reason}")]
    JournalCorrupted {
        /// Zero-based entry index where validation failed
        entry: u64,
        /// What failed
        reason: String,
    },

    /// Journal stopped accepting writes after an unrecoverable failure
    #[error("Journal unavailable: {reason}")]
    JournalUnavailable {
        /// What failed
        reason: String,
    },

    /// Encoded record does not fit a journal frame
    #[error("Record too large for journal frame: {size} bytes")]
    RecordTooLarge {
        /// Encoded size in bytes
        size: usize,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Configuration error message detailing what went wrong
        message: String,
    },

    /// Update dispatcher is no longer accepting work
    #[error("Dispatcher unavailable: {reason}")]
    DispatcherClosed {
        /// Why the dispatcher stopped
        reason: String,
    },
}

/// Type alias for statistics results
pub type StatsResult<T> = Result<T, StatsError>;

impl From<StatsError> for ServiceError {
    fn from(err: StatsError) -> Self {
        match err {
            StatsError::DuplicateTransaction { .. } => {
                Self::AlreadyExists("Transaction ID".to_string())
            }
            StatsError::DispatcherClosed { .. } => Self::ServiceUnavailable(err.to_string()),
            StatsError::InternalStateFault { .. }
            | StatsError::Io(_)
            | StatsError::Encoding(_)
            | StatsError::JournalCorrupted { .. }
            | StatsError::JournalUnavailable { .. }
            | StatsError::RecordTooLarge { .. }
            | StatsError::Configuration { .. } => Self::InternalError(err.to_string()),
        }
    }
}
