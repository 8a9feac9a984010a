//! Common constants used across all services
//!
//! COMPLIANCE: Single source of truth for all magic numbers

// Fixed-point arithmetic constants
/// Fixed-point scale factor (4 decimal places)
pub const FIXED_POINT_SCALE: i64 = 10000;
pub const FIXED_POINT_SCALE_I128: i128 = 10000;
pub const FIXED_POINT_SCALE_F64: f64 = 10000.0;

// Statistics defaults
/// Number of top transactions reported by default (the service reports a top three)
pub const DEFAULT_TOP_K: usize = 3;
/// Default capacity of the update dispatcher queue
pub const DEFAULT_CHANNEL_SIZE: usize = 1000;
/// Records replayed between cooperative yields during recovery
pub const REPLAY_BATCH_SIZE: u64 = 1024;

// Receipt messages
pub const TRANSACTION_RECEIVED: &str = "Transaction received";
pub const TRANSACTIONS_DELETED: &str = "Transactions deleted";
