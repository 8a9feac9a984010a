//! Core types for transaction ingestion and statistics

pub mod amount;
pub mod transaction;

// Re-export all types
pub use amount::*;
pub use transaction::*;
