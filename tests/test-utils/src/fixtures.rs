//! Test fixtures for common test data

use crate::factories::TransactionFactory;
use rstest::*;
use services_common::TransactionRecord;

#[fixture]
pub fn factory() -> TransactionFactory {
    TransactionFactory::new()
}

/// Amounts with a tie at the top: K=3 keeps both 80s, first one first, then 50
#[fixture]
pub fn tied_amounts() -> Vec<f64> {
    vec![10.0, 50.0, 5.0, 80.0, 80.0, 30.0]
}

#[fixture]
pub fn tied_records(factory: TransactionFactory, tied_amounts: Vec<f64>) -> Vec<TransactionRecord> {
    factory.records(&tied_amounts)
}

/// Three transactions averaging 200.00, with `test2` the largest
#[fixture]
pub fn api_records(factory: TransactionFactory) -> Vec<TransactionRecord> {
    vec![
        factory.record_with_id("test1", 100.0),
        factory.record_with_id("test2", 300.0),
        factory.record_with_id("test3", 200.0),
    ]
}
