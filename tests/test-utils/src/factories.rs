//! Factory patterns for generating test transactions

use chrono::{DateTime, Duration, TimeZone, Utc};
use fake::Fake;
use services_common::{Amount, TransactionCreate, TransactionRecord};
use uuid::Uuid;

/// Factory for creating test transactions with customization
#[derive(Debug, Clone)]
pub struct TransactionFactory {
    user_id: String,
    currency: String,
    base_time: DateTime<Utc>,
}

impl Default for TransactionFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionFactory {
    pub fn new() -> Self {
        Self {
            user_id: "user1".to_string(),
            currency: "USD".to_string(),
            base_time: Utc
                .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Record with a random UUID id
    pub fn record(&self, amount: f64) -> TransactionRecord {
        self.record_with_id(Uuid::new_v4().to_string(), amount)
    }

    pub fn record_with_id(&self, id: impl Into<String>, amount: f64) -> TransactionRecord {
        TransactionRecord::new(
            id.into(),
            self.user_id.clone(),
            Amount::from_f64(amount),
            self.currency.clone(),
            self.base_time,
        )
    }

    /// Record whose timestamp is `offset_secs` after the factory's base time
    pub fn record_at(&self, id: impl Into<String>, amount: f64, offset_secs: i64) -> TransactionRecord {
        TransactionRecord::new(
            id.into(),
            self.user_id.clone(),
            Amount::from_f64(amount),
            self.currency.clone(),
            self.base_time + Duration::seconds(offset_secs),
        )
    }

    /// One record per amount, ids `tx-0`, `tx-1`, ...
    pub fn records(&self, amounts: &[f64]) -> Vec<TransactionRecord> {
        amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| self.record_at(format!("tx-{i}"), *amount, i as i64))
            .collect()
    }

    pub fn request(&self, id: impl Into<String>, amount: f64) -> TransactionCreate {
        TransactionCreate {
            transaction_id: id.into(),
            user_id: self.user_id.clone(),
            amount,
            currency: self.currency.clone(),
            timestamp: self.base_time,
        }
    }

    /// Requests with random ids and amounts rounded to cents in `range`
    pub fn random_requests(&self, count: usize, range: (f64, f64)) -> Vec<TransactionCreate> {
        (0..count)
            .map(|_| {
                let raw: f64 = (range.0..range.1).fake();
                let amount = (raw * 100.0).round() / 100.0;
                self.request(Uuid::new_v4().to_string(), amount)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_have_sequential_ids() {
        let records = TransactionFactory::new().records(&[1.0, 2.0, 3.0]);
        let ids: Vec<&str> = records.iter().map(|r| r.transaction_id().as_str()).collect();
        assert_eq!(ids, vec!["tx-0", "tx-1", "tx-2"]);
        assert!(records[0].timestamp() < records[2].timestamp());
    }

    #[test]
    fn test_random_requests_in_range() {
        let requests = TransactionFactory::new().random_requests(50, (10.0, 1000.0));
        assert_eq!(requests.len(), 50);
        assert!(requests.iter().all(|r| (10.0..=1000.0).contains(&r.amount)));
        assert!(requests.iter().all(|r| r.validate().is_ok()));
    }
}
