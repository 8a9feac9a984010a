//! Transaction records as ingested by the service

use super::amount::Amount;
use crate::errors::ServiceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Unique transaction key supplied by the client
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Create a transaction id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TransactionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TransactionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TransactionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable transaction record
///
/// `currency` is informational only: statistics are computed over the raw
/// `amount` regardless of currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    transaction_id: TransactionId,
    user_id: String,
    amount: Amount,
    currency: String,
    timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    /// Create a new record
    #[must_use]
    pub fn new(
        transaction_id: impl Into<TransactionId>,
        user_id: impl Into<String>,
        amount: Amount,
        currency: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            user_id: user_id.into(),
            amount,
            currency: currency.into(),
            timestamp,
        }
    }

    /// Transaction key
    #[must_use]
    pub const fn transaction_id(&self) -> &TransactionId {
        &self.transaction_id
    }

    /// Owning user
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Signed fixed-point amount
    #[must_use]
    pub const fn amount(&self) -> Amount {
        self.amount
    }

    /// ISO currency code as supplied by the client
    #[must_use]
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Client supplied transaction time
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Create-transaction request body
///
/// Amounts arrive as floating point and are converted to fixed-point once,
/// here at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionCreate {
    /// Unique transaction key
    pub transaction_id: String,
    /// Owning user
    pub user_id: String,
    /// Amount in currency units
    pub amount: f64,
    /// Currency code
    pub currency: String,
    /// Transaction time
    pub timestamp: DateTime<Utc>,
}

impl TransactionCreate {
    /// Validate the request fields
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.transaction_id.trim().is_empty() {
            return Err(ServiceError::InvalidRequest(
                "transaction_id must not be empty".to_string(),
            ));
        }
        if self.user_id.trim().is_empty() {
            return Err(ServiceError::InvalidRequest(
                "user_id must not be empty".to_string(),
            ));
        }
        if self.currency.trim().is_empty() {
            return Err(ServiceError::InvalidRequest(
                "currency must not be empty".to_string(),
            ));
        }
        self.fixed_amount()?;
        Ok(())
    }

    /// Requested amount as fixed-point, rejecting values it cannot hold exactly
    fn fixed_amount(&self) -> Result<Amount, ServiceError> {
        if !self.amount.is_finite() {
            return Err(ServiceError::InvalidRequest(format!(
                "amount must be finite, got {}",
                self.amount
            )));
        }
        Amount::try_from_f64(self.amount).ok_or_else(|| {
            ServiceError::InvalidRequest(format!(
                "amount {} is outside the supported range",
                self.amount
            ))
        })
    }

    /// Validate and convert into an immutable record
    pub fn into_record(self) -> Result<TransactionRecord, ServiceError> {
        self.validate()?;
        let amount = self.fixed_amount()?;
        Ok(TransactionRecord::new(
            self.transaction_id,
            self.user_id,
            amount,
            self.currency,
            self.timestamp,
        ))
    }
}
