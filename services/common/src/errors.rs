//! Common error types for services

use thiserror::Error;

/// Service error types
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Invalid request error
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Resource already exists (duplicate key on create)
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// Service unavailable error
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    /// HTTP-style status code the web layer should map this error to
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) | Self::AlreadyExists(_) => 400,
            Self::ServiceUnavailable(_) => 503,
            Self::InternalError(_) => 500,
        }
    }
}
