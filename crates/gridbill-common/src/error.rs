//! Error types for the GridBill platform
//!
//! Provides a unified error type and domain-specific error variants

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias using GridbillError
pub type Result<T> = std::result::Result<T, GridbillError>;

/// Unified error type for GridBill operations
#[derive(Debug, Error)]
pub enum GridbillError {
    // Bill generation errors
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Bill generation errors
///
/// Everything here is recoverable at the caller: the not-found and
/// already-billed variants abort a single generation call and are reported
/// per item in bulk mode; `NoActiveTariff` and `InvalidBillingCycle` are
/// configuration gaps surfaced to an operator, never retried automatically.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Meter reading not found: {0}")]
    ReadingNotFound(Uuid),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(Uuid),

    #[error("Consumer not found: {0}")]
    ConsumerNotFound(Uuid),

    #[error("Bill not found: {0}")]
    BillNotFound(Uuid),

    #[error("Meter reading {0} is already billed")]
    AlreadyBilled(Uuid),

    #[error("No unbilled reading for connection {connection_id} in {billing_month}/{billing_year}")]
    NoUnbilledReading {
        connection_id: Uuid,
        billing_month: u32,
        billing_year: i32,
    },

    #[error("No tariff plan active for utility type {utility_type_id} on {date}")]
    NoActiveTariff {
        utility_type_id: Uuid,
        date: NaiveDate,
    },

    #[error("Unsupported billing cycle length: {0} months")]
    InvalidBillingCycle(u32),

    #[error("Lost generation race for reading {0}")]
    ConcurrentGenerationConflict(Uuid),

    #[error("Current reading {current} is below previous reading {previous}")]
    InvalidReading {
        previous: Decimal,
        current: Decimal,
    },

    #[error("Payment amount must be positive, got {0}")]
    InvalidPaymentAmount(Decimal),
}

// Implement From for common external error types
impl From<serde_json::Error> for GridbillError {
    fn from(err: serde_json::Error) -> Self {
        GridbillError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for GridbillError {
    fn from(err: std::io::Error) -> Self {
        GridbillError::Storage(err.to_string())
    }
}

impl From<anyhow::Error> for GridbillError {
    fn from(err: anyhow::Error) -> Self {
        GridbillError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_display() {
        let id = Uuid::new_v4();
        let err = GridbillError::Generation(GenerationError::AlreadyBilled(id));
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_invalid_reading_error() {
        let err = GenerationError::InvalidReading {
            previous: dec!(150),
            current: dec!(100),
        };
        assert!(err.to_string().contains("100"));
        assert!(err.to_string().contains("150"));
    }
}
