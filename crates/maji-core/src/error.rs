//! Error types for maji-billing.

use crate::ids::IdError;

/// Result type for maji-billing domain operations.
pub type Result<T> = std::result::Result<T, BillingError>;

/// Errors raised by domain validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BillingError {
    /// Payment amount is missing, non-numeric or not positive.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Metered quantity is not a finite, non-negative number.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// Tariff or threshold configuration is unusable.
    #[error("configuration error: {0}")]
    Configuration(String),
}
