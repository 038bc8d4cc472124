//! # Error Types
//!
//! Domain-specific error types for bookon-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bookon-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bookon-db errors (separate crate)                                     │
//! │  └── DbError          - Database failures (wraps CoreError raised      │
//! │                         inside a transaction)                          │
//! │                                                                         │
//! │  API errors (apps/api)                                                 │
//! │  └── ApiError         - What the frontend sees (JSON envelope)         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Frontend     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A state machine was asked to take an edge it does not have.
    ///
    /// ## When This Occurs
    /// - Marking a `paid` TFC booking as `part_paid`
    /// - Confirming a `cancelled` booking
    /// - Any same-state "transition"
    #[error("{entity} {id} cannot move from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        from: String,
        to: String,
    },

    /// A booking cannot be confirmed before its payment is confirmed.
    #[error("Booking {booking_id} cannot be confirmed: payment is {payment_status}")]
    PaymentNotConfirmed {
        booking_id: String,
        payment_status: String,
    },

    /// An amount is outside what the operation allows.
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// Franchise fee plus admin fee exceed the gross amount.
    #[error("Fees of {deductions} exceed gross amount {gross}")]
    FeesExceedGross { gross: Money, deductions: Money },

    /// Fee configuration is internally inconsistent.
    #[error("Invalid fee configuration: {reason}")]
    InvalidFeeConfig { reason: String },

    /// No fee configuration was in effect at the transaction date.
    #[error("No fee configuration in effect for business {business_account_id}")]
    NoFeeConfig { business_account_id: String },

    /// Wallet balance does not cover the requested redemption.
    #[error("Insufficient credit: available {available}, requested {requested}")]
    InsufficientCredit { available: Money, requested: Money },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates an InvalidTransition error from any displayable states.
    pub fn invalid_transition(
        entity: &'static str,
        id: impl Into<String>,
        from: impl Serialize + std::fmt::Debug,
        to: impl Serialize + std::fmt::Debug,
    ) -> Self {
        CoreError::InvalidTransition {
            entity,
            id: id.into(),
            from: wire_name(&from),
            to: wire_name(&to),
        }
    }

    /// Creates an InvalidAmount error.
    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        CoreError::InvalidAmount {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business rule runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, malformed reference).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

/// Serialized name of a status (`part_paid`), falling back to `Debug`.
pub(crate) fn wire_name<T: Serialize + std::fmt::Debug>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(name)) => name,
        _ => format!("{:?}", value),
    }
}
