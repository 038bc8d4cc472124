//! # Validation Module
//!
//! Input validation utilities for BookOn.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Frontend (TypeScript)                                        │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: axum handler (Rust)                                          │
//! │  ├── Type validation (serde deserialization)                           │
//! │  └── THIS MODULE: Business rule validation                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (PostgreSQL)                                        │
//! │  ├── CHECK constraints (amounts, status values)                        │
//! │  ├── UNIQUE constraints (payment references, webhook ids)              │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bookon_core::validation::{validate_id, validate_positive_amount};
//! use bookon_core::Money;
//!
//! validate_id("bookingId", "550e8400-e29b-41d4-a716-446655440000").unwrap();
//! validate_positive_amount("amount", Money::from_pence(1250)).unwrap();
//! ```

use uuid::Uuid;

use crate::error::ValidationError;
use crate::money::Money;
use crate::MAX_BULK_IDS;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum notification title length.
pub const MAX_TITLE_LEN: usize = 200;

/// Maximum notification message length.
pub const MAX_MESSAGE_LEN: usize = 5_000;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a UUID string id.
///
/// ## Example
/// ```rust
/// use bookon_core::validation::validate_id;
///
/// assert!(validate_id("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_id("id", "").is_err());
/// assert!(validate_id("id", "booking-1").is_err());
/// ```
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    Uuid::parse_str(id).map_err(|e| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: e.to_string(),
    })?;

    Ok(())
}

/// Validates a TFC payment reference (`PREFIX-XXXXXXXX`).
///
/// ## Rules
/// - Prefix of 1-10 uppercase letters
/// - A hyphen
/// - Exactly 8 uppercase hex digits
pub fn validate_payment_reference(reference: &str) -> ValidationResult<()> {
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "paymentReference".to_string(),
        reason: reason.to_string(),
    };

    let (prefix, code) = reference
        .split_once('-')
        .ok_or_else(|| invalid("expected PREFIX-XXXXXXXX"))?;

    if prefix.is_empty() || prefix.len() > 10 || !prefix.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(invalid("prefix must be 1-10 uppercase letters"));
    }

    if code.len() != 8
        || !code
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
    {
        return Err(invalid("code must be 8 uppercase hex digits"));
    }

    Ok(())
}

/// Validates a bulk id list and returns it deduplicated, first occurrence
/// order preserved.
///
/// ## Rules
/// - At least one id
/// - At most [`MAX_BULK_IDS`] ids before deduplication
///
/// Individual ids are NOT validated here: a malformed id is reported as a
/// per-item failure, not a request failure.
pub fn validate_bulk_ids(ids: &[String]) -> ValidationResult<Vec<String>> {
    if ids.is_empty() {
        return Err(ValidationError::Required {
            field: "ids".to_string(),
        });
    }

    if ids.len() > MAX_BULK_IDS {
        return Err(ValidationError::OutOfRange {
            field: "ids".to_string(),
            min: 1,
            max: MAX_BULK_IDS as i64,
        });
    }

    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    Ok(ids
        .iter()
        .map(|id| id.trim().to_string())
        .filter(|id| seen.insert(id.clone()))
        .collect())
}

// =============================================================================
// Text Validators
// =============================================================================

/// Validates required free text with a maximum length.
///
/// ## Returns
/// The trimmed text.
pub fn validate_text(field: &str, text: &str, max: usize) -> ValidationResult<String> {
    let text = text.trim();

    if text.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if text.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(text.to_string())
}

// =============================================================================
// Amount Validators
// =============================================================================

/// Validates an amount that must be strictly positive.
pub fn validate_positive_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates an amount that may be zero but not negative.
///
/// ## Example
/// ```rust
/// use bookon_core::validation::validate_non_negative_amount;
/// use bookon_core::Money;
///
/// assert!(validate_non_negative_amount("amount", Money::zero()).is_ok());
/// assert!(validate_non_negative_amount("amount", Money::from_pence(-1)).is_err());
/// ```
pub fn validate_non_negative_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_id("id", "  ").is_err());
        assert!(matches!(
            validate_id("id", "nope"),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_validate_payment_reference() {
        assert!(validate_payment_reference("TFC-0A1B2C3D").is_ok());
        assert!(validate_payment_reference("TFC-0a1b2c3d").is_err());
        assert!(validate_payment_reference("TFC-0A1B2C3").is_err());
        assert!(validate_payment_reference("TFC0A1B2C3D").is_err());
        assert!(validate_payment_reference("-0A1B2C3D").is_err());
    }

    #[test]
    fn test_validate_bulk_ids_dedupes() {
        let ids = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        assert_eq!(validate_bulk_ids(&ids).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_validate_bulk_ids_limits() {
        assert!(validate_bulk_ids(&[]).is_err());

        let too_many: Vec<String> = (0..=MAX_BULK_IDS).map(|i| i.to_string()).collect();
        assert!(validate_bulk_ids(&too_many).is_err());
    }

    #[test]
    fn test_validate_text() {
        assert_eq!(validate_text("title", "  Hello ", 10).unwrap(), "Hello");
        assert!(validate_text("title", "", 10).is_err());
        assert!(validate_text("title", &"x".repeat(11), 10).is_err());
    }

    #[test]
    fn test_amount_validators() {
        assert!(validate_positive_amount("amount", Money::from_pence(1)).is_ok());
        assert!(validate_positive_amount("amount", Money::zero()).is_err());
        assert!(validate_non_negative_amount("amount", Money::zero()).is_ok());
    }
}
