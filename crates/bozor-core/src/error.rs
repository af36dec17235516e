//! # Error Types
//!
//! Domain-specific error types for bozor-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bozor-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bozor-db errors                                                       │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  bozor-ledger errors                                                   │
//! │  └── LedgerError      - What callers of the coordinator see            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError ─┐                                  │
//! │                           DbError  ─┴→ LedgerError → caller            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations detected without touching storage.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A payment is larger than the debt it is meant to settle.
    ///
    /// ## When This Occurs
    /// - Paying off more than the debtor owes
    /// - Pre-settling more than the new debt items are worth
    #[error("Payment of {requested} exceeds outstanding debt of {outstanding}")]
    AmountExceedsDebt { outstanding: Money, requested: Money },

    /// The combination of payment method and amounts is inconsistent.
    ///
    /// ## When This Occurs
    /// - `paymentMethod == debt` without a `debtorId`
    /// - `amountPaid + debtAmount != totalAmount` on a debt sale
    /// - A non-zero `debtAmount` on a cash or card sale
    /// - Returning a sale and editing its payment in the same patch
    #[error("Invalid payment terms: {reason}")]
    InvalidPaymentTerms { reason: String },

    /// The sale is in a state that does not allow the requested change.
    ///
    /// ## When This Occurs
    /// - Un-returning a returned sale
    /// - Editing anything on a returned sale
    #[error("Sale {sale_id}: {reason}")]
    InvalidTransition { sale_id: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    pub fn terms(reason: impl Into<String>) -> Self {
        CoreError::InvalidPaymentTerms {
            reason: reason.into(),
        }
    }

    pub fn transition(sale_id: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidTransition {
            sale_id: sale_id.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Value is outside the accepted range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Two values that must agree do not.
    #[error("{field} is {actual}, expected {expected}")]
    Mismatch {
        field: String,
        expected: String,
        actual: String,
    },
}

// =============================================================================
// Result Type Alias
// =============================================================================

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::AmountExceedsDebt {
            outstanding: Money::from_minor(1000),
            requested: Money::from_minor(1500),
        };
        assert_eq!(
            err.to_string(),
            "Payment of 15.00 exceeds outstanding debt of 10.00"
        );

        let err = ValidationError::Mismatch {
            field: "totalAmount".to_string(),
            expected: "200.00".to_string(),
            actual: "150.00".to_string(),
        };
        assert_eq!(err.to_string(), "totalAmount is 150.00, expected 200.00");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let err: CoreError = ValidationError::Required {
            field: "productsSold".to_string(),
        }
        .into();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
