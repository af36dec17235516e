//! # Validation Module
//!
//! Input checks that run before any unit of work is opened.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (shape of the request)                           │
//! │  ├── lines present, quantities and amounts within limits               │
//! │  └── totalAmount == Σ totalItemAmount                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: terms.rs (payment method vs amounts)                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: ledgers inside the transaction                               │
//! │  ├── stock available (conditional UPDATE)                              │
//! │  └── debt outstanding (conditional UPDATE)                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::SoldLine;
use crate::{MAX_AMOUNT_MINOR, MAX_QUANTITY, MAX_SALE_LINES};

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length of a stock item or debtor name.
pub const MAX_NAME_LEN: usize = 200;

/// Validates a quantity moved in or out of stock.
///
/// ```rust
/// use bozor_core::validation::validate_quantity;
///
/// assert!(validate_quantity(4).is_ok());
/// assert!(validate_quantity(0).is_err());
/// assert!(validate_quantity(i64::MAX).is_err());
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_QUANTITY,
        });
    }

    Ok(())
}

/// Validates an amount that must be strictly positive (debt added, payment).
pub fn validate_positive_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    check_amount_ceiling(field, amount, 1)
}

pub fn validate_non_negative_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    check_amount_ceiling(field, amount, 0)
}

fn check_amount_ceiling(field: &str, amount: Money, min: i64) -> ValidationResult<()> {
    if amount.minor() > MAX_AMOUNT_MINOR {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min,
            max: MAX_AMOUNT_MINOR,
        });
    }
    Ok(())
}

/// Validates a display name for a stock item or debtor.
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }
    Ok(())
}

/// Validates the sold lines of a sale against its declared total.
///
/// ## Rules
/// - Between one and `MAX_SALE_LINES` lines
/// - Every line has a product id, a quantity in `1..=MAX_QUANTITY` and
///   amounts in `0..=MAX_AMOUNT_MINOR`
/// - `total == Σ line_total`
///
/// Line totals are taken as given rather than recomputed from
/// `unit_price * quantity`, so negotiated prices survive.
pub fn validate_lines(lines: &[SoldLine], total: Money) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "productsSold".to_string(),
        });
    }
    if lines.len() > MAX_SALE_LINES {
        return Err(ValidationError::OutOfRange {
            field: "productsSold".to_string(),
            min: 1,
            max: MAX_SALE_LINES as i64,
        });
    }
    validate_non_negative_amount("totalAmount", total)?;

    for line in lines {
        if line.product_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "productId".to_string(),
            });
        }
        validate_quantity(line.quantity)?;
        validate_non_negative_amount("pricePerUnit", line.unit_price)?;
        validate_non_negative_amount("totalItemAmount", line.line_total)?;
    }

    let sum = Money::checked_sum(lines.iter().map(|l| l.line_total)).ok_or_else(|| {
        ValidationError::OutOfRange {
            field: "totalAmount".to_string(),
            min: 0,
            max: i64::MAX,
        }
    })?;
    if sum != total {
        return Err(ValidationError::Mismatch {
            field: "totalAmount".to_string(),
            expected: sum.to_string(),
            actual: total.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(qty: i64, total: i64) -> SoldLine {
        SoldLine {
            product_id: "p1".to_string(),
            product_name: "Apple".to_string(),
            quantity: qty,
            unit: "kg".to_string(),
            unit_price: Money::from_minor(total / qty.max(1)),
            line_total: Money::from_minor(total),
        }
    }

    #[test]
    fn test_validate_lines_ok() {
        let lines = vec![line(4, 20000), line(1, 500)];
        assert!(validate_lines(&lines, Money::from_minor(20500)).is_ok());
    }

    #[test]
    fn test_validate_lines_empty() {
        let err = validate_lines(&[], Money::zero()).unwrap_err();
        assert!(matches!(err, ValidationError::Required { .. }));
    }

    #[test]
    fn test_validate_lines_total_mismatch() {
        let err = validate_lines(&[line(4, 20000)], Money::from_minor(19000)).unwrap_err();
        assert!(matches!(err, ValidationError::Mismatch { .. }));
    }

    #[test]
    fn test_validate_lines_zero_quantity() {
        let err = validate_lines(&[line(0, 0)], Money::zero()).unwrap_err();
        assert!(matches!(err, ValidationError::MustBePositive { .. }));
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Apple").is_ok());
        assert!(validate_name("name", "   ").is_err());
        assert!(validate_name("name", &"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_huge_line_totals_rejected_not_wrapped() {
        let half = i64::MAX / 2 + 1;
        let lines = vec![line(1, half), line(1, half)];
        // Wraps to i64::MIN, which no non-negative total can match.
        let err = validate_lines(&lines, Money::from_minor(i64::MIN)).unwrap_err();
        assert!(matches!(err, ValidationError::MustNotBeNegative { .. }));

        let err = validate_lines(&lines, Money::zero()).unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { ref field, .. } if field == "pricePerUnit"));
    }

    #[test]
    fn test_limits_on_quantity_amount_and_line_count() {
        assert!(validate_quantity(MAX_QUANTITY).is_ok());
        assert!(matches!(
            validate_quantity(MAX_QUANTITY + 1).unwrap_err(),
            ValidationError::OutOfRange { max: MAX_QUANTITY, .. }
        ));

        let ceiling = Money::from_minor(MAX_AMOUNT_MINOR);
        assert!(validate_non_negative_amount("amount", ceiling).is_ok());
        assert!(validate_positive_amount("amount", Money::from_minor(MAX_AMOUNT_MINOR + 1)).is_err());

        let lines = vec![line(1, 100); MAX_SALE_LINES + 1];
        let total = Money::from_minor(100 * (MAX_SALE_LINES as i64 + 1));
        let err = validate_lines(&lines, total).unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { ref field, .. } if field == "productsSold"));

        let lines = vec![line(1, MAX_AMOUNT_MINOR); MAX_SALE_LINES];
        let total = Money::from_minor(MAX_AMOUNT_MINOR * MAX_SALE_LINES as i64);
        let err = validate_lines(&lines, total).unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { ref field, .. } if field == "totalAmount"));
    }

    #[test]
    fn test_amount_checks() {
        assert!(validate_positive_amount("amount", Money::from_minor(1)).is_ok());
        assert!(validate_positive_amount("amount", Money::zero()).is_err());
        assert!(validate_non_negative_amount("amount", Money::zero()).is_ok());
        assert!(validate_non_negative_amount("amount", Money::from_minor(-1)).is_err());
    }
}
