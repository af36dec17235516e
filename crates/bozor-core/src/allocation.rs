//! # Debt Allocation
//!
//! Decides which debt items a payment settles.
//!
//! ## Oldest First
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  items (oldest → newest):   A:500    B:300    C:200                     │
//! │  payment:                   600                                        │
//! │                                                                         │
//! │  A: 500 <= 600  → removed, 100 left                                    │
//! │  B: 300 >  100  → reduced to 200, nothing left                         │
//! │  C:             → untouched                                            │
//! │                                                                         │
//! │  result:                    B:200    C:200                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! At most one item is ever partially reduced per payment, and it is always
//! the oldest item that survives. Which items a customer is considered to
//! have paid for depends on this rule, so it must not drift.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::DebtItem;

/// The effect of one payment on an ordered list of outstanding amounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// Indices (into the input) of items paid in full, in order.
    pub settled: Vec<usize>,
    /// The single item only partly paid: its index and new remaining amount.
    pub reduced: Option<(usize, Money)>,
}

impl Allocation {
    /// True if nothing is touched (zero payment).
    pub fn is_empty(&self) -> bool {
        self.settled.is_empty() && self.reduced.is_none()
    }
}

/// Plans a payment against outstanding amounts, oldest first.
///
/// Fails with [`CoreError::AmountExceedsDebt`] if `payment` is larger than
/// the sum of `outstanding`, and leaves nothing partially applied.
///
/// ## Example
/// ```rust
/// use bozor_core::allocation::allocate_oldest_first;
/// use bozor_core::money::Money;
///
/// let items = [500, 300, 200].map(Money::from_minor);
/// let plan = allocate_oldest_first(&items, Money::from_minor(600)).unwrap();
/// assert_eq!(plan.settled, vec![0]);
/// assert_eq!(plan.reduced, Some((1, Money::from_minor(200))));
/// ```
pub fn allocate_oldest_first(outstanding: &[Money], payment: Money) -> CoreResult<Allocation> {
    if payment.is_negative() {
        return Err(CoreError::terms("payment must not be negative"));
    }

    let total: Money = outstanding.iter().sum();
    if payment > total {
        return Err(CoreError::AmountExceedsDebt {
            outstanding: total,
            requested: payment,
        });
    }

    let mut left = payment;
    let mut settled = Vec::new();
    let mut reduced = None;

    for (idx, remaining) in outstanding.iter().copied().enumerate() {
        if left.is_zero() {
            break;
        }
        if remaining <= left {
            settled.push(idx);
            left -= remaining;
        } else {
            reduced = Some((idx, remaining - left));
            left = Money::zero();
        }
    }

    Ok(Allocation { settled, reduced })
}

/// Applies a payment to debt items in place, removing settled items.
///
/// Returns the allocation that was applied so callers can persist it.
pub fn apply_payment(items: &mut Vec<DebtItem>, payment: Money) -> CoreResult<Allocation> {
    let outstanding: Vec<Money> = items.iter().map(|i| i.remaining_amount).collect();
    let plan = allocate_oldest_first(&outstanding, payment)?;

    if let Some((idx, remaining)) = plan.reduced {
        items[idx].remaining_amount = remaining;
    }
    // Settled indices are ascending; remove from the back so earlier
    // indices stay valid.
    for idx in plan.settled.iter().rev() {
        items.remove(*idx);
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn amounts(values: &[i64]) -> Vec<Money> {
        values.iter().copied().map(Money::from_minor).collect()
    }

    fn item(name: &str, remaining: i64) -> DebtItem {
        DebtItem {
            id: name.to_string(),
            product_id: format!("p-{}", name),
            product_name: name.to_string(),
            quantity: 1,
            unit: "piece".to_string(),
            price_per_unit: Money::from_minor(remaining),
            remaining_amount: Money::from_minor(remaining),
            source_sale_id: "s1".to_string(),
            debt_date: Utc::now(),
        }
    }

    #[test]
    fn test_payment_consumes_exact_prefix() {
        let mut items = vec![item("A", 500), item("B", 300), item("C", 200)];
        let plan = apply_payment(&mut items, Money::from_minor(800)).unwrap();

        assert_eq!(plan.settled, vec![0, 1]);
        assert_eq!(plan.reduced, None);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "C");
        assert_eq!(items[0].remaining_amount.minor(), 200);
    }

    #[test]
    fn test_payment_of_600_over_500_300_200() {
        let mut items = vec![item("A", 500), item("B", 300), item("C", 200)];
        apply_payment(&mut items, Money::from_minor(600)).unwrap();

        let left: Vec<(&str, i64)> = items
            .iter()
            .map(|i| (i.id.as_str(), i.remaining_amount.minor()))
            .collect();
        assert_eq!(left, vec![("B", 200), ("C", 200)]);
    }

    #[test]
    fn test_partial_touches_only_oldest_survivor() {
        let plan = allocate_oldest_first(&amounts(&[500, 300, 200]), Money::from_minor(100)).unwrap();
        assert!(plan.settled.is_empty());
        assert_eq!(plan.reduced, Some((0, Money::from_minor(400))));
    }

    #[test]
    fn test_full_payment_clears_everything() {
        let mut items = vec![item("A", 500), item("B", 300), item("C", 200)];
        let plan = apply_payment(&mut items, Money::from_minor(1000)).unwrap();
        assert_eq!(plan.settled, vec![0, 1, 2]);
        assert!(items.is_empty());
    }

    #[test]
    fn test_overpayment_rejected_without_change() {
        let mut items = vec![item("A", 500)];
        let err = apply_payment(&mut items, Money::from_minor(501)).unwrap_err();
        assert!(matches!(err, CoreError::AmountExceedsDebt { .. }));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].remaining_amount.minor(), 500);
    }

    #[test]
    fn test_zero_payment_is_noop() {
        let plan = allocate_oldest_first(&amounts(&[500]), Money::zero()).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_sum_preserved() {
        let mut items = vec![item("A", 250), item("B", 250), item("C", 250), item("D", 250)];
        apply_payment(&mut items, Money::from_minor(610)).unwrap();
        let left: Money = items.iter().map(|i| i.remaining_amount).sum();
        assert_eq!(left.minor(), 390);
        assert_eq!(items[0].id, "C");
        assert_eq!(items[0].remaining_amount.minor(), 140);
    }
}
