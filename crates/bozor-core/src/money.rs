//! # Money
//!
//! Every amount in the ledger (prices, line totals, amounts paid, debt) is
//! an `i64` count of the smallest currency unit.
//!
//! A debtor's balance has to equal the sum of its open debt items exactly.
//! With integer minor units that check is a plain comparison; with floats it
//! drifts after enough partial payments.
//!
//! ```rust
//! use bozor_core::money::Money;
//!
//! let debt: Money = [500, 500, 200].into_iter().map(Money::from_minor).sum();
//! assert_eq!(debt.to_string(), "12.00");
//! ```

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// An amount in minor units. Serializes as a bare integer.
///
/// Signed so a debt delta between two sale versions fits in one value.
/// Stored balances never go below zero; the ledgers see to that.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    pub const fn zero() -> Self {
        Money(0)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub const fn abs(self) -> Self {
        Money(self.0.abs())
    }

    pub const fn checked_add(self, rhs: Money) -> Option<Money> {
        match self.0.checked_add(rhs.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    pub const fn checked_sub(self, rhs: Money) -> Option<Money> {
        match self.0.checked_sub(rhs.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Sums caller-supplied amounts, `None` if the total leaves `i64`.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Money> {
        let total: i128 = amounts.into_iter().map(|m| i128::from(m.0)).sum();
        i64::try_from(total).ok().map(Money)
    }
}

/// `major.minor` with two digits; no currency symbol.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        let units = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, units / 100, units % 100)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

/// Saturates at the `i64` bounds. Use [`Money::checked_sum`] on amounts
/// that have not been validated yet.
impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        Money(iter.fold(0i64, |acc, m| acc.saturating_add(m.0)))
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_pads_minor_units() {
        assert_eq!(Money::from_minor(20000).to_string(), "200.00");
        assert_eq!(Money::from_minor(1099).to_string(), "10.99");
        assert_eq!(Money::from_minor(-550).to_string(), "-5.50");
        assert_eq!(Money::from_minor(-5).to_string(), "-0.05");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_debt_delta_arithmetic() {
        let old_debt = Money::from_minor(300);
        let new_debt = Money::from_minor(1000);

        let delta = old_debt - new_debt;
        assert!(delta.is_negative());
        assert_eq!(delta.abs().minor(), 700);

        let mut balance = Money::zero();
        balance += new_debt;
        balance -= Money::from_minor(250);
        assert_eq!(balance.minor(), 750);
        assert!(balance.is_positive());
        assert!(!balance.is_zero());
    }

    #[test]
    fn test_sum_of_remaining_amounts() {
        let items = vec![Money::from_minor(500), Money::from_minor(300), Money::from_minor(200)];
        let by_ref: Money = items.iter().sum();
        let by_value: Money = items.into_iter().sum();
        assert_eq!(by_ref.minor(), 1000);
        assert_eq!(by_value, by_ref);
    }

    #[test]
    fn test_checked_arithmetic_reports_overflow() {
        let big = Money::from_minor(i64::MAX / 2 + 1);

        assert_eq!(big.checked_add(big), None);
        assert_eq!(Money::from_minor(i64::MIN).checked_sub(Money::from_minor(1)), None);
        assert_eq!(
            Money::from_minor(700).checked_sub(Money::from_minor(200)),
            Some(Money::from_minor(500))
        );

        assert_eq!(Money::checked_sum([big, big]), None);
        assert_eq!(
            Money::checked_sum([Money::from_minor(500), Money::from_minor(300)]),
            Some(Money::from_minor(800))
        );
        // A negative term can bring an oversized running total back in range.
        assert_eq!(
            Money::checked_sum([big, big, Money::from_minor(-(i64::MAX / 2 + 1))]),
            Some(big)
        );

        let saturated: Money = [big, big].into_iter().sum();
        assert_eq!(saturated.minor(), i64::MAX);
    }

    #[test]
    fn test_serializes_as_plain_number() {
        let json = serde_json::to_string(&Money::from_minor(20000)).unwrap();
        assert_eq!(json, "20000");
        let back: Money = serde_json::from_str("150").unwrap();
        assert_eq!(back.minor(), 150);
    }
}
