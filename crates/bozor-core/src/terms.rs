//! # Payment Terms
//!
//! Resolves how a sale is paid (method, paid amount, debt amount, debtor)
//! and plans the debt movements an edit requires. Pure functions: the
//! coordinator executes the resulting plan inside its unit of work.
//!
//! ## Update Planning
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  patch                               debt steps                         │
//! │  ─────                               ──────────                         │
//! │  isReturned: false on returned  →    InvalidTransition                 │
//! │  anything on returned sale      →    InvalidTransition                 │
//! │  isReturned: true               →    restock + PayOff(full debt)       │
//! │  paymentMethod changed          →    PayOff(old debt), Add(new debt)   │
//! │  debtorId changed (debt sale)   →    PayOff(old debtor), Add(new)      │
//! │  debtAmount changed             →    Add(delta) or PayOff(|delta|)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The debt-amount edit applies the raw delta; it does not work out which
//! line items the delta corresponds to.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{PaymentMethod, Sale, SalePatch};
use crate::validation::validate_non_negative_amount;

// =============================================================================
// Sale Terms
// =============================================================================

/// Fully resolved payment terms of a sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleTerms {
    pub payment_method: PaymentMethod,
    pub amount_paid: Money,
    pub debt_amount: Money,
    pub debtor_id: Option<String>,
}

/// Resolves payment terms from possibly partial input.
///
/// ## Rules
/// - debt: `debtor_id` required; missing amounts are derived so that
///   `amount_paid + debt_amount == total`; both given must add up
/// - cash/card: `debt_amount` must be absent or zero; `amount_paid`
///   defaults to the total and must equal it
///
/// ## Example
/// ```rust
/// use bozor_core::money::Money;
/// use bozor_core::terms::resolve_terms;
/// use bozor_core::types::PaymentMethod;
///
/// let terms = resolve_terms(
///     PaymentMethod::Debt,
///     Money::from_minor(20000),
///     Some(Money::from_minor(5000)),
///     None,
///     Some("d1".to_string()),
/// )
/// .unwrap();
/// assert_eq!(terms.debt_amount.minor(), 15000);
/// ```
pub fn resolve_terms(
    method: PaymentMethod,
    total: Money,
    amount_paid: Option<Money>,
    debt_amount: Option<Money>,
    debtor_id: Option<String>,
) -> CoreResult<SaleTerms> {
    validate_non_negative_amount("totalAmount", total)?;
    if let Some(paid) = amount_paid {
        validate_non_negative_amount("amountPaid", paid)?;
    }
    if let Some(debt) = debt_amount {
        validate_non_negative_amount("debtAmount", debt)?;
    }

    match method {
        PaymentMethod::Debt => {
            if debtor_id.as_deref().map_or(true, |id| id.trim().is_empty()) {
                return Err(CoreError::terms(
                    "debtorId is required when paymentMethod is debt",
                ));
            }

            let (paid, debt) = match (amount_paid, debt_amount) {
                (Some(paid), Some(debt)) => (paid, debt),
                (Some(paid), None) => (paid, total - paid),
                (None, Some(debt)) => (total - debt, debt),
                (None, None) => (Money::zero(), total),
            };

            if paid.is_negative() || debt.is_negative() || paid.checked_add(debt) != Some(total) {
                return Err(CoreError::terms(format!(
                    "amountPaid ({}) + debtAmount ({}) must equal totalAmount ({})",
                    paid, debt, total
                )));
            }

            Ok(SaleTerms {
                payment_method: method,
                amount_paid: paid,
                debt_amount: debt,
                debtor_id,
            })
        }
        PaymentMethod::Cash | PaymentMethod::Card => {
            if debt_amount.map_or(false, |d| !d.is_zero()) {
                return Err(CoreError::terms(format!(
                    "debtAmount must be zero when paymentMethod is {}",
                    method
                )));
            }

            let paid = amount_paid.unwrap_or(total);
            if paid != total {
                return Err(CoreError::terms(format!(
                    "{} sale must be paid in full: amountPaid ({}) != totalAmount ({})",
                    method, paid, total
                )));
            }

            Ok(SaleTerms {
                payment_method: method,
                amount_paid: paid,
                debt_amount: Money::zero(),
                debtor_id,
            })
        }
    }
}

// =============================================================================
// Update Plan
// =============================================================================

/// A debt movement the coordinator must perform, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebtStep {
    /// Settle `amount` of the debtor's balance, oldest items first.
    PayOff { debtor_id: String, amount: Money },
    /// Add `amount` of new debt from this sale's lines.
    Add { debtor_id: String, amount: Money },
}

/// What `update_sale` has to do for a given patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    /// Put every line back into stock (the sale is being returned).
    pub restock: bool,
    pub debt_steps: Vec<DebtStep>,
    /// Terms the sale row ends up with.
    pub terms: SaleTerms,
    pub is_returned: bool,
    pub market_id: Option<String>,
}

impl UpdatePlan {
    /// True if nothing in storage needs to change besides the row itself.
    pub fn is_noop_for(&self, sale: &Sale) -> bool {
        !self.restock
            && self.debt_steps.is_empty()
            && self.is_returned == sale.is_returned
            && self.market_id == sale.market_id
            && self.terms == terms_of(sale)
    }
}

/// Current terms of a committed sale.
pub fn terms_of(sale: &Sale) -> SaleTerms {
    SaleTerms {
        payment_method: sale.payment_method,
        amount_paid: sale.amount_paid,
        debt_amount: sale.debt_amount,
        debtor_id: sale.debtor_id.clone(),
    }
}

/// Plans an edit of a committed sale.
pub fn plan_update(sale: &Sale, patch: &SalePatch) -> CoreResult<UpdatePlan> {
    let market_id = patch.market_id.clone().or_else(|| sale.market_id.clone());

    // Returned is terminal.
    if sale.is_returned {
        if patch.is_returned == Some(false) {
            return Err(CoreError::transition(
                &sale.id,
                "a returned sale cannot be restored",
            ));
        }
        if patch.touches_payment() || market_id != sale.market_id {
            return Err(CoreError::transition(
                &sale.id,
                "a returned sale cannot be edited",
            ));
        }
        return Ok(UpdatePlan {
            restock: false,
            debt_steps: Vec::new(),
            terms: terms_of(sale),
            is_returned: true,
            market_id,
        });
    }

    if patch.is_returned == Some(true) {
        if patch.touches_payment() {
            return Err(CoreError::terms(
                "a return cannot be combined with payment changes",
            ));
        }

        let debt_steps = sale
            .carried_debt()
            .map(|(debtor_id, amount)| DebtStep::PayOff {
                debtor_id: debtor_id.to_string(),
                amount,
            })
            .into_iter()
            .collect();

        return Ok(UpdatePlan {
            restock: true,
            debt_steps,
            terms: SaleTerms {
                payment_method: sale.payment_method,
                amount_paid: Money::zero(),
                debt_amount: Money::zero(),
                debtor_id: sale.debtor_id.clone(),
            },
            is_returned: true,
            market_id,
        });
    }

    let new_method = patch.payment_method.unwrap_or(sale.payment_method);
    let new_debtor = patch.debtor_id.clone().or_else(|| sale.debtor_id.clone());
    let method_changed = new_method != sale.payment_method;
    let debtor_changed = new_method.is_debt() && new_debtor != sale.debtor_id;

    // With neither amount given on an unchanged method, keep what the sale has.
    let (paid_in, debt_in) = if !method_changed
        && patch.amount_paid.is_none()
        && patch.debt_amount.is_none()
    {
        (Some(sale.amount_paid), Some(sale.debt_amount))
    } else {
        (patch.amount_paid, patch.debt_amount)
    };

    let terms = resolve_terms(new_method, sale.total_amount, paid_in, debt_in, new_debtor)?;

    let mut debt_steps = Vec::new();
    if method_changed || debtor_changed {
        if let Some((debtor_id, amount)) = sale.carried_debt() {
            debt_steps.push(DebtStep::PayOff {
                debtor_id: debtor_id.to_string(),
                amount,
            });
        }
        if terms.payment_method.is_debt() && terms.debt_amount.is_positive() {
            if let Some(debtor_id) = terms.debtor_id.as_ref() {
                debt_steps.push(DebtStep::Add {
                    debtor_id: debtor_id.clone(),
                    amount: terms.debt_amount,
                });
            }
        }
    } else if new_method.is_debt() {
        if let Some(debtor_id) = terms.debtor_id.as_ref() {
            let delta = terms.debt_amount - sale.debt_amount;
            if delta.is_positive() {
                debt_steps.push(DebtStep::Add {
                    debtor_id: debtor_id.clone(),
                    amount: delta,
                });
            } else if delta.is_negative() {
                debt_steps.push(DebtStep::PayOff {
                    debtor_id: debtor_id.clone(),
                    amount: delta.abs(),
                });
            }
        }
    }

    Ok(UpdatePlan {
        restock: false,
        debt_steps,
        terms,
        is_returned: false,
        market_id,
    })
}
