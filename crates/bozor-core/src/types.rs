//! # Domain Types
//!
//! Plain data structs for the settlement engine. Persistence lives in
//! bozor-db; these types carry no behaviour beyond small derived queries.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   StockItem     │   │      Sale       │   │     Debtor      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │◄──│  lines[]        │   │  id             │       │
//! │  │  name (unique)  │   │  total_amount   │   │  name (unique)  │       │
//! │  │  unit_price     │   │  amount_paid    │──►│  current_debt   │       │
//! │  │  quantity >= 0  │   │  debt_amount    │   │  debt_items[]   │       │
//! │  └─────────────────┘   │  is_returned    │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! │                                                                         │
//! │  AuditEntry: append-only record of every mutation                      │
//! │  Market:     collaborator, only existence is checked                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Field names are camelCase on the wire because dashboards and clients
//! already speak that shape.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, ValidationError};
use crate::money::Money;

// =============================================================================
// Actor
// =============================================================================

/// An already-authenticated caller. Authorization happens before the
/// coordinator is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Actor { id: id.into() }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a sale was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    /// Goods handed over on credit; requires a debtor.
    Debt,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Debt => "debt",
        }
    }

    pub fn is_debt(&self) -> bool {
        matches!(self, PaymentMethod::Debt)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "debt" => Ok(PaymentMethod::Debt),
            other => Err(CoreError::terms(format!(
                "unknown payment method '{}', expected cash, card or debt",
                other
            ))),
        }
    }
}

// =============================================================================
// Stock Item
// =============================================================================

/// A product the vendor keeps on hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockItem {
    pub id: String,

    /// Unique display name ("Apple").
    pub name: String,

    pub unit_price: Money,

    /// Unit label ("kg", "piece").
    pub unit: String,

    /// Available quantity, never negative.
    pub quantity: i64,

    pub description: Option<String>,

    pub created_by: Option<String>,
    pub updated_by: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Sale
// =============================================================================

/// One line of a sale. Owned by the sale and removed with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SoldLine {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit: String,
    #[serde(rename = "pricePerUnit")]
    pub unit_price: Money,
    #[serde(rename = "totalItemAmount")]
    pub line_total: Money,
}

/// A committed sale.
///
/// ## Invariants
/// - `total_amount == Σ lines.line_total`
/// - debt sale that is not returned: `amount_paid + debt_amount == total_amount`
/// - cash/card sale: `debt_amount == 0`
/// - `is_returned` only ever moves false → true
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: String,

    #[serde(rename = "productsSold")]
    pub lines: Vec<SoldLine>,

    pub total_amount: Money,
    pub amount_paid: Money,
    pub debt_amount: Money,
    pub payment_method: PaymentMethod,
    pub is_returned: bool,
    pub debtor_id: Option<String>,
    pub market_id: Option<String>,

    pub created_by: String,
    pub updated_by: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// Sum of the line totals.
    pub fn lines_total(&self) -> Money {
        self.lines.iter().map(|l| l.line_total).sum()
    }

    /// The debtor and amount this sale currently holds on credit, if any.
    pub fn carried_debt(&self) -> Option<(&str, Money)> {
        match (&self.payment_method, self.debtor_id.as_deref()) {
            (PaymentMethod::Debt, Some(debtor_id)) if self.debt_amount.is_positive() => {
                Some((debtor_id, self.debt_amount))
            }
            _ => None,
        }
    }
}

// =============================================================================
// Debtor
// =============================================================================

/// An unpaid portion of a sold line, oldest first in [`Debtor::debt_items`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DebtItem {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit: String,
    pub price_per_unit: Money,
    /// What is still owed on this item.
    pub remaining_amount: Money,
    pub source_sale_id: String,
    #[ts(as = "String")]
    pub debt_date: DateTime<Utc>,
}

/// A customer buying on credit.
///
/// `current_debt == Σ debt_items.remaining_amount` at all times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Debtor {
    pub id: String,
    pub name: String,
    pub contact_info: Option<String>,

    #[serde(rename = "currentDebtAmount")]
    pub current_debt: Money,

    pub debt_items: Vec<DebtItem>,

    pub created_by: Option<String>,
    pub updated_by: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Debtor {
    pub fn items_total(&self) -> Money {
        self.debt_items.iter().map(|i| i.remaining_amount).sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.items_total() == self.current_debt
    }
}

// =============================================================================
// Market
// =============================================================================

/// A market (bazaar) a sale can be attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    pub name: String,
}

// =============================================================================
// Audit
// =============================================================================

/// Action codes written to the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CreateSale,
    UpdateSale,
    DeleteSale,
    DecreaseStockQuantity,
    IncreaseStockQuantity,
    DebtorDebtUpdate,
    DebtorPayment,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CreateSale => "CREATE_SALE",
            AuditAction::UpdateSale => "UPDATE_SALE",
            AuditAction::DeleteSale => "DELETE_SALE",
            AuditAction::DecreaseStockQuantity => "DECREASE_STOCK_QUANTITY",
            AuditAction::IncreaseStockQuantity => "INCREASE_STOCK_QUANTITY",
            AuditAction::DebtorDebtUpdate => "DEBTOR_DEBT_UPDATE",
            AuditAction::DebtorPayment => "DEBTOR_PAYMENT",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of entity an audit entry is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "PascalCase"))]
#[ts(export)]
pub enum EntityType {
    Sale,
    Stock,
    Debtor,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Sale => "Sale",
            EntityType::Stock => "Stock",
            EntityType::Debtor => "Debtor",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub action: AuditAction,
    pub entity_type: EntityType,
    pub entity_id: String,
    /// Old/new values relevant to the action.
    #[ts(type = "Record<string, unknown>")]
    pub details: serde_json::Value,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    pub actor_id: String,
}

// =============================================================================
// Requests
// =============================================================================

/// Input to `create_sale`.
///
/// ```json
/// {
///   "productsSold": [{ "productId": "...", "productName": "Apple", "quantity": 4,
///                      "unit": "kg", "pricePerUnit": 5000, "totalItemAmount": 20000 }],
///   "totalAmount": 20000,
///   "paymentMethod": "debt",
///   "debtorId": "..."
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    pub products_sold: Vec<SoldLine>,
    pub total_amount: Money,
    #[serde(default)]
    pub amount_paid: Option<Money>,
    #[serde(default)]
    pub debt_amount: Option<Money>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub debtor_id: Option<String>,
    #[serde(default)]
    pub market_id: Option<String>,
}

/// Input to `update_sale`. Absent fields are left unchanged; lines and the
/// total are fixed once a sale is committed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SalePatch {
    #[serde(default)]
    pub is_returned: Option<bool>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub amount_paid: Option<Money>,
    #[serde(default)]
    pub debt_amount: Option<Money>,
    #[serde(default)]
    pub debtor_id: Option<String>,
    #[serde(default)]
    pub market_id: Option<String>,
}

impl SalePatch {
    /// True if the patch touches how the sale was paid.
    pub fn touches_payment(&self) -> bool {
        self.payment_method.is_some()
            || self.amount_paid.is_some()
            || self.debt_amount.is_some()
            || self.debtor_id.is_some()
    }
}

impl CreateSaleRequest {
    /// Checks the request's lines against its total.
    pub fn check_lines(&self) -> Result<(), ValidationError> {
        crate::validation::validate_lines(&self.products_sold, self.total_amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(amount: i64) -> SoldLine {
        SoldLine {
            product_id: "p1".to_string(),
            product_name: "Apple".to_string(),
            quantity: 1,
            unit: "kg".to_string(),
            unit_price: Money::from_minor(amount),
            line_total: Money::from_minor(amount),
        }
    }

    #[test]
    fn test_payment_method_parse() {
        assert_eq!("DEBT".parse::<PaymentMethod>().unwrap(), PaymentMethod::Debt);
        assert_eq!("cash".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert!("barter".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_request_wire_shape() {
        let json = r#"{
            "productsSold": [{
                "productId": "p1", "productName": "Apple", "quantity": 4,
                "unit": "kg", "pricePerUnit": 5000, "totalItemAmount": 20000
            }],
            "totalAmount": 20000,
            "paymentMethod": "debt",
            "debtorId": "d1"
        }"#;
        let req: CreateSaleRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.products_sold[0].line_total.minor(), 20000);
        assert_eq!(req.payment_method, PaymentMethod::Debt);
        assert_eq!(req.amount_paid, None);
        assert_eq!(req.market_id, None);
    }

    #[test]
    fn test_sale_carried_debt() {
        let now = Utc::now();
        let mut sale = Sale {
            id: "s1".to_string(),
            lines: vec![line(300), line(200)],
            total_amount: Money::from_minor(500),
            amount_paid: Money::from_minor(100),
            debt_amount: Money::from_minor(400),
            payment_method: PaymentMethod::Debt,
            is_returned: false,
            debtor_id: Some("d1".to_string()),
            market_id: None,
            created_by: "u1".to_string(),
            updated_by: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(sale.lines_total().minor(), 500);
        assert_eq!(sale.carried_debt(), Some(("d1", Money::from_minor(400))));

        sale.payment_method = PaymentMethod::Cash;
        assert_eq!(sale.carried_debt(), None);
    }

    #[test]
    fn test_audit_action_codes() {
        assert_eq!(AuditAction::DebtorPayment.as_str(), "DEBTOR_PAYMENT");
        let json = serde_json::to_string(&AuditAction::DecreaseStockQuantity).unwrap();
        assert_eq!(json, "\"DECREASE_STOCK_QUANTITY\"");
    }

    #[test]
    fn test_patch_touches_payment() {
        assert!(!SalePatch::default().touches_payment());
        let patch = SalePatch {
            is_returned: Some(true),
            market_id: Some("m1".to_string()),
            ..Default::default()
        };
        assert!(!patch.touches_payment());
        let patch = SalePatch {
            debt_amount: Some(Money::zero()),
            ..Default::default()
        };
        assert!(patch.touches_payment());
    }
}
