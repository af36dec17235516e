//! # bozor-core: Pure Business Logic for Bozor Ledger
//!
//! Everything the settlement engine decides without talking to storage:
//! the domain types, integer money, payment terms, and the oldest-first
//! debt allocation.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   bozor-ledger (coordinator, ledgers, audit, events)                   │
//! │        │                    │                                           │
//! │        ▼                    ▼                                           │
//! │   bozor-db (SQL)  ──►  bozor-core (THIS CRATE, no I/O)                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - StockItem, Sale, Debtor, AuditEntry, requests
//! - [`money`] - Money type with integer arithmetic
//! - [`allocation`] - Oldest-first debt payoff
//! - [`terms`] - Payment terms resolution and update planning
//! - [`event`] - Change events and their channels
//! - [`validation`] - Request shape checks
//! - [`error`] - Domain error types

pub mod allocation;
pub mod error;
pub mod event;
pub mod money;
pub mod terms;
pub mod types;
pub mod validation;

// =============================================================================
// Limits
// =============================================================================

/// Most lines a single sale may carry.
pub const MAX_SALE_LINES: usize = 500;

/// Largest quantity a single line or stock movement may carry.
pub const MAX_QUANTITY: i64 = 1_000_000_000;

/// Largest amount, in minor units, any price, total or payment may carry.
///
/// `MAX_SALE_LINES * MAX_AMOUNT_MINOR` stays well inside `i64`, so summing a
/// validated sale cannot overflow.
pub const MAX_AMOUNT_MINOR: i64 = 1_000_000_000_000_000;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use event::{Channel, ChangeEvent, Snapshot};
pub use money::Money;
pub use terms::{DebtStep, SaleTerms, UpdatePlan};
pub use types::{
    Actor, AuditAction, AuditEntry, CreateSaleRequest, DebtItem, Debtor, EntityType, Market,
    PaymentMethod, Sale, SalePatch, SoldLine, StockItem,
};
