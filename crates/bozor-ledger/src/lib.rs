//! # bozor-ledger: Sale Settlement Engine
//!
//! Records market sales against stock and customer credit. One sale moves
//! stock, optionally adds debt to a debtor, and writes the sale row, all in
//! one SQLite transaction. Audit entries and change events follow the commit
//! and never undo it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  caller (API layer, already authorised) ──► Actor + request            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  bozor-ledger (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │  SaleCoordinator ──► StockLedger / DebtorLedger                │   │
//! │  │        │                   │                                    │   │
//! │  │        │                   ▼                                    │   │
//! │  │        │             UnitOfWork (sqlx transaction)              │   │
//! │  │        │                   │ commit                             │   │
//! │  │        ▼                   ▼                                    │   │
//! │  │   Notifier ──► AuditRecorder ──► audit_entries                 │   │
//! │  │            └─► EventBroadcaster ──► EventBus (memory | redis)  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  bozor-db (repositories) ──► bozor-core (types, terms, allocation)     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`coordinator`] - create/update/delete sales
//! - [`stock`] - stock decrements and restocks
//! - [`debtor`] - debt accrual and oldest-first payoff
//! - [`unit_of_work`] - transaction plus queued side effects
//! - [`audit`] - audit trail recorder
//! - [`broadcast`] - change event fan-out
//! - [`engine`] - wiring from configuration
//! - [`config`] - TOML + environment configuration
//! - [`telemetry`] - tracing subscriber setup
//! - [`error`] - error types

pub mod audit;
pub mod broadcast;
pub mod config;
pub mod coordinator;
pub mod debtor;
pub mod engine;
pub mod error;
pub mod stock;
pub mod telemetry;
pub mod unit_of_work;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use audit::{AuditRecorder, AuditStore};
pub use broadcast::{BusError, EventBroadcaster, EventBus, InMemoryEventBus, RedisEventBus, Subscription};
pub use config::{EventBackend, LedgerConfig};
pub use coordinator::SaleCoordinator;
pub use debtor::DebtorLedger;
pub use engine::Ledger;
pub use error::{ConfigError, ErrorCode, LedgerError, LedgerResult};
pub use stock::StockLedger;
pub use unit_of_work::{Committed, Notifier, UnitOfWork};
