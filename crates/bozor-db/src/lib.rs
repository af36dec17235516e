//! # bozor-db: Storage for the Bozor Ledger
//!
//! SQLite access through sqlx: the pool, embedded migrations, and one
//! repository per table group.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SaleCoordinator / StockLedger / DebtorLedger  (bozor-ledger)          │
//! │       │  db.begin() → &mut *tx                                         │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     bozor-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   Database (pool.rs)   Repositories          Migrations         │   │
//! │  │   SqlitePool           Stock / Debtor        001_initial        │   │
//! │  │   begin()              Sale / Market                            │   │
//! │  │                        Audit (pool only)                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bozor_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("bozor.db")).await?;
//! let mut tx = db.begin().await?;
//! let item = db.stock().get(&mut tx, "apple").await?;
//! tx.commit().await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::{
    AuditRepository, DebtorRepository, MarketRepository, SaleRepository, StockRepository,
};
