//! # Repositories
//!
//! One repository per table group. Apart from [`AuditRepository`], every
//! repository is a stateless unit struct whose methods take the connection
//! to run on:
//!
//! ```text
//! let mut tx = db.begin().await?;
//! db.stock().try_decrement(&mut tx, "apple", 2, actor, now).await?;
//! db.sales().insert(&mut tx, &sale).await?;
//! tx.commit().await?;
//! ```
//!
//! Passing a transaction makes the calls atomic; passing a pooled
//! connection runs each statement on its own.
//!
//! - [`StockRepository`] - stock quantities, conditional decrement
//! - [`DebtorRepository`] - debtor balances and their debt items
//! - [`SaleRepository`] - sales and sold lines
//! - [`MarketRepository`] - market lookups
//! - [`AuditRepository`] - append-only audit trail

pub mod audit;
pub mod debtor;
pub mod market;
pub mod sale;
pub mod stock;

pub use audit::AuditRepository;
pub use debtor::DebtorRepository;
pub use market::MarketRepository;
pub use sale::SaleRepository;
pub use stock::StockRepository;
