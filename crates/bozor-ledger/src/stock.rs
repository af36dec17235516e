//! # Stock Ledger
//!
//! Available quantity per product. `decrease` and `increase` run inside a
//! caller's [`UnitOfWork`] and never commit; `receive` is a standalone
//! restock with its own unit.
//!
//! A decrement is one conditional statement (`... WHERE quantity >= qty`),
//! so two sales racing for the last units cannot both succeed.

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use bozor_core::validation::validate_quantity;
use bozor_core::{Actor, AuditAction, ChangeEvent, EntityType, Snapshot, StockItem};
use bozor_db::{Database, StockRepository};

use crate::error::{LedgerError, LedgerResult};
use crate::unit_of_work::{Notifier, UnitOfWork};

#[derive(Debug, Clone)]
pub struct StockLedger {
    db: Database,
    notifier: Notifier,
    repo: StockRepository,
}

impl StockLedger {
    pub fn new(db: Database, notifier: Notifier) -> Self {
        StockLedger {
            db,
            notifier,
            repo: StockRepository,
        }
    }

    /// Takes `qty` out of stock.
    ///
    /// ## Errors
    /// - `NotFound` - no such product
    /// - `InsufficientStock` - fewer than `qty` on hand; nothing changes
    pub async fn decrease(
        &self,
        uow: &mut UnitOfWork,
        product_id: &str,
        qty: i64,
        actor: &Actor,
    ) -> LedgerResult<StockItem> {
        validate_quantity(qty)?;

        let now = Utc::now();
        let taken = self
            .repo
            .try_decrement(uow.conn(), product_id, qty, &actor.id, now)
            .await?;

        if !taken {
            return Err(match self.repo.get(uow.conn(), product_id).await? {
                None => LedgerError::not_found("Stock item", product_id),
                Some(item) => {
                    debug!(product_id, available = item.quantity, requested = qty, "Insufficient stock");
                    LedgerError::InsufficientStock {
                        product_id: item.id,
                        product_name: item.name,
                        available: item.quantity,
                        requested: qty,
                    }
                }
            });
        }

        let item = self.reload(uow, product_id).await?;
        uow.record(
            AuditAction::DecreaseStockQuantity,
            EntityType::Stock,
            &item.id,
            json!({
                "productName": item.name,
                "quantityChange": -qty,
                "oldQuantity": item.quantity + qty,
                "newQuantity": item.quantity,
            }),
            actor,
        );
        uow.emit(ChangeEvent::StockChanged(Snapshot::Updated(item.clone())));

        debug!(product_id, qty, remaining = item.quantity, "Stock decreased");
        Ok(item)
    }

    /// Puts `qty` back into stock.
    ///
    /// ## Errors
    /// - `NotFound` - no such product
    pub async fn increase(
        &self,
        uow: &mut UnitOfWork,
        product_id: &str,
        qty: i64,
        actor: &Actor,
    ) -> LedgerResult<StockItem> {
        validate_quantity(qty)?;

        let now = Utc::now();
        if !self
            .repo
            .increment(uow.conn(), product_id, qty, &actor.id, now)
            .await?
        {
            return Err(LedgerError::not_found("Stock item", product_id));
        }

        let item = self.reload(uow, product_id).await?;
        uow.record(
            AuditAction::IncreaseStockQuantity,
            EntityType::Stock,
            &item.id,
            json!({
                "productName": item.name,
                "quantityChange": qty,
                "oldQuantity": item.quantity - qty,
                "newQuantity": item.quantity,
            }),
            actor,
        );
        uow.emit(ChangeEvent::StockChanged(Snapshot::Updated(item.clone())));

        debug!(product_id, qty, available = item.quantity, "Stock increased");
        Ok(item)
    }

    /// Books incoming goods in a unit of work of its own.
    pub async fn receive(&self, product_id: &str, qty: i64, actor: &Actor) -> LedgerResult<StockItem> {
        let mut uow = UnitOfWork::begin(&self.db).await?;
        let item = self.increase(&mut uow, product_id, qty, actor).await?;
        let committed = uow.commit().await?;

        info!(product_id, qty, available = item.quantity, "Stock received");
        self.notifier.dispatch(committed).await;
        Ok(item)
    }

    pub async fn get(&self, product_id: &str) -> LedgerResult<StockItem> {
        let mut conn = self.db.pool().acquire().await.map_err(bozor_db::DbError::from)?;
        self.repo
            .get(&mut conn, product_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Stock item", product_id))
    }

    async fn reload(&self, uow: &mut UnitOfWork, product_id: &str) -> LedgerResult<StockItem> {
        self.repo
            .get(uow.conn(), product_id)
            .await?
            .ok_or_else(|| LedgerError::invariant(format!("stock item {} vanished mid-update", product_id)))
    }
}
