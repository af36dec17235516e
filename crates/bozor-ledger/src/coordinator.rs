//! # Sale Transaction Coordinator
//!
//! Creates, edits and deletes sales. Every call is one [`UnitOfWork`]: stock
//! moves, debt moves and the sale row commit together or not at all. Audit
//! entries and change events follow the commit.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   create_sale ──► Committed ──► update_sale ──► Committed (updated)    │
//! │                       │                │                                │
//! │                       │                └── isReturned: true ──► Returned│
//! │                       │                                            │    │
//! │                       └──────────── delete_sale ◄──────────────────┘    │
//! │                                          │                              │
//! │                                          ▼                              │
//! │                                       Deleted                           │
//! │                                                                         │
//! │   Returned never goes back: isReturned: false fails InvalidTransition  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## create_sale
//! 1. Check the lines and resolve payment terms (no storage touched yet)
//! 2. Decrease stock per line; the first shortage aborts everything
//! 3. Check the market and debtor exist
//! 4. Insert the sale and its lines
//! 5. Add debt for a debt sale with something left owing
//! 6. Commit, then audit and broadcast

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use bozor_core::terms::{plan_update, resolve_terms};
use bozor_core::{
    Actor, AuditAction, ChangeEvent, CreateSaleRequest, DebtStep, EntityType, Sale, SalePatch,
    Snapshot,
};
use bozor_db::{Database, DbError, DebtorRepository, MarketRepository, SaleRepository};

use crate::debtor::DebtorLedger;
use crate::error::{LedgerError, LedgerResult};
use crate::stock::StockLedger;
use crate::unit_of_work::{Notifier, UnitOfWork};

#[derive(Debug, Clone)]
pub struct SaleCoordinator {
    db: Database,
    stock: StockLedger,
    debtors: DebtorLedger,
    notifier: Notifier,
    sales: SaleRepository,
    markets: MarketRepository,
    debtor_rows: DebtorRepository,
}

impl SaleCoordinator {
    pub fn new(db: Database, stock: StockLedger, debtors: DebtorLedger, notifier: Notifier) -> Self {
        SaleCoordinator {
            db,
            stock,
            debtors,
            notifier,
            sales: SaleRepository,
            markets: MarketRepository,
            debtor_rows: DebtorRepository,
        }
    }

    /// Records a sale.
    ///
    /// ## Errors
    /// - `BadRequest` - lines don't add up to the total, or the payment
    ///   terms are inconsistent (debt sale without a debtor, cash sale with debt)
    /// - `InsufficientStock` - a line asks for more than is on hand
    /// - `NotFound` - unknown product, market or debtor
    pub async fn create_sale(&self, request: CreateSaleRequest, actor: &Actor) -> LedgerResult<Sale> {
        request.check_lines()?;
        let terms = resolve_terms(
            request.payment_method,
            request.total_amount,
            request.amount_paid,
            request.debt_amount,
            request.debtor_id.clone(),
        )?;

        let mut uow = UnitOfWork::begin(&self.db).await?;

        for line in &request.products_sold {
            self.stock
                .decrease(&mut uow, &line.product_id, line.quantity, actor)
                .await?;
        }

        if let Some(market_id) = request.market_id.as_deref() {
            self.require_market(&mut uow, market_id).await?;
        }
        if let Some(debtor_id) = terms.debtor_id.as_deref() {
            self.require_debtor(&mut uow, debtor_id).await?;
        }

        let now = Utc::now();
        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            lines: request.products_sold,
            total_amount: request.total_amount,
            amount_paid: terms.amount_paid,
            debt_amount: terms.debt_amount,
            payment_method: terms.payment_method,
            is_returned: false,
            debtor_id: terms.debtor_id,
            market_id: request.market_id,
            created_by: actor.id.clone(),
            updated_by: None,
            created_at: now,
            updated_at: now,
        };
        self.sales.insert(uow.conn(), &sale).await?;

        if let Some((debtor_id, amount)) = sale.carried_debt() {
            self.debtors
                .add_debt(&mut uow, debtor_id, &sale.id, amount, &sale.lines, actor)
                .await?;
        }

        uow.record(
            AuditAction::CreateSale,
            EntityType::Sale,
            &sale.id,
            json!({
                "totalAmount": sale.total_amount,
                "paymentMethod": sale.payment_method,
                "products": sale
                    .lines
                    .iter()
                    .map(|l| json!({ "name": l.product_name, "quantity": l.quantity }))
                    .collect::<Vec<_>>(),
                "debtorId": sale.debtor_id,
            }),
            actor,
        );
        uow.emit(ChangeEvent::NewSale(sale.clone()));

        let committed = uow.commit().await?;
        info!(
            sale_id = %sale.id,
            total = %sale.total_amount,
            payment_method = %sale.payment_method,
            lines = sale.lines.len(),
            "Sale created"
        );
        self.notifier.dispatch(committed).await;

        Ok(sale)
    }

    /// Edits a committed sale: return it, change how it was paid, or move it
    /// to another market.
    ///
    /// ## Errors
    /// - `NotFound` - no such sale, or an unknown market/debtor in the patch
    /// - `InvalidTransition` - the sale is already returned
    /// - `BadRequest` - the new payment terms are inconsistent
    /// - `AmountExceedsDebt` - the debt to undo was already paid some other way
    pub async fn update_sale(&self, sale_id: &str, patch: SalePatch, actor: &Actor) -> LedgerResult<Sale> {
        let mut uow = UnitOfWork::begin(&self.db).await?;

        let sale = self
            .sales
            .get(uow.conn(), sale_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Sale", sale_id))?;

        let plan = plan_update(&sale, &patch)?;
        if plan.is_noop_for(&sale) {
            debug!(sale_id, "Sale update changes nothing");
            return Ok(sale);
        }

        if plan.market_id != sale.market_id {
            if let Some(market_id) = plan.market_id.as_deref() {
                self.require_market(&mut uow, market_id).await?;
            }
        }
        if plan.terms.debtor_id != sale.debtor_id {
            if let Some(debtor_id) = plan.terms.debtor_id.as_deref() {
                self.require_debtor(&mut uow, debtor_id).await?;
            }
        }

        if plan.restock {
            for line in &sale.lines {
                self.stock
                    .increase(&mut uow, &line.product_id, line.quantity, actor)
                    .await?;
            }
        }

        for step in &plan.debt_steps {
            match step {
                DebtStep::PayOff { debtor_id, amount } => {
                    self.debtors
                        .pay_off_debt(&mut uow, debtor_id, *amount, actor)
                        .await?;
                }
                DebtStep::Add { debtor_id, amount } => {
                    self.debtors
                        .add_debt(&mut uow, debtor_id, &sale.id, *amount, &sale.lines, actor)
                        .await?;
                }
            }
        }

        let updated = Sale {
            amount_paid: plan.terms.amount_paid,
            debt_amount: plan.terms.debt_amount,
            payment_method: plan.terms.payment_method,
            debtor_id: plan.terms.debtor_id,
            is_returned: plan.is_returned,
            market_id: plan.market_id,
            updated_by: Some(actor.id.clone()),
            updated_at: Utc::now(),
            ..sale.clone()
        };
        self.sales.update_terms(uow.conn(), &updated).await?;

        uow.record(
            AuditAction::UpdateSale,
            EntityType::Sale,
            &updated.id,
            json!({
                "oldTotalAmount": sale.total_amount,
                "newTotalAmount": updated.total_amount,
                "oldPaymentMethod": sale.payment_method,
                "newPaymentMethod": updated.payment_method,
                "oldDebtAmount": sale.debt_amount,
                "newDebtAmount": updated.debt_amount,
                "oldIsReturned": sale.is_returned,
                "newIsReturned": updated.is_returned,
            }),
            actor,
        );
        uow.emit(ChangeEvent::SaleChanged(Snapshot::Updated(updated.clone())));

        let committed = uow.commit().await?;
        info!(
            sale_id = %updated.id,
            returned = updated.is_returned,
            payment_method = %updated.payment_method,
            debt_steps = plan.debt_steps.len(),
            "Sale updated"
        );
        self.notifier.dispatch(committed).await;

        Ok(updated)
    }

    /// Removes a sale, putting its goods back (unless already returned) and
    /// undoing the debt it still carries.
    pub async fn delete_sale(&self, sale_id: &str, actor: &Actor) -> LedgerResult<()> {
        let mut uow = UnitOfWork::begin(&self.db).await?;

        let sale = self
            .sales
            .get(uow.conn(), sale_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Sale", sale_id))?;

        if !sale.is_returned {
            for line in &sale.lines {
                self.stock
                    .increase(&mut uow, &line.product_id, line.quantity, actor)
                    .await?;
            }
        }

        if let Some((debtor_id, amount)) = sale.carried_debt() {
            self.debtors
                .pay_off_debt(&mut uow, debtor_id, amount, actor)
                .await?;
        }

        if !self.sales.delete(uow.conn(), &sale.id).await? {
            return Err(LedgerError::not_found("Sale", sale_id));
        }

        uow.record(
            AuditAction::DeleteSale,
            EntityType::Sale,
            &sale.id,
            json!({
                "totalAmount": sale.total_amount,
                "paymentMethod": sale.payment_method,
                "wasReturned": sale.is_returned,
            }),
            actor,
        );
        uow.emit(ChangeEvent::SaleChanged(Snapshot::Deleted {
            id: sale.id.clone(),
        }));

        let committed = uow.commit().await?;
        info!(sale_id = %sale.id, returned = sale.is_returned, "Sale deleted");
        self.notifier.dispatch(committed).await;

        Ok(())
    }

    pub async fn get_sale(&self, sale_id: &str) -> LedgerResult<Sale> {
        let mut conn = self.db.pool().acquire().await.map_err(DbError::from)?;
        self.sales
            .get(&mut conn, sale_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Sale", sale_id))
    }

    async fn require_market(&self, uow: &mut UnitOfWork, market_id: &str) -> LedgerResult<()> {
        if self.markets.exists(uow.conn(), market_id).await? {
            Ok(())
        } else {
            Err(LedgerError::not_found("Market", market_id))
        }
    }

    async fn require_debtor(&self, uow: &mut UnitOfWork, debtor_id: &str) -> LedgerResult<()> {
        match self.debtor_rows.get(uow.conn(), debtor_id).await? {
            Some(_) => Ok(()),
            None => Err(LedgerError::not_found("Debtor", debtor_id)),
        }
    }
}
