//! # Debtor Ledger
//!
//! A debtor's balance and the unpaid items behind it. Both operations keep
//! `current_debt == Σ remaining_amount` and re-check it against the stored
//! rows before returning.
//!
//! ## Payoff Allocation
//! ```text
//! items (oldest first):  A:500   B:300   C:200      balance 1000
//!
//! pay 600                ──────  ──
//!                        settled B→200             balance  400
//! result:                        B:200   C:200
//! ```
//! Items are consumed oldest first; at most one item is partly reduced and
//! everything after it is untouched.

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use bozor_core::allocation::{allocate_oldest_first, apply_payment};
use bozor_core::validation::validate_positive_amount;
use bozor_core::{Actor, AuditAction, ChangeEvent, DebtItem, Debtor, EntityType, Money, Snapshot, SoldLine};
use bozor_db::{Database, DbError, DebtorRepository};

use crate::error::{LedgerError, LedgerResult};
use crate::unit_of_work::{Notifier, UnitOfWork};

#[derive(Debug, Clone)]
pub struct DebtorLedger {
    db: Database,
    notifier: Notifier,
    repo: DebtorRepository,
}

impl DebtorLedger {
    pub fn new(db: Database, notifier: Notifier) -> Self {
        DebtorLedger {
            db,
            notifier,
            repo: DebtorRepository,
        }
    }

    /// Adds `amount` of debt from a sale's lines.
    ///
    /// One item is appended per line at its line total. If `amount` is less
    /// than the lines are worth, the difference was paid up front and is
    /// settled against the new items oldest first.
    ///
    /// ## Errors
    /// - `NotFound` - no such debtor
    /// - `BadRequest` - `amount` not positive, or more than the lines are worth
    pub async fn add_debt(
        &self,
        uow: &mut UnitOfWork,
        debtor_id: &str,
        sale_id: &str,
        amount: Money,
        lines: &[SoldLine],
        actor: &Actor,
    ) -> LedgerResult<Debtor> {
        validate_positive_amount("amount", amount)?;

        let before = self
            .repo
            .get(uow.conn(), debtor_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Debtor", debtor_id))?;

        let lines_total = Money::checked_sum(lines.iter().map(|l| l.line_total))
            .ok_or_else(|| LedgerError::bad_request("sold lines' total is out of range"))?;
        if amount > lines_total {
            return Err(LedgerError::bad_request(format!(
                "debt of {} exceeds the sold lines' total of {}",
                amount, lines_total
            )));
        }

        let now = Utc::now();
        let mut items: Vec<DebtItem> = lines
            .iter()
            .filter(|line| line.line_total.is_positive())
            .map(|line| DebtItem {
                id: Uuid::new_v4().to_string(),
                product_id: line.product_id.clone(),
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit: line.unit.clone(),
                price_per_unit: line.unit_price,
                remaining_amount: line.line_total,
                source_sale_id: sale_id.to_string(),
                debt_date: now,
            })
            .collect();

        let prepaid = lines_total - amount;
        if prepaid.is_positive() {
            apply_payment(&mut items, prepaid)?;
        }

        for item in &items {
            self.repo.insert_item(uow.conn(), debtor_id, item).await?;
        }

        if !self
            .repo
            .add_to_balance(uow.conn(), debtor_id, amount, &actor.id, now)
            .await?
        {
            return Err(LedgerError::not_found("Debtor", debtor_id));
        }

        let debtor = self.reload_balanced(uow, debtor_id).await?;
        uow.record(
            AuditAction::DebtorDebtUpdate,
            EntityType::Debtor,
            debtor_id,
            json!({
                "saleId": sale_id,
                "debtAdded": amount,
                "oldDebt": before.current_debt,
                "newDebt": debtor.current_debt,
                "items": items
                    .iter()
                    .map(|i| json!({
                        "productName": i.product_name,
                        "quantity": i.quantity,
                        "amount": i.remaining_amount,
                    }))
                    .collect::<Vec<_>>(),
            }),
            actor,
        );
        uow.emit(ChangeEvent::DebtorChanged(Snapshot::Updated(debtor.clone())));

        debug!(debtor_id, sale_id, amount = %amount, balance = %debtor.current_debt, "Debt added");
        Ok(debtor)
    }

    /// Settles `amount` of a debtor's balance, oldest items first.
    ///
    /// ## Errors
    /// - `NotFound` - no such debtor
    /// - `AmountExceedsDebt` - `amount` is more than the balance; nothing changes
    /// - `BadRequest` - `amount` not positive
    pub async fn pay_off_debt(
        &self,
        uow: &mut UnitOfWork,
        debtor_id: &str,
        amount: Money,
        actor: &Actor,
    ) -> LedgerResult<Debtor> {
        validate_positive_amount("amount", amount)?;

        let before = self
            .repo
            .get(uow.conn(), debtor_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Debtor", debtor_id))?;

        if amount > before.current_debt {
            return Err(LedgerError::AmountExceedsDebt {
                debtor_id: debtor_id.to_string(),
                current_debt: before.current_debt,
                requested: amount,
            });
        }

        let outstanding: Vec<Money> = before.debt_items.iter().map(|i| i.remaining_amount).collect();
        let plan = allocate_oldest_first(&outstanding, amount)?;

        for idx in &plan.settled {
            self.repo.delete_item(uow.conn(), &before.debt_items[*idx].id).await?;
        }
        if let Some((idx, remaining)) = plan.reduced {
            self.repo
                .set_item_remaining(uow.conn(), &before.debt_items[idx].id, remaining)
                .await?;
        }

        let now = Utc::now();
        if !self
            .repo
            .try_reduce_balance(uow.conn(), debtor_id, amount, &actor.id, now)
            .await?
        {
            // Balance moved since the read above.
            let current = self
                .repo
                .get(uow.conn(), debtor_id)
                .await?
                .ok_or_else(|| LedgerError::not_found("Debtor", debtor_id))?;
            return Err(LedgerError::AmountExceedsDebt {
                debtor_id: debtor_id.to_string(),
                current_debt: current.current_debt,
                requested: amount,
            });
        }

        let debtor = self.reload_balanced(uow, debtor_id).await?;
        uow.record(
            AuditAction::DebtorPayment,
            EntityType::Debtor,
            debtor_id,
            json!({
                "amountPaid": amount,
                "oldDebt": before.current_debt,
                "newDebt": debtor.current_debt,
                "itemsSettled": plan.settled.len(),
            }),
            actor,
        );
        uow.emit(ChangeEvent::DebtorChanged(Snapshot::Updated(debtor.clone())));

        debug!(
            debtor_id,
            amount = %amount,
            settled = plan.settled.len(),
            balance = %debtor.current_debt,
            "Debt paid off"
        );
        Ok(debtor)
    }

    /// A payment made outside any sale, in a unit of work of its own.
    pub async fn pay_debt(&self, debtor_id: &str, amount: Money, actor: &Actor) -> LedgerResult<Debtor> {
        let mut uow = UnitOfWork::begin(&self.db).await?;
        let debtor = self.pay_off_debt(&mut uow, debtor_id, amount, actor).await?;
        let committed = uow.commit().await?;

        info!(debtor_id, amount = %amount, balance = %debtor.current_debt, "Debt payment received");
        self.notifier.dispatch(committed).await;
        Ok(debtor)
    }

    pub async fn get(&self, debtor_id: &str) -> LedgerResult<Debtor> {
        let mut conn = self.db.pool().acquire().await.map_err(DbError::from)?;
        self.repo
            .get(&mut conn, debtor_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Debtor", debtor_id))
    }

    /// Re-reads the debtor and checks the balance against the stored items.
    async fn reload_balanced(&self, uow: &mut UnitOfWork, debtor_id: &str) -> LedgerResult<Debtor> {
        let debtor = self
            .repo
            .get(uow.conn(), debtor_id)
            .await?
            .ok_or_else(|| LedgerError::invariant(format!("debtor {} vanished mid-update", debtor_id)))?;

        let items_total = self.repo.items_total(uow.conn(), debtor_id).await?;
        if items_total != debtor.current_debt {
            return Err(LedgerError::invariant(format!(
                "debtor {} owes {} but debt items sum to {}",
                debtor_id, debtor.current_debt, items_total
            )));
        }

        Ok(debtor)
    }
}
