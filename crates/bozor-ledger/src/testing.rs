//! Shared fixtures for the ledger tests: one in-memory database with the
//! whole engine wired on top of it.

use std::sync::Arc;

use chrono::Utc;

use bozor_core::{Actor, Debtor, Market, Money, SoldLine, StockItem};
use bozor_db::{Database, DbConfig};

use crate::audit::{AuditRecorder, AuditStore};
use crate::broadcast::{EventBroadcaster, InMemoryEventBus};
use crate::coordinator::SaleCoordinator;
use crate::debtor::DebtorLedger;
use crate::engine::Ledger;
use crate::stock::StockLedger;

pub(crate) struct Harness {
    pub db: Database,
    pub bus: Arc<InMemoryEventBus>,
    pub broadcaster: EventBroadcaster,
    pub audit: AuditRecorder,
    pub stock: StockLedger,
    pub debtors: DebtorLedger,
    pub sales: SaleCoordinator,
    pub actor: Actor,
}

impl Harness {
    pub async fn new() -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store: Arc<dyn AuditStore> = Arc::new(db.audit());
        Self::assemble(db, store)
    }

    /// Same wiring, audit entries going to `store`.
    pub async fn with_audit_store(store: Arc<dyn AuditStore>) -> Self {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Self::assemble(db, store)
    }

    /// Wires the engine over an existing database.
    pub fn assemble(db: Database, store: Arc<dyn AuditStore>) -> Self {
        let bus = Arc::new(InMemoryEventBus::new(64));
        let ledger = Ledger::assemble(db, store, bus.clone());

        Harness {
            db: ledger.database().clone(),
            bus,
            broadcaster: ledger.broadcaster().clone(),
            audit: ledger.audit().clone(),
            stock: ledger.stock().clone(),
            debtors: ledger.debtors().clone(),
            sales: ledger.sales().clone(),
            actor: Actor::new("u1"),
        }
    }

    pub async fn add_stock(&self, id: &str, name: &str, unit_price: i64, quantity: i64) {
        let now = Utc::now();
        let mut conn = self.db.pool().acquire().await.unwrap();
        self.db
            .stock()
            .insert(
                &mut conn,
                &StockItem {
                    id: id.to_string(),
                    name: name.to_string(),
                    unit_price: Money::from_minor(unit_price),
                    unit: "kg".to_string(),
                    quantity,
                    description: None,
                    created_by: None,
                    updated_by: None,
                    created_at: now,
                    updated_at: now,
                },
            )
            .await
            .unwrap();
    }

    pub async fn add_debtor(&self, id: &str, name: &str) {
        let now = Utc::now();
        let mut conn = self.db.pool().acquire().await.unwrap();
        self.db
            .debtors()
            .insert(
                &mut conn,
                &Debtor {
                    id: id.to_string(),
                    name: name.to_string(),
                    contact_info: None,
                    current_debt: Money::zero(),
                    debt_items: Vec::new(),
                    created_by: None,
                    updated_by: None,
                    created_at: now,
                    updated_at: now,
                },
            )
            .await
            .unwrap();
    }

    pub async fn add_market(&self, id: &str, name: &str) {
        let mut conn = self.db.pool().acquire().await.unwrap();
        self.db
            .markets()
            .insert(
                &mut conn,
                &Market {
                    id: id.to_string(),
                    name: name.to_string(),
                },
            )
            .await
            .unwrap();
    }

    pub async fn stock_qty(&self, id: &str) -> i64 {
        self.stock.get(id).await.unwrap().quantity
    }

    pub async fn debt_of(&self, id: &str) -> i64 {
        self.debtors.get(id).await.unwrap().current_debt.minor()
    }

    pub async fn sale_count(&self) -> i64 {
        let mut conn = self.db.pool().acquire().await.unwrap();
        self.db.sales().count(&mut conn).await.unwrap()
    }
}

/// A sold line whose unit price is `total / quantity`.
pub(crate) fn line(product_id: &str, product_name: &str, quantity: i64, total: i64) -> SoldLine {
    SoldLine {
        product_id: product_id.to_string(),
        product_name: product_name.to_string(),
        quantity,
        unit: "kg".to_string(),
        unit_price: Money::from_minor(total / quantity),
        line_total: Money::from_minor(total),
    }
}
