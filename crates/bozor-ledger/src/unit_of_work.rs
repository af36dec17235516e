//! # Unit of Work
//!
//! One SQLite transaction plus the audit entries and change events that
//! describe it. Ledgers write through [`UnitOfWork::conn`] and queue their
//! side effects; nothing leaves the unit until it commits.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  UnitOfWork::begin(db)                                                  │
//! │     │                                                                   │
//! │     ├── ledger.decrease(&mut uow, ..)  → SQL on uow.conn()             │
//! │     │                                   + queue audit, queue event     │
//! │     ├── ...                                                             │
//! │     │                                                                   │
//! │     ├── commit() ──► Committed { audit, events } ──► Notifier          │
//! │     │                                                                   │
//! │     └── drop without commit ──► ROLLBACK, queued effects discarded     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Once `commit` is awaited the transaction is not cancellable; cancelling
//! the future before that drops the transaction and rolls it back.

use serde_json::Value;
use sqlx::{Sqlite, SqliteConnection, Transaction};
use tracing::debug;

use bozor_core::{Actor, AuditAction, AuditEntry, ChangeEvent, EntityType};
use bozor_db::{Database, DbError};

use crate::audit::{new_entry, AuditRecorder};
use crate::broadcast::EventBroadcaster;
use crate::error::LedgerResult;

pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
    audit: Vec<AuditEntry>,
    events: Vec<ChangeEvent>,
}

impl UnitOfWork {
    pub async fn begin(db: &Database) -> LedgerResult<Self> {
        let tx = db.begin().await?;
        Ok(UnitOfWork {
            tx,
            audit: Vec::new(),
            events: Vec::new(),
        })
    }

    /// The transaction's connection, for repository calls.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    /// Queues an audit entry, written after commit.
    pub fn record(
        &mut self,
        action: AuditAction,
        entity_type: EntityType,
        entity_id: &str,
        details: Value,
        actor: &Actor,
    ) {
        self.audit
            .push(new_entry(action, entity_type, entity_id, details, actor));
    }

    /// Queues a change event, published after commit.
    ///
    /// A later event about the same entity on the same channel replaces the
    /// earlier one in place: subscribers get the final state once.
    pub fn emit(&mut self, event: ChangeEvent) {
        let existing = self.events.iter_mut().find(|queued| {
            queued.channel() == event.channel() && queued.entity_id() == event.entity_id()
        });
        match existing {
            Some(slot) => *slot = event,
            None => self.events.push(event),
        }
    }

    pub fn pending_events(&self) -> &[ChangeEvent] {
        &self.events
    }

    pub async fn commit(self) -> LedgerResult<Committed> {
        self.tx.commit().await.map_err(DbError::from)?;
        debug!(
            audit_entries = self.audit.len(),
            events = self.events.len(),
            "Unit of work committed"
        );
        Ok(Committed {
            audit: self.audit,
            events: self.events,
        })
    }
}

/// Side effects of a committed unit of work, in the order they were queued.
#[derive(Debug, Default)]
pub struct Committed {
    pub audit: Vec<AuditEntry>,
    pub events: Vec<ChangeEvent>,
}

/// Runs the after-commit side channels: audit first, then events.
#[derive(Debug, Clone)]
pub struct Notifier {
    audit: AuditRecorder,
    broadcaster: EventBroadcaster,
}

impl Notifier {
    pub fn new(audit: AuditRecorder, broadcaster: EventBroadcaster) -> Self {
        Notifier { audit, broadcaster }
    }

    pub fn audit(&self) -> &AuditRecorder {
        &self.audit
    }

    pub fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    /// Never fails; each side channel logs its own errors.
    pub async fn dispatch(&self, committed: Committed) {
        for entry in committed.audit {
            self.audit.write(entry).await;
        }
        for event in &committed.events {
            self.broadcaster.publish(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bozor_core::{Market, Snapshot};
    use bozor_db::DbConfig;
    use serde_json::json;

    #[tokio::test]
    async fn test_dropped_unit_discards_writes_and_effects() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        {
            let mut uow = UnitOfWork::begin(&db).await.unwrap();
            db.markets()
                .insert(
                    uow.conn(),
                    &Market {
                        id: "m1".to_string(),
                        name: "Chorsu".to_string(),
                    },
                )
                .await
                .unwrap();
            uow.record(
                AuditAction::CreateSale,
                EntityType::Sale,
                "s1",
                json!({}),
                &Actor::new("u1"),
            );
        }

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(!db.markets().exists(&mut conn, "m1").await.unwrap());
        drop(conn);
        assert_eq!(db.audit().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_commit_returns_queued_effects() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = UnitOfWork::begin(&db).await.unwrap();
        uow.record(
            AuditAction::DeleteSale,
            EntityType::Sale,
            "s1",
            json!({ "totalAmount": 500 }),
            &Actor::new("u1"),
        );
        uow.emit(ChangeEvent::SaleChanged(Snapshot::Deleted {
            id: "s1".to_string(),
        }));

        let committed = uow.commit().await.unwrap();
        assert_eq!(committed.audit.len(), 1);
        assert_eq!(committed.audit[0].entity_id, "s1");
        assert_eq!(committed.events.len(), 1);
    }

    #[tokio::test]
    async fn test_emit_keeps_last_snapshot_per_entity() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = UnitOfWork::begin(&db).await.unwrap();

        uow.emit(ChangeEvent::StockChanged(Snapshot::Deleted { id: "apple".into() }));
        uow.emit(ChangeEvent::DebtorChanged(Snapshot::Deleted { id: "d1".into() }));
        uow.emit(ChangeEvent::StockChanged(Snapshot::Deleted { id: "pear".into() }));
        uow.emit(ChangeEvent::DebtorChanged(Snapshot::Deleted { id: "d1".into() }));

        let ids: Vec<&str> = uow.pending_events().iter().map(|e| e.entity_id()).collect();
        assert_eq!(ids, vec!["apple", "d1", "pear"]);
    }
}
