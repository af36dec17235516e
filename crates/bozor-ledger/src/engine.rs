//! # Engine Wiring
//!
//! Builds the whole settlement engine from a [`LedgerConfig`].
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. Open Database ──► SQLite pool (WAL), pending migrations applied    │
//! │                                                                         │
//! │  2. Pick Event Bus ─► memory: InMemoryEventBus                         │
//! │                       redis:  RedisEventBus (relay task started)       │
//! │                                                                         │
//! │  3. Wire Services ──► AuditRecorder + EventBroadcaster ──► Notifier    │
//! │                       StockLedger, DebtorLedger ──► SaleCoordinator    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ```rust,ignore
//! let config = LedgerConfig::load(None)?;
//! telemetry::init(&config.logging.level)?;
//! let ledger = Ledger::connect(&config).await?;
//! let sale = ledger.sales().create_sale(request, &actor).await?;
//! ```

use std::sync::Arc;

use tracing::info;

use bozor_db::Database;

use crate::audit::{AuditRecorder, AuditStore};
use crate::broadcast::{EventBroadcaster, EventBus, InMemoryEventBus, RedisEventBus};
use crate::config::{EventBackend, LedgerConfig};
use crate::coordinator::SaleCoordinator;
use crate::debtor::DebtorLedger;
use crate::error::{ConfigError, LedgerError, LedgerResult};
use crate::stock::StockLedger;
use crate::unit_of_work::Notifier;

/// A fully wired engine. Cheap to clone; clones share the pool and bus.
#[derive(Debug, Clone)]
pub struct Ledger {
    db: Database,
    notifier: Notifier,
    stock: StockLedger,
    debtors: DebtorLedger,
    sales: SaleCoordinator,
}

impl Ledger {
    /// Opens storage and the configured event bus, then wires the services.
    pub async fn connect(config: &LedgerConfig) -> LedgerResult<Self> {
        config.validate()?;

        let db = Database::new(config.db_config()).await?;

        let bus: Arc<dyn EventBus> = match config.events.backend {
            EventBackend::Memory => Arc::new(InMemoryEventBus::new(config.events.channel_capacity)),
            EventBackend::Redis => {
                let url = config.events.redis_url.as_deref().ok_or_else(|| {
                    ConfigError::Invalid("events.redis_url is required for the redis backend".into())
                })?;
                let bus = RedisEventBus::connect(url, config.events.channel_capacity)
                    .await
                    .map_err(|e| LedgerError::Storage {
                        message: format!("event bus: {}", e),
                        retryable: true,
                    })?;
                Arc::new(bus)
            }
        };

        info!(
            database = %config.database.path.display(),
            events = %config.events.backend,
            "Ledger ready"
        );

        let store: Arc<dyn AuditStore> = Arc::new(db.audit());
        Ok(Self::assemble(db, store, bus))
    }

    /// Wires the services over an open database and bus.
    pub fn assemble(db: Database, audit_store: Arc<dyn AuditStore>, bus: Arc<dyn EventBus>) -> Self {
        let notifier = Notifier::new(AuditRecorder::new(audit_store), EventBroadcaster::new(bus));
        let stock = StockLedger::new(db.clone(), notifier.clone());
        let debtors = DebtorLedger::new(db.clone(), notifier.clone());
        let sales = SaleCoordinator::new(db.clone(), stock.clone(), debtors.clone(), notifier.clone());

        Ledger {
            db,
            notifier,
            stock,
            debtors,
            sales,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn stock(&self) -> &StockLedger {
        &self.stock
    }

    pub fn debtors(&self) -> &DebtorLedger {
        &self.debtors
    }

    pub fn sales(&self) -> &SaleCoordinator {
        &self.sales
    }

    pub fn audit(&self) -> &AuditRecorder {
        self.notifier.audit()
    }

    pub fn broadcaster(&self) -> &EventBroadcaster {
        self.notifier.broadcaster()
    }

    pub async fn shutdown(&self) {
        self.db.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bozor_core::{Channel, EntityType};

    #[tokio::test]
    async fn test_connect_with_memory_backend() {
        let path = std::env::temp_dir().join(format!("bozor-engine-{}.db", uuid::Uuid::new_v4()));
        let config = LedgerConfig::from_toml(&format!(
            "[database]\npath = \"{}\"\n\n[events]\nbackend = \"memory\"\n",
            path.display()
        ))
        .unwrap();

        let ledger = Ledger::connect(&config).await.unwrap();
        assert!(ledger.database().health_check().await);

        let subscription = ledger.broadcaster().subscribe(Channel::NewSale);
        assert_eq!(subscription.channel(), Channel::NewSale);
        assert!(ledger
            .audit()
            .entries_for(EntityType::Sale, "nothing")
            .await
            .unwrap()
            .is_empty());

        ledger.shutdown().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    #[tokio::test]
    async fn test_redis_backend_needs_url() {
        let mut config = LedgerConfig::default();
        config.events.backend = EventBackend::Redis;
        config.events.redis_url = None;

        let err = Ledger::connect(&config).await.unwrap_err();
        assert!(matches!(err, LedgerError::Config(ConfigError::Invalid(_))));
        assert_eq!(err.code(), crate::error::ErrorCode::ConfigError);
    }

    #[tokio::test]
    async fn test_invalid_config_is_not_a_bad_request() {
        let mut config = LedgerConfig::default();
        config.database.max_connections = 0;

        let err = Ledger::connect(&config).await.unwrap_err();
        assert!(matches!(err, LedgerError::Config(_)));
        assert_ne!(err.code(), crate::error::ErrorCode::BadRequest);
    }
}
