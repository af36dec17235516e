//! # Ledger Database Handle
//!
//! Opens the SQLite file that holds stock, debtors, sales and the audit
//! trail, and hands out transactions and repositories over it.
//!
//! ```text
//! DbConfig ──► Database::new ──► pool (WAL, foreign keys) ──► migrations
//!                   │
//!                   ├── begin()  one transaction per sale operation
//!                   └── pool()   plain reads and audit writes
//! ```
//!
//! WAL lets readers keep going while one writer commits. A second writer
//! waits on the file lock for `busy_timeout` and then gets
//! [`DbError::Busy`], which callers may retry.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::audit::AuditRepository;
use crate::repository::debtor::DebtorRepository;
use crate::repository::market::MarketRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::stock::StockRepository;

const MEMORY_PATH: &str = ":memory:";

/// Where the ledger lives and how hard the pool may lean on it.
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/bozor/ledger.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Upper bound on pooled connections (default 5).
    pub max_connections: u32,
    /// Connections kept open while idle (default 1).
    pub min_connections: u32,
    /// Wait for a free pooled connection before giving up.
    pub acquire_timeout: Duration,
    /// Wait on another writer's lock before a statement fails as busy.
    pub busy_timeout: Duration,
    /// Apply pending migrations when the pool opens.
    pub migrate: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            path: path.into(),
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            migrate: true,
        }
    }

    /// A throwaway ledger for tests.
    ///
    /// The database exists only on its one connection, so the pool is capped
    /// at one. Anything asking the pool for a connection while a transaction
    /// holds it waits for that transaction to end.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(1),
            ..DbConfig::new(MEMORY_PATH)
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn migrate(mut self, migrate: bool) -> Self {
        self.migrate = migrate;
        self
    }

    fn is_memory(&self) -> bool {
        self.path == Path::new(MEMORY_PATH)
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let url = format!("sqlite://{}?mode=rwc", self.path.display());
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout)
            .create_if_missing(true);

        // WAL needs a real file.
        Ok(if self.is_memory() {
            options
        } else {
            options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        })
    }
}

/// Shared handle to the ledger database. Clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the ledger file and brings its schema
    /// up to date unless `config.migrate` is off.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.path.display(), "Opening ledger database");

        let options = config.connect_options()?;
        debug!(busy_timeout_ms = config.busy_timeout.as_millis() as u64, "SQLite options ready");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let db = Database { pool };
        if config.migrate {
            db.migrate().await?;
        }

        info!(max_connections = config.max_connections, "Ledger database ready");
        Ok(db)
    }

    /// Wraps a pool someone else opened. Migrations are left to the caller.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Database { pool }
    }

    pub async fn migrate(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Starts a transaction. Dropping it uncommitted rolls everything back.
    pub async fn begin(&self) -> DbResult<Transaction<'static, Sqlite>> {
        self.pool.begin().await.map_err(DbError::from)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn stock(&self) -> StockRepository {
        StockRepository
    }

    pub fn debtors(&self) -> DebtorRepository {
        DebtorRepository
    }

    pub fn sales(&self) -> SaleRepository {
        SaleRepository
    }

    pub fn markets(&self) -> MarketRepository {
        MarketRepository
    }

    /// Audit rows go straight to the pool, never into a sale's transaction.
    pub fn audit(&self) -> AuditRepository {
        AuditRepository::new(self.pool.clone())
    }

    pub async fn close(&self) {
        info!("Closing ledger database");
        self.pool.close().await;
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
