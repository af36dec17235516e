//! # Stock Repository
//!
//! Row-level access to `stock_items`.
//!
//! ## Conditional Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Why not read-then-write?                             │
//! │                                                                         │
//! │  ❌ Two sales read quantity=10, both write 10-6=4 → 12 sold of 10     │
//! │                                                                         │
//! │  ✅ One statement, evaluated under the writer lock:                    │
//! │     UPDATE stock_items SET quantity = quantity - ?                      │
//! │     WHERE id = ? AND quantity >= ?                                      │
//! │                                                                         │
//! │     rows_affected == 1 → done                                          │
//! │     rows_affected == 0 → missing row OR not enough stock               │
//! │                          (caller re-reads to tell them apart)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};
use tracing::debug;

use bozor_core::{Money, StockItem};

use crate::error::DbResult;

#[derive(Debug, FromRow)]
struct StockRow {
    id: String,
    name: String,
    unit_price: i64,
    unit: String,
    quantity: i64,
    description: Option<String>,
    created_by: Option<String>,
    updated_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StockRow> for StockItem {
    fn from(row: StockRow) -> Self {
        StockItem {
            id: row.id,
            name: row.name,
            unit_price: Money::from_minor(row.unit_price),
            unit: row.unit,
            quantity: row.quantity,
            description: row.description,
            created_by: row.created_by,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_STOCK: &str = r#"
    SELECT id, name, unit_price, unit, quantity, description,
           created_by, updated_by, created_at, updated_at
    FROM stock_items
"#;

/// Repository for stock items.
#[derive(Debug, Clone, Copy, Default)]
pub struct StockRepository;

impl StockRepository {
    pub async fn get(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<Option<StockItem>> {
        let row = sqlx::query_as::<_, StockRow>(&format!("{SELECT_STOCK} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.map(StockItem::from))
    }

    pub async fn list(&self, conn: &mut SqliteConnection) -> DbResult<Vec<StockItem>> {
        let rows = sqlx::query_as::<_, StockRow>(&format!("{SELECT_STOCK} ORDER BY name"))
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows.into_iter().map(StockItem::from).collect())
    }

    /// Inserts a new stock item.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - name already taken
    pub async fn insert(&self, conn: &mut SqliteConnection, item: &StockItem) -> DbResult<()> {
        debug!(name = %item.name, "Inserting stock item");

        sqlx::query(
            r#"
            INSERT INTO stock_items (
                id, name, unit_price, unit, quantity, description,
                created_by, updated_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&item.id)
        .bind(&item.name)
        .bind(item.unit_price.minor())
        .bind(&item.unit)
        .bind(item.quantity)
        .bind(&item.description)
        .bind(&item.created_by)
        .bind(&item.updated_by)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Subtracts `qty` only if at least `qty` is available.
    ///
    /// ## Returns
    /// * `Ok(true)` - decremented
    /// * `Ok(false)` - row missing or not enough stock; nothing changed
    pub async fn try_decrement(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        qty: i64,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        debug!(id = %id, qty, "Decrementing stock");

        let result = sqlx::query(
            r#"
            UPDATE stock_items
            SET quantity = quantity - ?2,
                updated_by = ?3,
                updated_at = ?4
            WHERE id = ?1 AND quantity >= ?2
            "#,
        )
        .bind(id)
        .bind(qty)
        .bind(actor_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Adds `qty` to the available quantity.
    ///
    /// ## Returns
    /// * `Ok(false)` - no such item
    pub async fn increment(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        qty: i64,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        debug!(id = %id, qty, "Incrementing stock");

        let result = sqlx::query(
            r#"
            UPDATE stock_items
            SET quantity = quantity + ?2,
                updated_by = ?3,
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(qty)
        .bind(actor_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn apple(qty: i64) -> StockItem {
        let now = Utc::now();
        StockItem {
            id: "apple".to_string(),
            name: "Apple".to_string(),
            unit_price: Money::from_minor(5000),
            unit: "kg".to_string(),
            quantity: qty,
            description: None,
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let repo = db.stock();

        repo.insert(&mut conn, &apple(10)).await.unwrap();

        let item = repo.get(&mut conn, "apple").await.unwrap().unwrap();
        assert_eq!(item.quantity, 10);
        assert_eq!(item.unit_price.minor(), 5000);
        assert!(repo.get(&mut conn, "pear").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_try_decrement_never_goes_negative() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let repo = db.stock();
        repo.insert(&mut conn, &apple(10)).await.unwrap();

        assert!(!repo.try_decrement(&mut conn, "apple", 12, "u1", Utc::now()).await.unwrap());
        assert!(repo.try_decrement(&mut conn, "apple", 10, "u1", Utc::now()).await.unwrap());
        assert!(!repo.try_decrement(&mut conn, "apple", 1, "u1", Utc::now()).await.unwrap());

        let item = repo.get(&mut conn, "apple").await.unwrap().unwrap();
        assert_eq!(item.quantity, 0);
        assert_eq!(item.updated_by.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn test_increment_missing_item() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        assert!(!db.stock().increment(&mut conn, "ghost", 1, "u1", Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let repo = db.stock();
        repo.insert(&mut conn, &apple(1)).await.unwrap();

        let mut twin = apple(1);
        twin.id = "apple-2".to_string();
        let err = repo.insert(&mut conn, &twin).await.unwrap_err();
        assert!(matches!(err, crate::error::DbError::UniqueViolation { .. }));
    }
}
