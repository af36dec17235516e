//! # Debtor Repository
//!
//! `debtors` holds the balance, `debt_items` the unpaid lines behind it,
//! ordered by `seq` (oldest first). The repository moves both; keeping them
//! equal is the debtor ledger's job.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};
use tracing::debug;

use bozor_core::{DebtItem, Debtor, Money};

use crate::error::DbResult;

#[derive(Debug, FromRow)]
struct DebtorRow {
    id: String,
    name: String,
    contact_info: Option<String>,
    current_debt: i64,
    created_by: Option<String>,
    updated_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DebtorRow {
    fn into_debtor(self, debt_items: Vec<DebtItem>) -> Debtor {
        Debtor {
            id: self.id,
            name: self.name,
            contact_info: self.contact_info,
            current_debt: Money::from_minor(self.current_debt),
            debt_items,
            created_by: self.created_by,
            updated_by: self.updated_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct DebtItemRow {
    id: String,
    product_id: String,
    product_name: String,
    quantity: i64,
    unit: String,
    price_per_unit: i64,
    remaining_amount: i64,
    source_sale_id: String,
    debt_date: DateTime<Utc>,
}

impl From<DebtItemRow> for DebtItem {
    fn from(row: DebtItemRow) -> Self {
        DebtItem {
            id: row.id,
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit: row.unit,
            price_per_unit: Money::from_minor(row.price_per_unit),
            remaining_amount: Money::from_minor(row.remaining_amount),
            source_sale_id: row.source_sale_id,
            debt_date: row.debt_date,
        }
    }
}

/// Repository for debtors and their debt items.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebtorRepository;

impl DebtorRepository {
    /// Loads a debtor with its items, oldest first.
    pub async fn get(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Debtor>> {
        let row = sqlx::query_as::<_, DebtorRow>(
            r#"
            SELECT id, name, contact_info, current_debt,
                   created_by, updated_by, created_at, updated_at
            FROM debtors
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => {
                let items = self.items(conn, id).await?;
                Ok(Some(row.into_debtor(items)))
            }
            None => Ok(None),
        }
    }

    /// Unpaid items of a debtor, oldest first.
    pub async fn items(&self, conn: &mut SqliteConnection, debtor_id: &str) -> DbResult<Vec<DebtItem>> {
        let rows = sqlx::query_as::<_, DebtItemRow>(
            r#"
            SELECT id, product_id, product_name, quantity, unit,
                   price_per_unit, remaining_amount, source_sale_id, debt_date
            FROM debt_items
            WHERE debtor_id = ?1
            ORDER BY seq
            "#,
        )
        .bind(debtor_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(DebtItem::from).collect())
    }

    /// Sum of the remaining amounts, recomputed by the database.
    pub async fn items_total(&self, conn: &mut SqliteConnection, debtor_id: &str) -> DbResult<Money> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(remaining_amount), 0) FROM debt_items WHERE debtor_id = ?1",
        )
        .bind(debtor_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(Money::from_minor(total))
    }

    /// Inserts a debtor row. Any `debt_items` on the value are inserted too.
    pub async fn insert(&self, conn: &mut SqliteConnection, debtor: &Debtor) -> DbResult<()> {
        debug!(name = %debtor.name, "Inserting debtor");

        sqlx::query(
            r#"
            INSERT INTO debtors (
                id, name, contact_info, current_debt,
                created_by, updated_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&debtor.id)
        .bind(&debtor.name)
        .bind(&debtor.contact_info)
        .bind(debtor.current_debt.minor())
        .bind(&debtor.created_by)
        .bind(&debtor.updated_by)
        .bind(debtor.created_at)
        .bind(debtor.updated_at)
        .execute(&mut *conn)
        .await?;

        for item in &debtor.debt_items {
            self.insert_item(conn, &debtor.id, item).await?;
        }

        Ok(())
    }

    /// Appends an item at the end of the debtor's queue.
    pub async fn insert_item(
        &self,
        conn: &mut SqliteConnection,
        debtor_id: &str,
        item: &DebtItem,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO debt_items (
                id, debtor_id, product_id, product_name, quantity, unit,
                price_per_unit, remaining_amount, source_sale_id, debt_date
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&item.id)
        .bind(debtor_id)
        .bind(&item.product_id)
        .bind(&item.product_name)
        .bind(item.quantity)
        .bind(&item.unit)
        .bind(item.price_per_unit.minor())
        .bind(item.remaining_amount.minor())
        .bind(&item.source_sale_id)
        .bind(item.debt_date)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn set_item_remaining(
        &self,
        conn: &mut SqliteConnection,
        item_id: &str,
        remaining: Money,
    ) -> DbResult<bool> {
        let result = sqlx::query("UPDATE debt_items SET remaining_amount = ?2 WHERE id = ?1")
            .bind(item_id)
            .bind(remaining.minor())
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn delete_item(&self, conn: &mut SqliteConnection, item_id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM debt_items WHERE id = ?1")
            .bind(item_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Raises the balance by `amount`.
    ///
    /// ## Returns
    /// * `Ok(false)` - no such debtor
    pub async fn add_to_balance(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        amount: Money,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        debug!(id = %id, amount = %amount, "Raising debtor balance");

        let result = sqlx::query(
            r#"
            UPDATE debtors
            SET current_debt = current_debt + ?2,
                updated_by = ?3,
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(amount.minor())
        .bind(actor_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Lowers the balance by `amount` only if at least that much is owed.
    ///
    /// ## Returns
    /// * `Ok(false)` - no such debtor, or the balance is smaller than `amount`
    pub async fn try_reduce_balance(
        &self,
        conn: &mut SqliteConnection,
        id: &str,
        amount: Money,
        actor_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        debug!(id = %id, amount = %amount, "Reducing debtor balance");

        let result = sqlx::query(
            r#"
            UPDATE debtors
            SET current_debt = current_debt - ?2,
                updated_by = ?3,
                updated_at = ?4
            WHERE id = ?1 AND current_debt >= ?2
            "#,
        )
        .bind(id)
        .bind(amount.minor())
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

    fn debtor(id: &str) -> Debtor {
        let now = Utc::now();
        Debtor {
            id: id.to_string(),
            name: format!("Debtor {}", id),
            contact_info: Some("+998 90 000 00 00".to_string()),
            current_debt: Money::zero(),
            debt_items: Vec::new(),
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn item(id: &str, remaining: i64) -> DebtItem {
        DebtItem {
            id: id.to_string(),
            product_id: "apple".to_string(),
            product_name: "Apple".to_string(),
            quantity: 1,
            unit: "kg".to_string(),
            price_per_unit: Money::from_minor(remaining),
            remaining_amount: Money::from_minor(remaining),
            source_sale_id: "s1".to_string(),
            debt_date: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_items_keep_insertion_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let repo = db.debtors();
        repo.insert(&mut conn, &debtor("d1")).await.unwrap();

        for (id, amount) in [("c", 200), ("a", 500), ("b", 300)] {
            repo.insert_item(&mut conn, "d1", &item(id, amount)).await.unwrap();
        }

        let loaded = repo.get(&mut conn, "d1").await.unwrap().unwrap();
        let ids: Vec<&str> = loaded.debt_items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(repo.items_total(&mut conn, "d1").await.unwrap().minor(), 1000);
    }

    #[tokio::test]
    async fn test_balance_guard() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let repo = db.debtors();
        repo.insert(&mut conn, &debtor("d1")).await.unwrap();

        let now = Utc::now();
        assert!(repo.add_to_balance(&mut conn, "d1", Money::from_minor(300), "u1", now).await.unwrap());
        assert!(!repo.try_reduce_balance(&mut conn, "d1", Money::from_minor(301), "u1", now).await.unwrap());
        assert!(repo.try_reduce_balance(&mut conn, "d1", Money::from_minor(300), "u1", now).await.unwrap());
        assert!(!repo.add_to_balance(&mut conn, "ghost", Money::from_minor(1), "u1", now).await.unwrap());

        let loaded = repo.get(&mut conn, "d1").await.unwrap().unwrap();
        assert!(loaded.current_debt.is_zero());
    }

    #[tokio::test]
    async fn test_item_update_and_delete() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let repo = db.debtors();
        repo.insert(&mut conn, &debtor("d1")).await.unwrap();
        repo.insert_item(&mut conn, "d1", &item("a", 500)).await.unwrap();
        repo.insert_item(&mut conn, "d1", &item("b", 300)).await.unwrap();

        assert!(repo.delete_item(&mut conn, "a").await.unwrap());
        assert!(repo.set_item_remaining(&mut conn, "b", Money::from_minor(120)).await.unwrap());

        let items = repo.items(&mut conn, "d1").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].remaining_amount.minor(), 120);
    }
}
