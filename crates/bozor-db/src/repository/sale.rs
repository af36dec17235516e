//! # Sale Repository
//!
//! A sale is one `sales` row plus its ordered `sale_lines`. Lines are
//! written once with the sale and removed with it.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};
use tracing::debug;

use bozor_core::{Money, PaymentMethod, Sale, SoldLine};

use crate::error::{DbError, DbResult};

#[derive(Debug, FromRow)]
struct SaleRow {
    id: String,
    total_amount: i64,
    amount_paid: i64,
    debt_amount: i64,
    payment_method: PaymentMethod,
    is_returned: bool,
    debtor_id: Option<String>,
    market_id: Option<String>,
    created_by: String,
    updated_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SaleRow {
    fn into_sale(self, lines: Vec<SoldLine>) -> Sale {
        Sale {
            id: self.id,
            lines,
            total_amount: Money::from_minor(self.total_amount),
            amount_paid: Money::from_minor(self.amount_paid),
            debt_amount: Money::from_minor(self.debt_amount),
            payment_method: self.payment_method,
            is_returned: self.is_returned,
            debtor_id: self.debtor_id,
            market_id: self.market_id,
            created_by: self.created_by,
            updated_by: self.updated_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct LineRow {
    product_id: String,
    product_name: String,
    quantity: i64,
    unit: String,
    unit_price: i64,
    line_total: i64,
}

impl From<LineRow> for SoldLine {
    fn from(row: LineRow) -> Self {
        SoldLine {
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit: row.unit,
            unit_price: Money::from_minor(row.unit_price),
            line_total: Money::from_minor(row.line_total),
        }
    }
}

/// Repository for sales and their lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaleRepository;

impl SaleRepository {
    pub async fn get(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
        let row = sqlx::query_as::<_, SaleRow>(
            r#"
            SELECT id, total_amount, amount_paid, debt_amount, payment_method,
                   is_returned, debtor_id, market_id,
                   created_by, updated_by, created_at, updated_at
            FROM sales
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, LineRow>(
            r#"
            SELECT product_id, product_name, quantity, unit, unit_price, line_total
            FROM sale_lines
            WHERE sale_id = ?1
            ORDER BY line_no
            "#,
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(Some(row.into_sale(lines.into_iter().map(SoldLine::from).collect())))
    }

    /// Inserts the sale row and all of its lines.
    pub async fn insert(&self, conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        debug!(sale_id = %sale.id, lines = sale.lines.len(), "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, total_amount, amount_paid, debt_amount, payment_method,
                is_returned, debtor_id, market_id,
                created_by, updated_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&sale.id)
        .bind(sale.total_amount.minor())
        .bind(sale.amount_paid.minor())
        .bind(sale.debt_amount.minor())
        .bind(sale.payment_method)
        .bind(sale.is_returned)
        .bind(&sale.debtor_id)
        .bind(&sale.market_id)
        .bind(&sale.created_by)
        .bind(&sale.updated_by)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *conn)
        .await?;

        for (line_no, line) in sale.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sale_lines (
                    sale_id, line_no, product_id, product_name,
                    quantity, unit, unit_price, line_total
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&sale.id)
            .bind(line_no as i64)
            .bind(&line.product_id)
            .bind(&line.product_name)
            .bind(line.quantity)
            .bind(&line.unit)
            .bind(line.unit_price.minor())
            .bind(line.line_total.minor())
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Writes the mutable part of a sale: payment terms, return flag,
    /// market and updater.
    pub async fn update_terms(&self, conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        debug!(sale_id = %sale.id, "Updating sale");

        let result = sqlx::query(
            r#"
            UPDATE sales
            SET amount_paid = ?2,
                debt_amount = ?3,
                payment_method = ?4,
                is_returned = ?5,
                debtor_id = ?6,
                market_id = ?7,
                updated_by = ?8,
                updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(&sale.id)
        .bind(sale.amount_paid.minor())
        .bind(sale.debt_amount.minor())
        .bind(sale.payment_method)
        .bind(sale.is_returned)
        .bind(&sale.debtor_id)
        .bind(&sale.market_id)
        .bind(&sale.updated_by)
        .bind(sale.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", &sale.id));
        }

        Ok(())
    }

    /// Removes a sale and its lines.
    ///
    /// ## Returns
    /// * `Ok(false)` - no such sale
    pub async fn delete(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        debug!(sale_id = %id, "Deleting sale");

        sqlx::query("DELETE FROM sale_lines WHERE sale_id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        let result = sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn count(&self, conn: &mut SqliteConnection) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&mut *conn)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::stock::StockRepository;
    use bozor_core::StockItem;

    async fn setup() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let now = Utc::now();
        for (id, name) in [("apple", "Apple"), ("pear", "Pear")] {
            StockRepository
                .insert(
                    &mut conn,
                    &StockItem {
                        id: id.to_string(),
                        name: name.to_string(),
                        unit_price: Money::from_minor(100),
                        unit: "kg".to_string(),
                        quantity: 50,
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
        drop(conn);
        db
    }

    fn sale() -> Sale {
        let now = Utc::now();
        let line = |id: &str, name: &str, qty: i64| SoldLine {
            product_id: id.to_string(),
            product_name: name.to_string(),
            quantity: qty,
            unit: "kg".to_string(),
            unit_price: Money::from_minor(100),
            line_total: Money::from_minor(100 * qty),
        };
        Sale {
            id: "s1".to_string(),
            lines: vec![line("pear", "Pear", 2), line("apple", "Apple", 3)],
            total_amount: Money::from_minor(500),
            amount_paid: Money::from_minor(500),
            debt_amount: Money::zero(),
            payment_method: PaymentMethod::Card,
            is_returned: false,
            debtor_id: None,
            market_id: None,
            created_by: "u1".to_string(),
            updated_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_get_preserves_line_order() {
        let db = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let repo = db.sales();

        repo.insert(&mut conn, &sale()).await.unwrap();
        let loaded = repo.get(&mut conn, "s1").await.unwrap().unwrap();

        assert_eq!(loaded.payment_method, PaymentMethod::Card);
        assert_eq!(loaded.lines.len(), 2);
        assert_eq!(loaded.lines[0].product_id, "pear");
        assert_eq!(loaded.lines[1].line_total.minor(), 300);
        assert_eq!(loaded.lines_total(), loaded.total_amount);
    }

    #[tokio::test]
    async fn test_update_terms_and_delete() {
        let db = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let repo = db.sales();
        repo.insert(&mut conn, &sale()).await.unwrap();

        let mut changed = sale();
        changed.is_returned = true;
        changed.amount_paid = Money::zero();
        changed.updated_by = Some("u2".to_string());
        repo.update_terms(&mut conn, &changed).await.unwrap();

        let loaded = repo.get(&mut conn, "s1").await.unwrap().unwrap();
        assert!(loaded.is_returned);
        assert!(loaded.amount_paid.is_zero());
        assert_eq!(loaded.updated_by.as_deref(), Some("u2"));

        assert!(repo.delete(&mut conn, "s1").await.unwrap());
        assert!(!repo.delete(&mut conn, "s1").await.unwrap());
        assert_eq!(repo.count(&mut conn).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_missing_sale() {
        let db = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        let err = db.sales().update_terms(&mut conn, &sale()).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
