//! Market lookups. Sales may reference a market; nothing else here mutates it.

use chrono::Utc;
use sqlx::{FromRow, SqliteConnection};

use bozor_core::Market;

use crate::error::DbResult;

#[derive(Debug, FromRow)]
struct MarketRow {
    id: String,
    name: String,
}

impl From<MarketRow> for Market {
    fn from(row: MarketRow) -> Self {
        Market {
            id: row.id,
            name: row.name,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarketRepository;

impl MarketRepository {
    pub async fn exists(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM markets WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(found.is_some())
    }

    pub async fn get(&self, conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Market>> {
        let row = sqlx::query_as::<_, MarketRow>("SELECT id, name FROM markets WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.map(Market::from))
    }

    pub async fn insert(&self, conn: &mut SqliteConnection, market: &Market) -> DbResult<()> {
        sqlx::query("INSERT INTO markets (id, name, created_at) VALUES (?1, ?2, ?3)")
            .bind(&market.id)
            .bind(&market.name)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        let repo = db.markets();

        let market = Market {
            id: "m1".to_string(),
            name: "Chorsu".to_string(),
        };
        repo.insert(&mut conn, &market).await.unwrap();

        assert!(repo.exists(&mut conn, "m1").await.unwrap());
        assert!(!repo.exists(&mut conn, "m2").await.unwrap());
        assert_eq!(repo.get(&mut conn, "m1").await.unwrap(), Some(market));
    }
}
