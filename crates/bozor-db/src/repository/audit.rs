//! # Audit Repository
//!
//! Append-only store for [`AuditEntry`]. Writes go straight to the pool,
//! never into a business transaction: an entry is recorded only after the
//! change it describes has committed, and a failed audit write can never
//! roll that change back.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};

use bozor_core::{AuditAction, AuditEntry, EntityType};

use crate::error::DbResult;

#[derive(Debug, FromRow)]
struct AuditRow {
    id: String,
    action: AuditAction,
    entity_type: EntityType,
    entity_id: String,
    details: String,
    timestamp: DateTime<Utc>,
    actor_id: String,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = serde_json::Error;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(AuditEntry {
            id: row.id,
            action: row.action,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            details: serde_json::from_str(&row.details)?,
            timestamp: row.timestamp,
            actor_id: row.actor_id,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

impl AuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AuditRepository { pool }
    }

    pub async fn insert(&self, entry: &AuditEntry) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_entries (
                id, action, entity_type, entity_id, details, timestamp, actor_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&entry.id)
        .bind(entry.action)
        .bind(entry.entity_type)
        .bind(&entry.entity_id)
        .bind(entry.details.to_string())
        .bind(entry.timestamp)
        .bind(&entry.actor_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Entries about one entity, newest first.
    pub async fn list_for_entity(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> DbResult<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, action, entity_type, entity_id, details, timestamp, actor_id
            FROM audit_entries
            WHERE entity_type = ?1 AND entity_id = ?2
            ORDER BY timestamp DESC, rowid DESC
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(AuditEntry::try_from(row)?);
        }
        Ok(entries)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
