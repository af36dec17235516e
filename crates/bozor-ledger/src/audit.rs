//! # Audit Recorder
//!
//! Appends one [`AuditEntry`] per state change, after the change has
//! committed. Recording is best effort: a failed write is logged at `error`
//! and dropped, so a committed sale is never reported as failed because of
//! its audit trail.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error};
use uuid::Uuid;

use bozor_core::{Actor, AuditAction, AuditEntry, EntityType};
use bozor_db::AuditRepository;

use crate::error::LedgerResult;

/// Where audit entries go.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> LedgerResult<()>;

    /// Entries about one entity, newest first.
    async fn entries_for(&self, entity_type: EntityType, entity_id: &str)
        -> LedgerResult<Vec<AuditEntry>>;
}

#[async_trait]
impl AuditStore for AuditRepository {
    async fn append(&self, entry: &AuditEntry) -> LedgerResult<()> {
        Ok(self.insert(entry).await?)
    }

    async fn entries_for(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> LedgerResult<Vec<AuditEntry>> {
        Ok(self.list_for_entity(entity_type, entity_id).await?)
    }
}

/// Builds an entry stamped with a fresh id and the current time.
pub fn new_entry(
    action: AuditAction,
    entity_type: EntityType,
    entity_id: impl Into<String>,
    details: Value,
    actor: &Actor,
) -> AuditEntry {
    AuditEntry {
        id: Uuid::new_v4().to_string(),
        action,
        entity_type,
        entity_id: entity_id.into(),
        details,
        timestamp: Utc::now(),
        actor_id: actor.id.clone(),
    }
}

#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        AuditRecorder { store }
    }

    pub async fn record(
        &self,
        action: AuditAction,
        entity_type: EntityType,
        entity_id: &str,
        details: Value,
        actor: &Actor,
    ) {
        self.write(new_entry(action, entity_type, entity_id, details, actor))
            .await;
    }

    /// Writes an entry built earlier (inside a unit of work).
    pub async fn write(&self, entry: AuditEntry) {
        match self.store.append(&entry).await {
            Ok(()) => debug!(
                action = %entry.action,
                entity_type = %entry.entity_type,
                entity_id = %entry.entity_id,
                "Audit entry recorded"
            ),
            Err(e) => error!(
                action = %entry.action,
                entity_type = %entry.entity_type,
                entity_id = %entry.entity_id,
                actor_id = %entry.actor_id,
                error = %e,
                "Failed to record audit entry"
            ),
        }
    }

    pub async fn entries_for(
        &self,
        entity_type: EntityType,
        entity_id: &str,
    ) -> LedgerResult<Vec<AuditEntry>> {
        self.store.entries_for(entity_type, entity_id).await
    }
}

impl std::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditRecorder").finish_non_exhaustive()
    }
}
