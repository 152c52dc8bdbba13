use crate::{
    db::models::audit_models::{AuditAction, AuditEntry},
    error::Error,
};
use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Audit log repository
#[derive(Clone)]
pub struct AuditRepository {
    pool: Arc<PgPool>,
}

impl AuditRepository {
    /// Create a new audit repository
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Record an audit entry
    pub async fn record(
        &self,
        user_id: Option<&Uuid>,
        action: AuditAction,
        entity_type: Option<&str>,
        entity_id: Option<&str>,
        description: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (user_id, action_type, entity_type, entity_id, description)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user_id)
        .bind(action.as_str())
        .bind(entity_type)
        .bind(entity_id)
        .bind(description)
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to record audit entry: {}", e)))?;

        Ok(())
    }

    /// Most recent audit entries
    pub async fn recent(&self, limit: i64) -> Result<Vec<AuditEntry>> {
        let result = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT id, timestamp, user_id, action_type, entity_type, entity_id, description
            FROM audit_log
            ORDER BY timestamp DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get audit entries: {}", e)))?;

        Ok(result)
    }
}
