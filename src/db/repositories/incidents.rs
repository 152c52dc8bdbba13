use crate::{
    db::models::incident_models::{Incident, IncidentType, IncidentWithAcknowledger, Severity},
    error::Error,
};
use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const INCIDENT_COLUMNS: &str = "id, timestamp, incident_type, description, severity, \
     acknowledged, acknowledged_by, acknowledged_at, resolved, resolved_at";

/// Incidents repository. State transitions are single conditional UPDATE
/// statements, so an already-taken transition never rewrites the original
/// acknowledger or timestamps regardless of concurrent callers.
#[derive(Clone)]
pub struct IncidentsRepository {
    pool: Arc<PgPool>,
}

impl IncidentsRepository {
    /// Create a new incidents repository
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create a new incident in the open state
    pub async fn create(
        &self,
        incident_type: IncidentType,
        severity: Severity,
        description: Option<&str>,
    ) -> Result<Incident> {
        let result = sqlx::query_as::<_, Incident>(&format!(
            r#"
            INSERT INTO incidents (incident_type, severity, description)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            INCIDENT_COLUMNS
        ))
        .bind(incident_type)
        .bind(severity)
        .bind(description)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create incident: {}", e)))?;

        info!(
            "Created incident {} ({}, severity {})",
            result.id,
            incident_type.as_str(),
            severity.level()
        );

        Ok(result)
    }

    /// Get incident by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Incident>> {
        let result = sqlx::query_as::<_, Incident>(&format!(
            "SELECT {} FROM incidents WHERE id = $1",
            INCIDENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get incident by ID: {}", e)))?;

        Ok(result)
    }

    /// Conditionally mark an incident acknowledged. Returns `None` when no
    /// row matched, i.e. the incident does not exist or was already
    /// acknowledged; the caller disambiguates with `get_by_id`.
    pub async fn try_acknowledge(&self, id: i64, acknowledged_by: &Uuid) -> Result<Option<Incident>> {
        let result = sqlx::query_as::<_, Incident>(&format!(
            r#"
            UPDATE incidents
            SET acknowledged = TRUE, acknowledged_by = $2, acknowledged_at = NOW()
            WHERE id = $1 AND NOT acknowledged
            RETURNING {}
            "#,
            INCIDENT_COLUMNS
        ))
        .bind(id)
        .bind(acknowledged_by)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to acknowledge incident: {}", e)))?;

        Ok(result)
    }

    /// Conditionally mark an acknowledged incident resolved. Returns `None`
    /// when the incident is missing, unacknowledged, or already resolved.
    pub async fn try_resolve(&self, id: i64) -> Result<Option<Incident>> {
        let result = sqlx::query_as::<_, Incident>(&format!(
            r#"
            UPDATE incidents
            SET resolved = TRUE, resolved_at = NOW()
            WHERE id = $1 AND acknowledged AND NOT resolved
            RETURNING {}
            "#,
            INCIDENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to resolve incident: {}", e)))?;

        Ok(result)
    }

    /// All incidents joined with the acknowledging user's email, newest
    /// first with id as the stable tie-break.
    pub async fn list_with_acknowledger(&self) -> Result<Vec<IncidentWithAcknowledger>> {
        self.query_with_acknowledger(None).await
    }

    /// The most recent `limit` incidents with the acknowledger join
    pub async fn recent_with_acknowledger(
        &self,
        limit: i64,
    ) -> Result<Vec<IncidentWithAcknowledger>> {
        self.query_with_acknowledger(Some(limit)).await
    }

    async fn query_with_acknowledger(
        &self,
        limit: Option<i64>,
    ) -> Result<Vec<IncidentWithAcknowledger>> {
        let mut sql = String::from(
            r#"
            SELECT i.id, i.timestamp, i.incident_type, i.description, i.severity,
                   i.acknowledged, i.acknowledged_by, i.acknowledged_at,
                   u.email AS acknowledged_by_email,
                   i.resolved, i.resolved_at
            FROM incidents i
            LEFT JOIN users u ON i.acknowledged_by = u.id
            ORDER BY i.timestamp DESC, i.id DESC
            "#,
        );

        if limit.is_some() {
            sql.push_str(" LIMIT $1");
        }

        let mut query = sqlx::query_as::<_, IncidentWithAcknowledger>(&sql);
        if let Some(limit) = limit {
            query = query.bind(limit);
        }

        let result = query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to list incidents: {}", e)))?;

        Ok(result)
    }
}
