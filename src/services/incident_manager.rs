use crate::db::models::audit_models::AuditAction;
use crate::db::models::incident_models::{
    Incident, IncidentType, IncidentWithAcknowledger, Severity,
};
use crate::db::repositories::audit::AuditRepository;
use crate::db::repositories::incidents::IncidentsRepository;
use crate::error::Error;
use crate::security::{authorize, Action, SessionUser};
use anyhow::Result;
use rand::Rng;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

const SIMULATED_DESCRIPTION: &str = "Simulated incident for demonstration purposes";

/// Owns the incident state machine: open -> acknowledged -> resolved,
/// forward-only. Transitions are conditional updates in the repository, so
/// a taken transition is never overwritten; repeating one is an idempotent
/// success returning the stored record.
#[derive(Clone)]
pub struct IncidentManager {
    incidents_repo: IncidentsRepository,
    audit_repo: AuditRepository,
}

impl IncidentManager {
    /// Create a new incident manager
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            incidents_repo: IncidentsRepository::new(pool.clone()),
            audit_repo: AuditRepository::new(pool),
        }
    }

    /// Create a new incident in the open state
    pub async fn create(
        &self,
        incident_type: IncidentType,
        severity: Severity,
        description: Option<&str>,
    ) -> Result<Incident> {
        let incident = self
            .incidents_repo
            .create(incident_type, severity, description)
            .await?;

        self.audit_repo
            .record(
                None,
                AuditAction::CreateIncident,
                Some("incident"),
                Some(&incident.id.to_string()),
                &format!(
                    "Incident created: {} severity {}",
                    incident_type.as_str(),
                    severity.level()
                ),
            )
            .await?;

        Ok(incident)
    }

    /// Create a demo incident with uniformly random type and severity
    pub async fn simulate(&self) -> Result<Incident> {
        let (incident_type, severity) = {
            let mut rng = rand::thread_rng();
            let incident_type = IncidentType::ALL[rng.gen_range(0..IncidentType::ALL.len())];
            // Severity levels run 1..=3
            let severity = Severity::from_level(rng.gen_range(1..=3))
                .ok_or_else(|| Error::Internal("Severity out of range".to_string()))?;
            (incident_type, severity)
        };

        self.create(incident_type, severity, Some(SIMULATED_DESCRIPTION))
            .await
    }

    /// Acknowledge an incident. Idempotent: acknowledging an incident that
    /// is already acknowledged (or resolved) returns the stored record with
    /// the original acknowledger and timestamp intact.
    pub async fn acknowledge(&self, id: i64, actor: &SessionUser) -> Result<Incident> {
        authorize(actor.role, Action::AcknowledgeIncident)?;

        if let Some(incident) = self.incidents_repo.try_acknowledge(id, &actor.user_id).await? {
            info!("Incident {} acknowledged by {}", id, actor.username);

            self.audit_repo
                .record(
                    Some(&actor.user_id),
                    AuditAction::AckIncident,
                    Some("incident"),
                    Some(&id.to_string()),
                    &format!("Incident {} acknowledged", id),
                )
                .await?;

            return Ok(incident);
        }

        // No row matched: the incident is missing or the transition was
        // already taken.
        self.incidents_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Incident not found: {}", id)).into())
    }

    /// Resolve an acknowledged incident. Resolving an already-resolved
    /// incident is an idempotent success; resolving an unacknowledged one
    /// is a conflict.
    pub async fn resolve(&self, id: i64, actor: &SessionUser) -> Result<Incident> {
        authorize(actor.role, Action::AcknowledgeIncident)?;

        if let Some(incident) = self.incidents_repo.try_resolve(id).await? {
            info!("Incident {} resolved by {}", id, actor.username);

            self.audit_repo
                .record(
                    Some(&actor.user_id),
                    AuditAction::ResolveIncident,
                    Some("incident"),
                    Some(&id.to_string()),
                    &format!("Incident {} resolved", id),
                )
                .await?;

            return Ok(incident);
        }

        let incident = self
            .incidents_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Incident not found: {}", id)))?;

        if !incident.acknowledged {
            return Err(Error::NotAcknowledged(id).into());
        }

        // Already resolved
        Ok(incident)
    }

    /// All incidents, newest first, with the acknowledging user's email
    pub async fn list(&self, actor: &SessionUser) -> Result<Vec<IncidentWithAcknowledger>> {
        authorize(actor.role, Action::ViewIncidents)?;
        self.incidents_repo.list_with_acknowledger().await
    }

    /// The most recent `limit` incidents
    pub async fn recent(
        &self,
        actor: &SessionUser,
        limit: i64,
    ) -> Result<Vec<IncidentWithAcknowledger>> {
        authorize(actor.role, Action::ViewIncidents)?;
        self.incidents_repo.recent_with_acknowledger(limit).await
    }
}
