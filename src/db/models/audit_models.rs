use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit trail entry written on every mutating operation
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<Uuid>,
    pub action_type: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub description: String,
}

/// Action types recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Login,
    CreateUser,
    UpdateUser,
    DeleteUser,
    CreateCamera,
    UpdateCamera,
    DeleteCamera,
    CreateIncident,
    AckIncident,
    ResolveIncident,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "login",
            AuditAction::CreateUser => "create_user",
            AuditAction::UpdateUser => "update_user",
            AuditAction::DeleteUser => "delete_user",
            AuditAction::CreateCamera => "create_camera",
            AuditAction::UpdateCamera => "update_camera",
            AuditAction::DeleteCamera => "delete_camera",
            AuditAction::CreateIncident => "create_incident",
            AuditAction::AckIncident => "ack_incident",
            AuditAction::ResolveIncident => "resolve_incident",
        }
    }
}
