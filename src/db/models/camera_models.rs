use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered camera. Registration is plain CRUD owned by admins; the
/// playback controller references cameras by id and stream URL only.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Camera {
    pub id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub stream_url: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

/// Payload for registering a camera
#[derive(Debug, Clone, Deserialize)]
pub struct NewCamera {
    pub name: String,
    pub location: Option<String>,
    pub stream_url: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}
