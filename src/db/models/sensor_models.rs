use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sensor metadata
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Sensor {
    pub id: i64,
    pub name: String,
    pub sensor_type: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single stored reading. Readings are produced by an external ingestion
/// collaborator; this core only reads the latest one per sensor.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SensorReading {
    pub id: i64,
    pub sensor_id: i64,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub smoke_detected: Option<bool>,
}

/// Derived view: the most recent reading per active sensor, recomputed on
/// each poll. Not persisted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, PartialEq)]
pub struct SensorSnapshot {
    pub sensor_id: i64,
    pub name: String,
    pub sensor_type: String,
    pub location: Option<String>,
    pub latest_value: f64,
    pub smoke_detected: Option<bool>,
    pub timestamp: DateTime<Utc>,
}
