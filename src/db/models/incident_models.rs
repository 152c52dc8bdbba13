use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Incident record. The lifecycle is forward-only:
/// open -> acknowledged -> resolved. `acknowledged_at` is set exactly when
/// `acknowledged` is, likewise `resolved_at` and `resolved`, and a resolved
/// incident is always acknowledged.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Incident {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    pub description: Option<String>,
    pub severity: Severity,
    pub acknowledged: bool,
    pub acknowledged_by: Option<Uuid>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Incident joined with the acknowledging user's display identity. The join
/// is a left join, so unacknowledged incidents carry a null email.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IncidentWithAcknowledger {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    pub description: Option<String>,
    pub severity: Severity,
    pub acknowledged: bool,
    pub acknowledged_by: Option<Uuid>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by_email: Option<String>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Incident type enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "incident_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IncidentType {
    Fire,
    Smoke,
    Temperature,
    Gas,
}

impl IncidentType {
    pub const ALL: [IncidentType; 4] = [
        IncidentType::Fire,
        IncidentType::Smoke,
        IncidentType::Temperature,
        IncidentType::Gas,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentType::Fire => "fire",
            IncidentType::Smoke => "smoke",
            IncidentType::Temperature => "temperature",
            IncidentType::Gas => "gas",
        }
    }
}

/// Severity levels, stored and serialized as their integer value
#[derive(Debug, Clone, Copy, sqlx::Type, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i32)]
pub enum Severity {
    Low = 1,
    Medium = 2,
    High = 3,
}

impl Serialize for Severity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.level())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let level = i32::deserialize(deserializer)?;
        Severity::from_level(level)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid severity level: {}", level)))
    }
}

impl Severity {
    pub fn from_level(level: i32) -> Option<Severity> {
        match level {
            1 => Some(Severity::Low),
            2 => Some(Severity::Medium),
            3 => Some(Severity::High),
            _ => None,
        }
    }

    pub fn level(&self) -> i32 {
        *self as i32
    }
}
