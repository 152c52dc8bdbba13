pub mod audit_models;
pub mod camera_models;
pub mod incident_models;
pub mod sensor_models;
pub mod user_models;

pub use audit_models::{AuditAction, AuditEntry};
pub use camera_models::{Camera, NewCamera};
pub use incident_models::{Incident, IncidentType, IncidentWithAcknowledger, Severity};
pub use sensor_models::{Sensor, SensorReading, SensorSnapshot};
pub use user_models::{AuthToken, LoginCredentials, User, UserPatch, UserRole};
