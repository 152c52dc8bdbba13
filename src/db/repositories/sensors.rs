use crate::{db::models::sensor_models::SensorSnapshot, error::Error};
use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;

/// Sensors repository. The core never writes readings; ingestion belongs
/// to an external collaborator.
#[derive(Clone)]
pub struct SensorsRepository {
    pool: Arc<PgPool>,
}

impl SensorsRepository {
    /// Create a new sensors repository
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Latest reading per active sensor, one row each
    pub async fn latest_snapshots(&self) -> Result<Vec<SensorSnapshot>> {
        let result = sqlx::query_as::<_, SensorSnapshot>(
            r#"
            SELECT DISTINCT ON (s.id)
                   s.id AS sensor_id, s.name, s.sensor_type, s.location,
                   r.value AS latest_value, r.smoke_detected, r.timestamp
            FROM sensors s
            JOIN sensor_readings r ON r.sensor_id = s.id
            WHERE s.active
            ORDER BY s.id, r.timestamp DESC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get latest sensor readings: {}", e)))?;

        Ok(result)
    }
}
