use crate::{db::models::camera_models::Camera, error::Error};
use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const CAMERA_COLUMNS: &str = "id, name, location, stream_url, active, created_at, created_by";

/// Cameras repository for handling camera operations
#[derive(Clone)]
pub struct CamerasRepository {
    pool: Arc<PgPool>,
}

impl CamerasRepository {
    /// Create a new cameras repository
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Register a new camera
    pub async fn create(&self, camera: &Camera) -> Result<Camera> {
        info!("Registering new camera: {}", camera.name);

        let result = sqlx::query_as::<_, Camera>(
            r#"
            INSERT INTO cameras (id, name, location, stream_url, active, created_at, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, location, stream_url, active, created_at, created_by
            "#,
        )
        .bind(camera.id)
        .bind(&camera.name)
        .bind(&camera.location)
        .bind(&camera.stream_url)
        .bind(camera.active)
        .bind(camera.created_at)
        .bind(camera.created_by)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create camera: {}", e)))?;

        Ok(result)
    }

    /// Get camera by ID
    pub async fn get_by_id(&self, id: &Uuid) -> Result<Option<Camera>> {
        let result = sqlx::query_as::<_, Camera>(&format!(
            "SELECT {} FROM cameras WHERE id = $1",
            CAMERA_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get camera by ID: {}", e)))?;

        Ok(result)
    }

    /// Get all cameras ordered by name
    pub async fn get_all(&self) -> Result<Vec<Camera>> {
        let result = sqlx::query_as::<_, Camera>(&format!(
            "SELECT {} FROM cameras ORDER BY name",
            CAMERA_COLUMNS
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get all cameras: {}", e)))?;

        Ok(result)
    }

    /// Get all active cameras ordered by name
    pub async fn get_active(&self) -> Result<Vec<Camera>> {
        let result = sqlx::query_as::<_, Camera>(&format!(
            "SELECT {} FROM cameras WHERE active ORDER BY name",
            CAMERA_COLUMNS
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get active cameras: {}", e)))?;

        Ok(result)
    }

    /// Update camera metadata
    pub async fn update(&self, camera: &Camera) -> Result<Camera> {
        let result = sqlx::query_as::<_, Camera>(
            r#"
            UPDATE cameras
            SET name = $1, location = $2, stream_url = $3, active = $4
            WHERE id = $5
            RETURNING id, name, location, stream_url, active, created_at, created_by
            "#,
        )
        .bind(&camera.name)
        .bind(&camera.location)
        .bind(&camera.stream_url)
        .bind(camera.active)
        .bind(camera.id)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to update camera: {}", e)))?;

        Ok(result)
    }

    /// Delete camera
    pub async fn delete(&self, id: &Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cameras WHERE id = $1")
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to delete camera: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}
