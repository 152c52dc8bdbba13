use crate::{
    db::models::user_models::{User, UserRole},
    error::Error,
};
use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Advisory lock key serializing admin-affecting roster mutations. Every
/// update or delete that could reduce the active-admin count takes this
/// lock for the duration of its transaction, so the count check and the
/// mutation are atomic with respect to concurrent callers.
const ROSTER_LOCK_KEY: i64 = 0x5053_494d_5f41_444d; // "PSIM_ADM"

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, active, created_at, updated_at";

/// Users repository for handling user operations
#[derive(Clone)]
pub struct UsersRepository {
    pool: Arc<PgPool>,
}

impl UsersRepository {
    /// Create a new users repository
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create a new user
    pub async fn create(&self, user: &User) -> Result<User> {
        info!("Creating new user: {}", user.username);

        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash, role, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, username, email, password_hash, role, active, created_at, updated_at
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &user.email, "Failed to create user"))?;

        Ok(result)
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        let result = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get user by ID: {}", e)))?;

        Ok(result)
    }

    /// Get user by username
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let result = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get user by username: {}", e)))?;

        Ok(result)
    }

    /// Get user by email
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let result = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get user by email: {}", e)))?;

        Ok(result)
    }

    /// Get all users, newest first
    pub async fn get_all(&self) -> Result<Vec<User>> {
        let result = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users ORDER BY created_at DESC",
            USER_COLUMNS
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get all users: {}", e)))?;

        Ok(result)
    }

    /// Total number of user rows, active or not
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to count users: {}", e)))?;

        Ok(count)
    }

    /// Count users that are active admins
    pub async fn count_active_admins(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE role = 'admin' AND active",
        )
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to count active admins: {}", e)))?;

        Ok(count)
    }

    /// Update a user, refusing any change that would leave the roster with
    /// no active admin. The stored row is re-read under the roster lock, so
    /// the check and the write are atomic against concurrent mutations.
    pub async fn update_checked(&self, user: &User) -> Result<User> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(ROSTER_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to take roster lock: {}", e)))?;

        let stored = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(user.id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to get user: {}", e)))?
        .ok_or_else(|| Error::NotFound(format!("User not found: {}", user.id)))?;

        let loses_admin = (stored.role == UserRole::Admin && stored.active)
            && !(user.role == UserRole::Admin && user.active);
        if loses_admin {
            let others = count_other_active_admins(&mut tx, &user.id).await?;
            if others == 0 {
                return Err(Error::LastAdminViolation(user.id).into());
            }
        }

        let result = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET username = $1, email = $2, password_hash = $3, role = $4, active = $5, updated_at = $6
            WHERE id = $7
            RETURNING id, username, email, password_hash, role, active, created_at, updated_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.active)
        .bind(Utc::now())
        .bind(user.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, &user.email, "Failed to update user"))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit user update: {}", e)))?;

        Ok(result)
    }

    /// Delete a user, refusing to remove the last active admin. Same
    /// locking discipline as `update_checked`.
    pub async fn delete_checked(&self, id: &Uuid) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(ROSTER_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to take roster lock: {}", e)))?;

        let stored = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to get user: {}", e)))?
        .ok_or_else(|| Error::NotFound(format!("User not found: {}", id)))?;

        if stored.role == UserRole::Admin && stored.active {
            let others = count_other_active_admins(&mut tx, id).await?;
            if others == 0 {
                return Err(Error::LastAdminViolation(*id).into());
            }
        }

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to delete user: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit user deletion: {}", e)))?;

        info!("Deleted user: {}", stored.username);

        Ok(())
    }
}

async fn count_other_active_admins(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    excluded: &Uuid,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users WHERE role = 'admin' AND active AND id <> $1",
    )
    .bind(excluded)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| Error::Database(format!("Failed to count active admins: {}", e)))?;

    Ok(count)
}

fn map_unique_violation(e: sqlx::Error, email: &str, context: &str) -> anyhow::Error {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some("23505") {
            return Error::DuplicateEmail(email.to_string()).into();
        }
    }
    Error::Database(format!("{}: {}", context, e)).into()
}
