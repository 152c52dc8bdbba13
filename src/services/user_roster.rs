use crate::config::SecurityConfig;
use crate::db::models::audit_models::AuditAction;
use crate::db::models::user_models::{User, UserPatch, UserRole};
use crate::db::repositories::audit::AuditRepository;
use crate::db::repositories::users::UsersRepository;
use crate::error::Error;
use crate::security::{authorize, password, Action, SessionUser};
use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Owns create/update/delete of user accounts and enforces the last-admin
/// invariant: no mutation exposed here can leave the roster without an
/// active admin. The count check and the write are serialized by the
/// repository's roster lock.
#[derive(Clone)]
pub struct UserRoster {
    users_repo: UsersRepository,
    audit_repo: AuditRepository,
    security: SecurityConfig,
}

impl UserRoster {
    /// Create a new user roster manager
    pub fn new(pool: Arc<PgPool>, security: &SecurityConfig) -> Self {
        Self {
            users_repo: UsersRepository::new(pool.clone()),
            audit_repo: AuditRepository::new(pool),
            security: security.clone(),
        }
    }

    /// List all users, newest first
    pub async fn list(&self, actor: &SessionUser) -> Result<Vec<User>> {
        authorize(actor.role, Action::ManageUsers)?;
        self.users_repo.get_all().await
    }

    /// Create a new user account. The password is hashed before storage;
    /// the plaintext is never persisted or logged.
    pub async fn create(
        &self,
        actor: &SessionUser,
        email: &str,
        username: &str,
        plaintext_password: &str,
        role: UserRole,
    ) -> Result<User> {
        authorize(actor.role, Action::ManageUsers)?;

        if self.users_repo.get_by_email(email).await?.is_some() {
            return Err(Error::DuplicateEmail(email.to_string()).into());
        }

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password::hash_password(plaintext_password, &self.security)?,
            role,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let created = self.users_repo.create(&user).await?;

        self.audit_repo
            .record(
                Some(&actor.user_id),
                AuditAction::CreateUser,
                Some("user"),
                Some(&created.id.to_string()),
                &format!("User {} created with role {}", username, role.as_str()),
            )
            .await?;

        info!("User {} created by {}", username, actor.username);

        Ok(created)
    }

    /// Apply a partial update. Absent fields keep their stored values; an
    /// absent password keeps the existing hash. Demoting or deactivating
    /// the last active admin fails with no mutation.
    pub async fn update(&self, actor: &SessionUser, id: &Uuid, patch: UserPatch) -> Result<User> {
        authorize(actor.role, Action::ManageUsers)?;

        let mut user = self
            .users_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("User not found: {}", id)))?;

        if let Some(email) = &patch.email {
            if let Some(existing) = self.users_repo.get_by_email(email).await? {
                if existing.id != *id {
                    return Err(Error::DuplicateEmail(email.clone()).into());
                }
            }
            user.email = email.clone();
        }
        if let Some(username) = patch.username {
            user.username = username;
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(active) = patch.active {
            user.active = active;
        }
        if let Some(plaintext) = &patch.password {
            user.password_hash = password::hash_password(plaintext, &self.security)?;
        }

        // The repository re-reads the stored row under the roster lock and
        // rejects the write if it would remove the last active admin.
        let updated = self.users_repo.update_checked(&user).await?;

        self.audit_repo
            .record(
                Some(&actor.user_id),
                AuditAction::UpdateUser,
                Some("user"),
                Some(&id.to_string()),
                &format!("User {} updated", updated.username),
            )
            .await?;

        Ok(updated)
    }

    /// Delete a user account, refusing to remove the last active admin
    pub async fn delete(&self, actor: &SessionUser, id: &Uuid) -> Result<()> {
        authorize(actor.role, Action::ManageUsers)?;

        self.users_repo.delete_checked(id).await?;

        self.audit_repo
            .record(
                Some(&actor.user_id),
                AuditAction::DeleteUser,
                Some("user"),
                Some(&id.to_string()),
                &format!("User {} deleted", id),
            )
            .await?;

        Ok(())
    }
}
