use crate::config::SecurityConfig;
use crate::db::models::audit_models::AuditAction;
use crate::db::models::user_models::{AuthToken, LoginCredentials, User};
use crate::db::repositories::audit::AuditRepository;
use crate::db::repositories::users::UsersRepository;
use crate::error::Error;
use crate::security::{password, SecurityService};
use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

/// Authentication service for handling user login
pub struct AuthService {
    users_repo: UsersRepository,
    audit_repo: AuditRepository,
    security: SecurityService,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(pool: Arc<PgPool>, config: &SecurityConfig) -> Self {
        Self {
            users_repo: UsersRepository::new(pool.clone()),
            audit_repo: AuditRepository::new(pool),
            security: SecurityService::new(config.clone()),
        }
    }

    /// Login a user with username/password
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<(User, AuthToken)> {
        // Find user by username
        let user = self
            .users_repo
            .get_by_username(&credentials.username)
            .await?
            .ok_or_else(|| Error::Authentication("Invalid username or password".to_string()))?;

        // Check if user is active
        if !user.active {
            return Err(Error::Authentication("User account is inactive".to_string()).into());
        }

        // Verify password
        let valid = password::verify_password(&credentials.password, &user.password_hash)?;

        if !valid {
            return Err(Error::Authentication("Invalid username or password".to_string()).into());
        }

        // Generate auth token
        let token = self.security.generate_token(&user)?;

        self.audit_repo
            .record(
                Some(&user.id),
                AuditAction::Login,
                Some("user"),
                Some(&user.id.to_string()),
                &format!("User {} logged in", user.username),
            )
            .await?;

        info!("User logged in: {}", user.username);

        Ok((user, token))
    }
}
