use crate::config::SecurityConfig;
use crate::db::models::user_models::{User, UserRole};
use crate::db::repositories::users::UsersRepository;
use crate::security::password;
use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const ADMIN_PASSWORD_ENV: &str = "PSIM_SEED_ADMIN_PASSWORD";
const OPERATOR_PASSWORD_ENV: &str = "PSIM_SEED_OPERATOR_PASSWORD";

/// Create the bootstrap admin (and optionally operator) account when the
/// roster is empty. A roster with any rows at all is left alone, even when
/// every admin is deactivated; recovering a lockout is a manual operation,
/// not a startup side effect. Passwords come from the environment and are
/// never logged; with no admin password set, seeding is skipped and the
/// operator has to restart with the variable in place.
pub async fn seed_initial_users(pool: Arc<PgPool>, security: &SecurityConfig) -> Result<()> {
    let users_repo = UsersRepository::new(pool);

    if users_repo.count().await? > 0 {
        return Ok(());
    }

    let admin_password = match std::env::var(ADMIN_PASSWORD_ENV) {
        Ok(value) if !value.is_empty() => value,
        _ => {
            warn!(
                "Roster is empty and {} is not set; skipping bootstrap seeding",
                ADMIN_PASSWORD_ENV
            );
            return Ok(());
        }
    };

    let admin = User {
        id: Uuid::new_v4(),
        username: "admin".to_string(),
        email: "admin@psim.local".to_string(),
        password_hash: password::hash_password(&admin_password, security)?,
        role: UserRole::Admin,
        active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    users_repo.create(&admin).await?;
    info!("Seeded bootstrap admin account");

    if let Ok(operator_password) = std::env::var(OPERATOR_PASSWORD_ENV) {
        if !operator_password.is_empty() {
            let operator = User {
                id: Uuid::new_v4(),
                username: "operator".to_string(),
                email: "operator@psim.local".to_string(),
                password_hash: password::hash_password(&operator_password, security)?,
                role: UserRole::Operator,
                active: true,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            users_repo.create(&operator).await?;
            info!("Seeded bootstrap operator account");
        }
    }

    Ok(())
}
