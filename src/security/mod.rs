use crate::config::SecurityConfig;
use crate::db::models::user_models::{AuthToken, User, UserRole};
use crate::error::Error;
use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod auth;
pub mod authorize;
pub mod password;

pub use authorize::{authorize, Action};

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// User name
    pub name: String,
    /// User role
    pub role: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

impl Claims {
    /// Get the user ID from the claims
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub)
            .map_err(|e| Error::Authentication(format!("Invalid user ID in token: {}", e)).into())
    }

    /// Get the role from the claims as the closed enum
    pub fn user_role(&self) -> Result<UserRole> {
        UserRole::parse(&self.role)
            .ok_or_else(|| Error::Authentication(format!("Unknown role: {}", self.role)).into())
    }
}

/// The authenticated identity behind a request, resolved from validated
/// claims. Services take this instead of raw claims so the role is already
/// the closed enum.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
}

impl SessionUser {
    pub fn from_claims(claims: &Claims) -> Result<Self> {
        Ok(Self {
            user_id: claims.user_id()?,
            username: claims.name.clone(),
            role: claims.user_role()?,
        })
    }
}

/// Security service for issuing and validating session tokens
#[derive(Clone)]
pub struct SecurityService {
    config: SecurityConfig,
}

impl SecurityService {
    /// Create a new security service
    pub fn new(config: SecurityConfig) -> Self {
        Self { config }
    }

    /// Generate a JWT token for a user
    pub fn generate_token(&self, user: &User) -> Result<AuthToken> {
        let now = Utc::now();
        let expiration = now + Duration::minutes(self.config.jwt_expiration_minutes as i64);

        let claims = Claims {
            sub: user.id.to_string(),
            name: user.username.clone(),
            role: user.role.as_str().to_string(),
            exp: expiration.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| Error::Authentication(format!("Failed to generate JWT token: {}", e)))?;

        Ok(AuthToken {
            access_token: token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.jwt_expiration_minutes * 60, // Convert to seconds
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<TokenData<Claims>> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| Error::Authentication(format!("Invalid token: {}", e)))?;

        Ok(token_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            username: "test".to_string(),
            email: "test@psim.local".to_string(),
            password_hash: "x".to_string(),
            role,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn token_round_trip_preserves_identity_and_role() {
        let service = SecurityService::new(SecurityConfig::default());
        let user = test_user(UserRole::Operator);

        let token = service.generate_token(&user).unwrap();
        let data = service.validate_token(&token.access_token).unwrap();

        assert_eq!(data.claims.user_id().unwrap(), user.id);
        assert_eq!(data.claims.user_role().unwrap(), UserRole::Operator);
        assert_eq!(data.claims.name, "test");
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let service = SecurityService::new(SecurityConfig::default());
        let other = SecurityService::new(SecurityConfig {
            jwt_secret: "another_secret".to_string(),
            ..SecurityConfig::default()
        });

        let token = other.generate_token(&test_user(UserRole::Admin)).unwrap();
        assert!(service.validate_token(&token.access_token).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        let service = SecurityService::new(SecurityConfig::default());
        assert!(service.validate_token("not.a.jwt").is_err());
    }
}
