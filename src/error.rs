use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("A user with email {0} already exists")]
    DuplicateEmail(String),

    #[error("Incident {0} must be acknowledged before it can be resolved")]
    NotAcknowledged(i64),

    #[error("At least one active admin must remain; cannot modify user {0}")]
    LastAdminViolation(Uuid),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Conflict-class errors map to HTTP 409; the caller must re-read
    /// current state before retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Error::DuplicateEmail(_)
                | Error::NotAcknowledged(_)
                | Error::LastAdminViolation(_)
        )
    }
}
