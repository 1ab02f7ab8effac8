//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] nom_naa_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// Email already registered.
    #[error("email already exists")]
    EmailTaken,

    /// Username already registered.
    #[error("username already exists")]
    UsernameTaken,

    /// A registration or profile field failed validation.
    #[error("{0}")]
    Invalid(String),

    /// Password too weak or invalid.
    #[error("{0}")]
    WeakPassword(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// Map a repository conflict onto the field that collided.
    pub(crate) fn from_repository(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Conflict(msg) if msg.starts_with("email") => Self::EmailTaken,
            RepositoryError::Conflict(msg) if msg.starts_with("username") => Self::UsernameTaken,
            other => Self::Repository(other),
        }
    }
}
