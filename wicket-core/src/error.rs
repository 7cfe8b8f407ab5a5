use thiserror::Error;

use crate::account::AccountId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Conflict error: {0}")]
    Conflict(#[from] ConflictError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    #[error("Token expired for account {}", .0.account_id)]
    Expired(ExpiredToken),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// An expired verification or reset token.
///
/// Carries enough identity for the caller to offer a re-issue without
/// another lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredToken {
    pub account_id: AccountId,
    pub email: String,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),
}

/// Uniqueness-domain collisions. Never transient, never retried.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConflictError {
    #[error("Email is already in use")]
    EmailTaken,

    #[error("Username is already taken")]
    UsernameTaken,

    #[error("Provider identity is already linked to another account")]
    SubjectAlreadyLinked,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email not verified")]
    EmailNotVerified,

    #[error("Password hash error: {0}")]
    PasswordHash(String),
}

/// Signed-token verification failures.
///
/// `Expired` is deliberately distinct from `BadSignature`: a
/// well-signed-but-stale token must not be reported as tampering.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Malformed token: {0}")]
    Malformed(String),

    #[error("Bad token signature")]
    BadSignature,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundError {
    #[error("Account not found")]
    Account,

    #[error("Token not found")]
    Token,
}

#[derive(Debug, Error)]
pub enum StorageError {
    /// Lock conflicts, connection hiccups. Safe to retry within bounds.
    #[error("Transient storage error: {0}")]
    Transient(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(String),

    #[error("Invalid configuration value for {0}: {1}")]
    Invalid(String, String),
}

impl Error {
    /// Whether the failure may succeed on retry.
    ///
    /// Only connection-level hiccups qualify. Uniqueness conflicts and
    /// validation failures are deterministic and must never be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Storage(StorageError::Transient(_)) | Error::Storage(StorageError::Connection(_))
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}
