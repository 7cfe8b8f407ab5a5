//! Account model
//!
//! The authentication identity: email, optional password hash or external
//! provider subject, verification state, and the single-use token slots
//! for email verification and password reset. Accounts are never deleted
//! by this core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{generate_prefixed_id, validate_prefixed_id};

/// A unique, stable identifier for an account.
/// The value is opaque; do not parse it beyond the prefix check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: &str) -> Self {
        AccountId(id.to_string())
    }

    pub fn new_random() -> Self {
        AccountId(generate_prefixed_id("acct"))
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, "acct")
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new_random()
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,

    pub email: String,

    // None for provider-only accounts.
    pub password_hash: Option<String>,

    // External provider subject id. At most one per account, and a
    // subject is never bound to a second account.
    pub provider_subject: Option<String>,

    // None until the email has been verified.
    pub email_verified_at: Option<DateTime<Utc>>,

    pub verification_token: Option<String>,
    pub verification_expires_at: Option<DateTime<Utc>>,

    pub reset_token: Option<String>,
    pub reset_expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn is_email_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }
}

/// Insert payload for a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub id: AccountId,
    pub email: String,
    pub password_hash: Option<String>,
    pub provider_subject: Option<String>,
    pub email_verified: bool,
    pub verification_token: Option<String>,
    pub verification_expires_at: Option<DateTime<Utc>>,
}

impl NewAccount {
    /// A password signup: unverified, with a pending verification token.
    pub fn with_password(
        email: impl Into<String>,
        password_hash: impl Into<String>,
        verification_token: impl Into<String>,
        verification_expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AccountId::new_random(),
            email: email.into(),
            password_hash: Some(password_hash.into()),
            provider_subject: None,
            email_verified: false,
            verification_token: Some(verification_token.into()),
            verification_expires_at: Some(verification_expires_at),
        }
    }

    /// A federated signup: the provider vouches for the email, so the
    /// account starts verified and carries no password hash.
    pub fn with_provider(email: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            id: AccountId::new_random(),
            email: email.into(),
            password_hash: None,
            provider_subject: Some(subject.into()),
            email_verified: true,
            verification_token: None,
            verification_expires_at: None,
        }
    }
}
