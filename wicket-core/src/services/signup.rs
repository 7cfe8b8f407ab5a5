//! Signup orchestration
//!
//! Coordinates the multi-step provisioning write: uniqueness probe,
//! password hashing, transactional account + profile creation with
//! bounded retry on transient store failures, and a best-effort
//! verification email that can never fail the signup itself.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::{
    Error,
    account::{AccountId, NewAccount},
    error::{AuthError, ConflictError},
    id::generate_opaque_token,
    notifier::{Notifier, send_with_deadline, verification_email},
    profile::NewProfile,
    store::{CollisionField, CredentialStore, CredentialTx},
    validation::{validate_email, validate_password, validate_username},
};

/// Email verification tokens live for 24 hours.
pub const VERIFICATION_TOKEN_TTL: Duration = Duration::hours(24);

/// Backoff before the second and third transaction attempts.
const RETRY_BACKOFF: [std::time::Duration; 2] = [
    std::time::Duration::from_millis(500),
    std::time::Duration::from_millis(1000),
];

#[derive(Debug, Clone)]
pub struct SignupConfig {
    /// bcrypt cost factor. Deliberately low (8) to bound request latency;
    /// raising it trades signin/signup latency for brute-force resistance.
    pub bcrypt_cost: u32,
    /// Base URL used in the verification link.
    pub app_url: String,
    /// Hard deadline for the verification email send.
    pub notifier_deadline: std::time::Duration,
}

impl Default for SignupConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: 8,
            app_url: "http://localhost:3000".to_string(),
            notifier_deadline: std::time::Duration::from_millis(1500),
        }
    }
}

/// Result of a successful signup.
#[derive(Debug, Clone)]
pub struct SignupOutcome {
    pub account_id: AccountId,
    /// Whether the verification email actually went out. `false` means
    /// the caller should offer a resend.
    pub verification_sent: bool,
    pub verification_expires_at: DateTime<Utc>,
}

pub struct SignupService<S: CredentialStore> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    config: SignupConfig,
}

impl<S: CredentialStore> SignupService<S> {
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>, config: SignupConfig) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Register a new account with a username, email, and password.
    ///
    /// Validation and the combined uniqueness probe run before any write.
    /// The account and profile inserts share one transaction; transient
    /// failures are retried up to twice with backoff, each attempt on a
    /// fresh transaction. Conflicts and validation errors are never
    /// retried.
    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<SignupOutcome, Error> {
        let username = username.trim();
        let email = email.trim();

        validate_email(email)?;
        validate_username(username)?;
        validate_password(password)?;

        if let Some(field) = self.store.check_collision(email, username).await? {
            return Err(match field {
                CollisionField::Email => ConflictError::EmailTaken,
                CollisionField::Username => ConflictError::UsernameTaken,
            }
            .into());
        }

        let password_hash = bcrypt::hash(password, self.config.bcrypt_cost)
            .map_err(|e| Error::Auth(AuthError::PasswordHash(e.to_string())))?;

        let token = generate_opaque_token();
        let expires_at = Utc::now() + VERIFICATION_TOKEN_TTL;

        let account_id = self
            .provision(username, email, &password_hash, &token, expires_at)
            .await?;

        tracing::info!(%account_id, "account provisioned");

        let (subject, body) = verification_email(&self.config.app_url, &token);
        let verification_sent = send_with_deadline(
            self.notifier.as_ref(),
            self.config.notifier_deadline,
            email,
            &subject,
            &body,
        )
        .await;

        Ok(SignupOutcome {
            account_id,
            verification_sent,
            verification_expires_at: expires_at,
        })
    }

    async fn provision(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<AccountId, Error> {
        let mut attempt = 0;
        loop {
            match self
                .try_provision(username, email, password_hash, token, expires_at)
                .await
            {
                Ok(account_id) => return Ok(account_id),
                Err(e) if e.is_transient() && attempt < RETRY_BACKOFF.len() => {
                    tracing::warn!(attempt, error = %e, "transient failure provisioning account, retrying");
                    tokio::time::sleep(RETRY_BACKOFF[attempt]).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One provisioning attempt on a fresh transaction.
    async fn try_provision(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<AccountId, Error> {
        let mut tx = self.store.begin().await?;

        let new_account = NewAccount::with_password(email, password_hash, token, expires_at);
        let account = match tx.insert_account(new_account).await {
            Ok(account) => account,
            Err(e) => {
                rollback_quietly(tx).await;
                return Err(e);
            }
        };

        let profile = NewProfile::new(account.id.clone(), username);
        if let Err(e) = tx.insert_profile(profile).await {
            rollback_quietly(tx).await;
            return Err(e);
        }

        tx.commit().await?;
        Ok(account.id)
    }
}

async fn rollback_quietly<T: CredentialTx>(tx: T) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, "rollback failed after provisioning error");
    }
}
