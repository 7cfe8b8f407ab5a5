//! Email verification
//!
//! Single-use, time-boxed verification tokens stored on the account.
//! Redemption looks the token up ignoring expiry first, so an expired
//! redemption can be answered with a distinguishable "expired" result
//! (carrying the account identity for a re-issue offer) instead of a
//! generic "invalid".

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    Error,
    account::Account,
    error::{ExpiredToken, NotFoundError},
    id::generate_opaque_token,
    notifier::{Notifier, send_with_deadline, verification_email},
    store::CredentialStore,
    validation::validate_email,
};

use super::signup::VERIFICATION_TOKEN_TTL;

#[derive(Debug, Clone)]
pub struct VerificationConfig {
    pub app_url: String,
    pub notifier_deadline: std::time::Duration,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            app_url: "http://localhost:3000".to_string(),
            notifier_deadline: std::time::Duration::from_millis(1500),
        }
    }
}

/// Result of a re-request for a verification email.
#[derive(Debug, Clone)]
pub struct ResendOutcome {
    pub already_verified: bool,
    pub verification_sent: bool,
    pub verification_expires_at: Option<DateTime<Utc>>,
}

pub struct EmailVerificationService<S: CredentialStore> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    config: VerificationConfig,
}

impl<S: CredentialStore> EmailVerificationService<S> {
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>, config: VerificationConfig) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Redeem a verification token.
    ///
    /// Already-verified accounts redeem idempotently. An expired token
    /// returns [`Error::Expired`] carrying the account id and email so
    /// the caller can offer a re-issue. A valid redemption sets the
    /// verified flag and invalidates the token in one atomic write.
    pub async fn redeem(&self, token: &str) -> Result<Account, Error> {
        let account = self
            .store
            .find_account_by_verification_token(token)
            .await?
            .ok_or(Error::NotFound(NotFoundError::Token))?;

        if account.is_email_verified() {
            return Ok(account);
        }

        match account.verification_expires_at {
            Some(expires_at) if Utc::now() <= expires_at => {
                self.store.mark_email_verified(&account.id).await?;
                tracing::info!(account_id = %account.id, "email verified");

                self.store
                    .find_account_by_id(&account.id)
                    .await?
                    .ok_or(Error::NotFound(NotFoundError::Account))
            }
            _ => Err(Error::Expired(ExpiredToken {
                account_id: account.id,
                email: account.email,
            })),
        }
    }

    /// Rotate the verification token and resend the email.
    ///
    /// Rotation invalidates any previously issued token at the moment
    /// the new one is written.
    pub async fn resend(&self, email: &str) -> Result<ResendOutcome, Error> {
        let email = email.trim();
        validate_email(email)?;

        let account = self
            .store
            .find_account_by_email(email)
            .await?
            .ok_or(Error::NotFound(NotFoundError::Account))?;

        if account.is_email_verified() {
            return Ok(ResendOutcome {
                already_verified: true,
                verification_sent: false,
                verification_expires_at: None,
            });
        }

        let token = generate_opaque_token();
        let expires_at = Utc::now() + VERIFICATION_TOKEN_TTL;
        self.store
            .set_verification_token(&account.id, &token, expires_at)
            .await?;

        let (subject, body) = verification_email(&self.config.app_url, &token);
        let verification_sent = send_with_deadline(
            self.notifier.as_ref(),
            self.config.notifier_deadline,
            email,
            &subject,
            &body,
        )
        .await;

        Ok(ResendOutcome {
            already_verified: false,
            verification_sent,
            verification_expires_at: Some(expires_at),
        })
    }
}
