//! Password reset
//!
//! Structurally the verification flow with a shorter fuse: a single-use
//! reset token lives for one hour, and a successful reset writes the new
//! hash and clears the token in the same write so a used token can never
//! authorize a second reset.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::{
    Error,
    error::{AuthError, ExpiredToken, NotFoundError},
    id::generate_opaque_token,
    notifier::{Notifier, reset_email, send_with_deadline},
    store::CredentialStore,
    validation::{validate_email, validate_password},
};

/// Reset tokens live for one hour.
pub const RESET_TOKEN_TTL: Duration = Duration::hours(1);

#[derive(Debug, Clone)]
pub struct ResetConfig {
    pub bcrypt_cost: u32,
    pub app_url: String,
    pub notifier_deadline: std::time::Duration,
    /// Production behavior: report success for unknown emails so the
    /// endpoint cannot be used to enumerate accounts. Development mode
    /// surfaces the miss as a not-found error instead.
    pub mask_unknown_email: bool,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: 8,
            app_url: "http://localhost:3000".to_string(),
            notifier_deadline: std::time::Duration::from_millis(1500),
            mask_unknown_email: true,
        }
    }
}

/// Result of a forgot-password request. `email_sent` is best-effort and
/// deliberately indistinguishable from the masked unknown-email case.
#[derive(Debug, Clone)]
pub struct ForgotOutcome {
    pub email_sent: bool,
}

pub struct PasswordResetService<S: CredentialStore> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    config: ResetConfig,
}

impl<S: CredentialStore> PasswordResetService<S> {
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>, config: ResetConfig) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Issue a reset token for the given email and send the reset link.
    pub async fn forgot_password(&self, email: &str) -> Result<ForgotOutcome, Error> {
        let email = email.trim();
        validate_email(email)?;

        let account = match self.store.find_account_by_email(email).await? {
            Some(account) => account,
            None if self.config.mask_unknown_email => {
                tracing::info!("password reset requested for unknown email");
                return Ok(ForgotOutcome { email_sent: false });
            }
            None => return Err(Error::NotFound(NotFoundError::Account)),
        };

        let token = generate_opaque_token();
        let expires_at = Utc::now() + RESET_TOKEN_TTL;
        self.store
            .set_reset_token(&account.id, &token, expires_at)
            .await?;

        let (subject, body) = reset_email(&self.config.app_url, &token);
        let email_sent = send_with_deadline(
            self.notifier.as_ref(),
            self.config.notifier_deadline,
            email,
            &subject,
            &body,
        )
        .await;

        Ok(ForgotOutcome { email_sent })
    }

    /// Redeem a reset token and set the new password.
    ///
    /// The hash update and the token invalidation are one atomic write.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), Error> {
        validate_password(new_password)?;

        let account = self
            .store
            .find_account_by_reset_token(token)
            .await?
            .ok_or(Error::NotFound(NotFoundError::Token))?;

        match account.reset_expires_at {
            Some(expires_at) if Utc::now() <= expires_at => {
                let password_hash = bcrypt::hash(new_password, self.config.bcrypt_cost)
                    .map_err(|e| Error::Auth(AuthError::PasswordHash(e.to_string())))?;

                self.store
                    .complete_password_reset(&account.id, &password_hash)
                    .await?;

                tracing::info!(account_id = %account.id, "password reset completed");
                Ok(())
            }
            _ => Err(Error::Expired(ExpiredToken {
                account_id: account.id,
                email: account.email,
            })),
        }
    }
}
