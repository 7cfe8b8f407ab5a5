//! Password signin
//!
//! Verifies credentials and issues the stateless access/refresh pair.
//! Missing account, provider-only account, and wrong password all read
//! as the same `InvalidCredentials` so the endpoint can't be used to
//! probe which emails exist.

use std::sync::Arc;

use crate::{
    Error,
    error::{AuthError, StorageError, ValidationError},
    store::CredentialStore,
    token::{TokenCodec, TokenIdentity, TokenPair},
};

pub struct SigninService<S: CredentialStore> {
    store: Arc<S>,
    codec: Arc<TokenCodec>,
}

impl<S: CredentialStore> SigninService<S> {
    pub fn new(store: Arc<S>, codec: Arc<TokenCodec>) -> Self {
        Self { store, codec }
    }

    /// Authenticate and issue tokens.
    ///
    /// Unverified accounts are rejected after the password check with a
    /// distinguishable error so the caller can prompt for verification.
    pub async fn signin(&self, email: &str, password: &str) -> Result<TokenPair, Error> {
        let email = email.trim();
        if email.is_empty() {
            return Err(Error::Validation(ValidationError::MissingField(
                "email".to_string(),
            )));
        }
        if password.is_empty() {
            return Err(Error::Validation(ValidationError::MissingField(
                "password".to_string(),
            )));
        }

        let account = self
            .store
            .find_account_by_email(email)
            .await?
            .ok_or(Error::Auth(AuthError::InvalidCredentials))?;

        let password_hash = account
            .password_hash
            .as_deref()
            .ok_or(Error::Auth(AuthError::InvalidCredentials))?;

        let matches = bcrypt::verify(password, password_hash)
            .map_err(|e| Error::Auth(AuthError::PasswordHash(e.to_string())))?;
        if !matches {
            return Err(Error::Auth(AuthError::InvalidCredentials));
        }

        if !account.is_email_verified() {
            return Err(Error::Auth(AuthError::EmailNotVerified));
        }

        let profile = self
            .store
            .find_profile(&account.id)
            .await?
            .ok_or_else(|| {
                Error::Storage(StorageError::Database(format!(
                    "account {} has no profile",
                    account.id
                )))
            })?;

        tracing::info!(account_id = %account.id, "signin");

        self.codec.issue_pair(&TokenIdentity {
            account_id: account.id,
            username: profile.username,
            email: account.email,
            avatar_url: profile.avatar_url,
        })
    }
}
