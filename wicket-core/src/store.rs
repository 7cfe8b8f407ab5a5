//! Credential store traits
//!
//! Storage backends implement [`CredentialStore`] for single-statement
//! reads and writes, and hand out a [`CredentialTx`] per transaction.
//!
//! A `CredentialTx` owns one pinned connection for its whole lifetime.
//! `commit` and `rollback` consume the value, so a double commit or a
//! commit after rollback is unrepresentable, and two concurrent requests
//! can never share transaction state: each `begin` yields an isolated
//! session. Dropping a `CredentialTx` without committing must discard its
//! writes.
//!
//! Single-statement mutations (`mark_email_verified`,
//! `complete_password_reset`, token rotation) are atomic on their own and
//! deliberately pair the state change with the token invalidation in one
//! write: a consumed token must never survive the change it authorized.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error,
    account::{Account, AccountId, NewAccount},
    profile::{NewProfile, Profile},
};

/// Which half of the uniqueness domain a signup collided with.
/// Email is checked first when both collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionField {
    Email,
    Username,
}

#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    type Tx: CredentialTx;

    /// Open a transaction on a dedicated connection.
    async fn begin(&self) -> Result<Self::Tx, Error>;

    async fn find_account_by_id(&self, id: &AccountId) -> Result<Option<Account>, Error>;

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, Error>;

    /// Lookup by verification token value, deliberately ignoring expiry
    /// so the caller can distinguish "expired" from "unknown".
    async fn find_account_by_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<Account>, Error>;

    /// Lookup by reset token value, ignoring expiry (see above).
    async fn find_account_by_reset_token(&self, token: &str) -> Result<Option<Account>, Error>;

    async fn find_profile(&self, account_id: &AccountId) -> Result<Option<Profile>, Error>;

    /// Combined uniqueness probe for signup: one round trip for both
    /// halves of the uniqueness domain. Reports the email collision first.
    async fn check_collision(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<CollisionField>, Error>;

    /// Rotate the verification token. Any previously issued value stops
    /// matching lookups at this instant.
    async fn set_verification_token(
        &self,
        account_id: &AccountId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), Error>;

    /// Mark the email verified and clear the verification expiry in the
    /// same write. The consumed token value stays stored so a repeat of
    /// the same verification link reads as "already verified" rather
    /// than "unknown token"; with the flag set and the expiry nulled it
    /// can never authorize another transition.
    async fn mark_email_verified(&self, account_id: &AccountId) -> Result<(), Error>;

    /// Rotate the password-reset token.
    async fn set_reset_token(
        &self,
        account_id: &AccountId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), Error>;

    /// Write the new password hash and clear the reset token and expiry
    /// in the same write. A used reset token never survives the reset.
    async fn complete_password_reset(
        &self,
        account_id: &AccountId,
        password_hash: &str,
    ) -> Result<(), Error>;
}

/// A per-transaction session: one pinned connection, released exactly
/// once on commit or rollback (or on drop, which rolls back).
#[async_trait]
pub trait CredentialTx: Send + Sized {
    async fn insert_account(&mut self, account: NewAccount) -> Result<Account, Error>;

    async fn insert_profile(&mut self, profile: NewProfile) -> Result<Profile, Error>;

    /// Federated-login lookup: match on provider subject or email in a
    /// single query, subject taking precedence.
    async fn find_account_by_subject_or_email(
        &mut self,
        subject: &str,
        email: &str,
    ) -> Result<Option<Account>, Error>;

    async fn find_profile(&mut self, account_id: &AccountId) -> Result<Option<Profile>, Error>;

    /// Bind or refresh the provider subject and verified flag on an
    /// existing account.
    async fn bind_provider(
        &mut self,
        account_id: &AccountId,
        subject: &str,
        email_verified: bool,
    ) -> Result<(), Error>;

    /// In-transaction username re-check, race-safe against reads done
    /// before the transaction opened.
    async fn username_exists(&mut self, username: &str) -> Result<bool, Error>;

    async fn commit(self) -> Result<(), Error>;

    async fn rollback(self) -> Result<(), Error>;
}
