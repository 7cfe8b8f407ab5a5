//! Federated identity linking
//!
//! Reconciles a verified external-provider identity (Google OAuth)
//! against local account/profile records. The whole resolution runs in
//! one transaction so a new account is never committed without its
//! profile, and the username re-check inside the transaction closes the
//! race against any earlier read.
//!
//! The "needs username" half-state is fully caller-driven: the outcome
//! carries the provider identity back and the caller replays it with a
//! chosen username on the next request. No server-side session exists.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    Error,
    account::{Account, NewAccount},
    error::ConflictError,
    profile::{NewProfile, Profile},
    store::{CredentialStore, CredentialTx},
    token::{TokenCodec, TokenIdentity, TokenPair},
    validation::validate_username,
};

/// A verified identity asserted by the external provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderIdentity {
    /// Provider subject id (`sub` claim).
    pub subject: String,
    pub email: String,
    pub email_verified: bool,
    pub avatar_url: Option<String>,
}

/// Resolution of a federated login.
#[derive(Debug)]
pub enum LinkOutcome {
    SignedIn {
        account: Account,
        profile: Profile,
        tokens: TokenPair,
    },
    /// The account needs a human-chosen username before tokens can be
    /// issued. Nothing was committed; the caller re-submits the echoed
    /// identity together with a username.
    UsernameRequired(ProviderIdentity),
}

pub struct IdentityLinker<S: CredentialStore> {
    store: Arc<S>,
    codec: Arc<TokenCodec>,
}

impl<S: CredentialStore> IdentityLinker<S> {
    pub fn new(store: Arc<S>, codec: Arc<TokenCodec>) -> Self {
        Self { store, codec }
    }

    /// Resolve a federated login, creating or binding the local account.
    pub async fn link(
        &self,
        identity: ProviderIdentity,
        username: Option<&str>,
    ) -> Result<LinkOutcome, Error> {
        // Validate outside the transaction; a bad username never costs a
        // connection.
        let username = match username {
            Some(name) => {
                let name = name.trim();
                validate_username(name)?;
                Some(name.to_string())
            }
            None => None,
        };

        let mut tx = self.store.begin().await?;

        let result = self.resolve(&mut tx, &identity, username.as_deref()).await;

        match result {
            Ok(Resolution::Complete { account, profile }) => {
                tx.commit().await?;
                tracing::info!(account_id = %account.id, "federated signin");

                let tokens = self.codec.issue_pair(&TokenIdentity {
                    account_id: account.id.clone(),
                    username: profile.username.clone(),
                    email: account.email.clone(),
                    avatar_url: profile.avatar_url.clone(),
                })?;

                Ok(LinkOutcome::SignedIn {
                    account,
                    profile,
                    tokens,
                })
            }
            Ok(Resolution::NeedsUsername) => {
                tx.rollback().await?;
                Ok(LinkOutcome::UsernameRequired(identity))
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed after linking error");
                }
                Err(e)
            }
        }
    }

    async fn resolve(
        &self,
        tx: &mut S::Tx,
        identity: &ProviderIdentity,
        username: Option<&str>,
    ) -> Result<Resolution, Error> {
        let existing = tx
            .find_account_by_subject_or_email(&identity.subject, &identity.email)
            .await?;

        let account = match existing {
            Some(account) => {
                if let Some(bound) = account.provider_subject.as_deref() {
                    if bound != identity.subject {
                        return Err(ConflictError::SubjectAlreadyLinked.into());
                    }
                }
                tx.bind_provider(&account.id, &identity.subject, identity.email_verified)
                    .await?;
                account
            }
            None => {
                tx.insert_account(NewAccount::with_provider(
                    identity.email.clone(),
                    identity.subject.clone(),
                ))
                .await?
            }
        };

        if let Some(profile) = tx.find_profile(&account.id).await? {
            return Ok(Resolution::Complete { account, profile });
        }

        // Account exists (or was just created) without a profile: a
        // username is required to finish linking.
        let Some(username) = username else {
            return Ok(Resolution::NeedsUsername);
        };

        // Race-safe re-check inside the transaction.
        if tx.username_exists(username).await? {
            return Err(ConflictError::UsernameTaken.into());
        }

        let profile = tx
            .insert_profile(
                NewProfile::new(account.id.clone(), username)
                    .with_avatar(identity.avatar_url.clone()),
            )
            .await?;

        Ok(Resolution::Complete { account, profile })
    }
}

enum Resolution {
    Complete { account: Account, profile: Profile },
    NeedsUsername,
}
