//! # Wicket
//!
//! Wicket is an identity core for Rust applications: password signup
//! with email verification, signin, password reset, stateless JWT
//! access/refresh tokens, and federated identity linking, all over a
//! pluggable credential store.
//!
//! The [`Wicket`] facade wires the individual services together behind
//! one handle. Applications that need finer control can use the
//! services from `wicket_core` directly.
//!
//! ## Example
//!
//! ```rust,no_run
//! use wicket::{Config, WicketBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::for_development("access-secret", "refresh-secret");
//!     let wicket = WicketBuilder::new(config)
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .build();
//!     wicket.migrate().await?;
//!
//!     let outcome = wicket.signup("alice", "alice@example.com", "hunter2hunter2").await?;
//!     println!("created {}", outcome.account_id);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use wicket_core::{
    CredentialStore, Notifier, TokenCodec,
    services::{
        EmailVerificationService, IdentityLinker, PasswordResetService, ResetConfig,
        SigninService, SignupConfig, SignupService, VerificationConfig,
    },
};

mod builder;
mod config;
mod notifier;

pub use builder::WicketBuilder;
pub use config::{Config, Environment};
pub use notifier::TracingNotifier;

/// Re-export the error taxonomy for variant matching.
pub use wicket_core::error;

/// Re-export core types commonly used with the facade.
pub use wicket_core::{
    Account, AccountId, Delivery, Error, KeyClass, Profile, TokenClaims, TokenPair,
    services::{
        ForgotOutcome, LinkOutcome, ProviderIdentity, ResendOutcome, SignupOutcome,
    },
};

#[cfg(feature = "sqlite")]
pub use wicket_storage_sqlite::SqliteStore;

/// The identity coordinator: one handle over signup, signin, email
/// verification, password reset, token lifecycle, and federated
/// linking, all sharing a credential store and a token codec.
pub struct Wicket<S: CredentialStore> {
    store: Arc<S>,
    codec: Arc<TokenCodec>,
    signup: SignupService<S>,
    signin: SigninService<S>,
    verification: EmailVerificationService<S>,
    reset: PasswordResetService<S>,
    linker: IdentityLinker<S>,
}

impl<S: CredentialStore> Wicket<S> {
    /// Wire the services over a store, a notifier, and configuration.
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>, config: &Config) -> Self {
        let codec = Arc::new(TokenCodec::new(
            config.access_secret.as_bytes(),
            config.refresh_secret.as_bytes(),
        ));

        let signup = SignupService::new(
            store.clone(),
            notifier.clone(),
            SignupConfig {
                app_url: config.app_url.clone(),
                ..SignupConfig::default()
            },
        );
        let signin = SigninService::new(store.clone(), codec.clone());
        let verification = EmailVerificationService::new(
            store.clone(),
            notifier.clone(),
            VerificationConfig {
                app_url: config.app_url.clone(),
                ..VerificationConfig::default()
            },
        );
        let reset = PasswordResetService::new(
            store.clone(),
            notifier,
            ResetConfig {
                app_url: config.app_url.clone(),
                mask_unknown_email: config.environment.is_production(),
                ..ResetConfig::default()
            },
        );
        let linker = IdentityLinker::new(store.clone(), codec.clone());

        Self {
            store,
            codec,
            signup,
            signin,
            verification,
            reset,
            linker,
        }
    }

    /// The underlying credential store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Register a new account; sends the verification email best-effort.
    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<SignupOutcome, Error> {
        self.signup.signup(username, email, password).await
    }

    /// Authenticate with email and password, issuing a token pair.
    pub async fn signin(&self, email: &str, password: &str) -> Result<TokenPair, Error> {
        self.signin.signin(email, password).await
    }

    /// Resolve a federated login. Returns
    /// [`LinkOutcome::UsernameRequired`] when a brand-new account needs
    /// a human-chosen username; re-submit with `username` set.
    pub async fn federated_signin(
        &self,
        identity: ProviderIdentity,
        username: Option<&str>,
    ) -> Result<LinkOutcome, Error> {
        self.linker.link(identity, username).await
    }

    /// Redeem an email-verification token. Idempotent for already
    /// verified accounts.
    pub async fn verify_email(&self, token: &str) -> Result<Account, Error> {
        self.verification.redeem(token).await
    }

    /// Rotate and re-send the verification email.
    pub async fn resend_verification(&self, email: &str) -> Result<ResendOutcome, Error> {
        self.verification.resend(email).await
    }

    /// Issue a password-reset token and send the reset link.
    pub async fn forgot_password(&self, email: &str) -> Result<ForgotOutcome, Error> {
        self.reset.forgot_password(email).await
    }

    /// Redeem a reset token and set the new password.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), Error> {
        self.reset.reset_password(token, new_password).await
    }

    /// Exchange a valid refresh token for a fresh access token.
    pub fn refresh_token(&self, refresh_token: &str) -> Result<String, Error> {
        self.codec.refresh(refresh_token)
    }

    /// Verify an access token and return its claims.
    pub fn verify_access_token(&self, token: &str) -> Result<TokenClaims, Error> {
        self.codec.verify(token, KeyClass::Access)
    }
}

#[cfg(feature = "sqlite")]
impl Wicket<SqliteStore> {
    /// Create the schema if it does not exist yet.
    pub async fn migrate(&self) -> Result<(), Error> {
        self.store.migrate().await
    }
}
