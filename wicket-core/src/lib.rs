//! Core functionality for the wicket identity platform
//!
//! This crate owns identity provisioning and the token lifecycle:
//! password signup with email verification, signin, password reset,
//! stateless access/refresh token issuance, and federated (OAuth)
//! identity linking against the platform's dual uniqueness domain
//! (email + username).
//!
//! Storage is abstracted behind [`store::CredentialStore`]; see the
//! `wicket-storage-sqlite` crate for the SQLite implementation and the
//! `wicket` crate for the assembled high-level API.

pub mod account;
pub mod error;
pub mod id;
pub mod notifier;
pub mod profile;
pub mod services;
pub mod store;
pub mod token;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use account::{Account, AccountId, NewAccount};
pub use error::Error;
pub use notifier::{Delivery, Notifier};
pub use profile::{DEFAULT_AVATAR_URL, NewProfile, Profile};
pub use store::{CollisionField, CredentialStore, CredentialTx};
pub use token::{KeyClass, TokenClaims, TokenCodec, TokenIdentity, TokenPair};
