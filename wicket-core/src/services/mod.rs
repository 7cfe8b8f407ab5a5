//! Service layer for the identity core
//!
//! Concrete service implementations encapsulating provisioning, signin,
//! token lifecycle, and federated linking logic. Services are generic
//! over the [`CredentialStore`](crate::store::CredentialStore) so they
//! can be exercised against in-memory doubles in tests.

pub mod linker;
pub mod password_reset;
pub mod signin;
pub mod signup;
pub mod verification;

pub use linker::{IdentityLinker, LinkOutcome, ProviderIdentity};
pub use password_reset::{ForgotOutcome, PasswordResetService, ResetConfig};
pub use signin::SigninService;
pub use signup::{SignupConfig, SignupOutcome, SignupService};
pub use verification::{EmailVerificationService, ResendOutcome, VerificationConfig};
