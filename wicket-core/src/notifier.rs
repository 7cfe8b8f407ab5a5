//! Notifier contract
//!
//! Email delivery is an external collaborator: this core composes
//! messages and reports whether delivery happened, it never implements
//! transport. `send` returns a [`Delivery`] value rather than an error so
//! a failed or slow mail send can never fail the operation that
//! triggered it.

use async_trait::async_trait;

/// Outcome of a delivery attempt. Failure is a value, not an error.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub success: bool,
    pub error: Option<String>,
}

impl Delivery {
    pub fn sent() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Delivery;
}

/// Send with a hard deadline; failure and timeout both degrade to `false`.
///
/// The deadline must stay well under the platform's request budget so a
/// wedged mail relay cannot stall the primary operation.
pub async fn send_with_deadline(
    notifier: &dyn Notifier,
    deadline: std::time::Duration,
    to: &str,
    subject: &str,
    html_body: &str,
) -> bool {
    match tokio::time::timeout(deadline, notifier.send(to, subject, html_body)).await {
        Ok(delivery) if delivery.success => true,
        Ok(delivery) => {
            tracing::warn!(to, error = ?delivery.error, "notification delivery failed");
            false
        }
        Err(_) => {
            tracing::warn!(to, deadline_ms = deadline.as_millis() as u64, "notification timed out");
            false
        }
    }
}

/// Compose the email-verification message.
pub fn verification_email(app_url: &str, token: &str) -> (String, String) {
    let link = format!("{app_url}/verify-email?token={token}");
    (
        "Verify your email address".to_string(),
        format!(
            "<p>Welcome! Confirm your email address to finish setting up your account.</p>\
             <p><a href=\"{link}\">Verify email</a></p>\
             <p>This link expires in 24 hours. If you didn't sign up, ignore this message.</p>"
        ),
    )
}

/// Compose the password-reset message.
pub fn reset_email(app_url: &str, token: &str) -> (String, String) {
    let link = format!("{app_url}/reset-password?token={token}");
    (
        "Reset your password".to_string(),
        format!(
            "<p>We received a request to reset your password.</p>\
             <p><a href=\"{link}\">Choose a new password</a></p>\
             <p>This link expires in 1 hour. If you didn't request a reset, ignore this message.</p>"
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_email_carries_token_link() {
        let (subject, body) = verification_email("https://app.wicket.dev", "tok123");
        assert!(subject.contains("Verify"));
        assert!(body.contains("https://app.wicket.dev/verify-email?token=tok123"));
    }

    #[test]
    fn test_reset_email_carries_token_link() {
        let (_, body) = reset_email("https://app.wicket.dev", "tok456");
        assert!(body.contains("https://app.wicket.dev/reset-password?token=tok456"));
    }
}
