//! Development notifier

use async_trait::async_trait;
use wicket_core::{Delivery, Notifier};

/// Logs outbound mail instead of delivering it. The default notifier
/// for development and tests; production deployments plug in a real
/// transport behind the [`Notifier`] trait.
pub struct TracingNotifier {
    from: String,
}

impl TracingNotifier {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Delivery {
        tracing::info!(
            from = %self.from,
            to,
            subject,
            body_len = html_body.len(),
            "outbound email"
        );
        Delivery::sent()
    }
}
