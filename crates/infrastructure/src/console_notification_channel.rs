//! Console notification channel for development. Logs approval requests to tracing output.

use async_trait::async_trait;
use mellon_application::{AccessRequestNotification, NotificationChannel};
use mellon_core::AppResult;
use tracing::info;

/// Development notification channel that logs approval requests.
#[derive(Clone, Default)]
pub struct ConsoleNotificationChannel;

impl ConsoleNotificationChannel {
    /// Creates a new console notification channel.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationChannel for ConsoleNotificationChannel {
    async fn send_access_request(
        &self,
        notification: &AccessRequestNotification,
    ) -> AppResult<()> {
        info!(
            request_id = %notification.request_id,
            principal = %notification.principal,
            risk_level = %notification.risk_level,
            ticket = notification.ticket_reference.as_deref().unwrap_or("none"),
            duration = %notification.recommended_duration,
            "--- ACCESS REQUEST (console) ---\n{}\nRationale: {}\nApprove/deny token: {}\n--- END ---",
            notification.intent,
            notification.rationale,
            notification.correlation_token()
        );

        Ok(())
    }
}
