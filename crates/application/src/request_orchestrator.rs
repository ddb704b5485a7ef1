use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use mellon_core::{AppError, AppResult, NonEmptyString, PrincipalIdentity};
use mellon_domain::{AccessRequest, RequestId};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::grant_registry::GrantRegistry;
use crate::notification_ports::{AccessRequestNotification, NotificationChannel};
use crate::risk_classifier::RiskClassifierAdapter;

/// How classification and notification run relative to intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeMode {
    /// Submit returns at once; classification runs on a spawned task.
    Background,
    /// Submit returns after classification and notification finish.
    Inline,
}

impl IntakeMode {
    /// Returns the stable config value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Inline => "inline",
        }
    }
}

impl FromStr for IntakeMode {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "background" => Ok(Self::Background),
            "inline" => Ok(Self::Inline),
            _ => Err(AppError::Validation(format!(
                "unknown intake mode '{value}', expected 'background' or 'inline'"
            ))),
        }
    }
}

/// Turns requester intents into registered, classified and announced requests.
#[derive(Clone)]
pub struct RequestOrchestrator {
    registry: GrantRegistry,
    classifier: RiskClassifierAdapter,
    notification_channel: Arc<dyn NotificationChannel>,
    clock: Arc<dyn Clock>,
    intake_mode: IntakeMode,
    notification_timeout: Duration,
}

impl RequestOrchestrator {
    /// Creates a request orchestrator.
    #[must_use]
    pub fn new(
        registry: GrantRegistry,
        classifier: RiskClassifierAdapter,
        notification_channel: Arc<dyn NotificationChannel>,
        clock: Arc<dyn Clock>,
        intake_mode: IntakeMode,
    ) -> Self {
        Self {
            registry,
            classifier,
            notification_channel,
            clock,
            intake_mode,
            notification_timeout: Duration::from_secs(10),
        }
    }

    /// Bounds the notification send.
    #[must_use]
    pub fn with_notification_timeout(mut self, notification_timeout: Duration) -> Self {
        self.notification_timeout = notification_timeout;
        self
    }

    /// Registers a request and starts classification.
    ///
    /// Rejects blank intents before anything is stored. Classification and
    /// notification failures never surface here.
    pub async fn submit(
        &self,
        requester: PrincipalIdentity,
        free_text_intent: &str,
    ) -> AppResult<RequestId> {
        let intent = NonEmptyString::new(free_text_intent).map_err(|_| {
            AppError::Validation("please provide a reason or ticket id".to_owned())
        })?;

        let request = AccessRequest::new(requester, intent, self.clock.now());
        let request_id = request.request_id();
        self.registry.register_request(request.clone()).await?;
        info!(
            request_id = %request_id,
            requester = %request.requester(),
            mode = self.intake_mode.as_str(),
            "access request received"
        );

        match self.intake_mode {
            IntakeMode::Inline => self.classify_and_notify(request).await,
            IntakeMode::Background => {
                let orchestrator = self.clone();
                tokio::spawn(async move { orchestrator.classify_and_notify(request).await });
            }
        }

        Ok(request_id)
    }

    async fn classify_and_notify(&self, request: AccessRequest) {
        let request_id = request.request_id();
        let decision = self
            .classifier
            .classify(request_id, request.requester(), request.intent().as_str())
            .await;

        if let Err(error) = self.registry.attach_decision(decision.clone()).await {
            warn!(request_id = %request_id, error = %error, "failed to attach risk decision");
            return;
        }

        let notification = AccessRequestNotification::for_decision(&request, &decision);
        let sent = tokio::time::timeout(
            self.notification_timeout,
            self.notification_channel.send_access_request(&notification),
        )
        .await
        .unwrap_or_else(|_| {
            Err(AppError::NotificationSend(format!(
                "send timed out after {} ms",
                self.notification_timeout.as_millis()
            )))
        });

        match sent {
            Ok(()) => info!(
                request_id = %request_id,
                risk_level = %decision.risk_level(),
                "approval request sent"
            ),
            Err(error) => warn!(
                request_id = %request_id,
                error = %error,
                "approval request notification failed, request stays pending"
            ),
        }
    }
}

#[cfg(test)]
mod tests;
