use std::str::FromStr;

use async_trait::async_trait;
use mellon_core::{AppError, AppResult, PrincipalIdentity};
use mellon_domain::{AccessRequest, GrantDuration, RequestId, RiskDecision, RiskLevel};

/// Interactive action carried by a notification affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackAction {
    /// Approve the request.
    Approve,
    /// Deny the request.
    Deny,
}

impl CallbackAction {
    /// Returns the stable action id used on the wire.
    #[must_use]
    pub fn action_id(&self) -> &'static str {
        match self {
            Self::Approve => "approve_request",
            Self::Deny => "deny_request",
        }
    }
}

impl FromStr for CallbackAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "approve_request" => Ok(Self::Approve),
            "deny_request" => Ok(Self::Deny),
            _ => Err(AppError::MalformedCallback(format!(
                "unknown action id '{value}'"
            ))),
        }
    }
}

/// Interactive approval message sent to approvers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequestNotification {
    /// Request being decided.
    pub request_id: RequestId,
    /// Principal that would receive the grant.
    pub principal: PrincipalIdentity,
    /// Original free-text intent.
    pub intent: String,
    /// Ticket identified by the classifier.
    pub ticket_reference: Option<String>,
    /// Classified risk.
    pub risk_level: RiskLevel,
    /// Classifier rationale.
    pub rationale: String,
    /// Duration the grant would last.
    pub recommended_duration: GrantDuration,
}

impl AccessRequestNotification {
    /// Builds the notification for a classified request.
    #[must_use]
    pub fn for_decision(request: &AccessRequest, decision: &RiskDecision) -> Self {
        Self {
            request_id: request.request_id(),
            principal: request.requester().clone(),
            intent: request.intent().as_str().to_owned(),
            ticket_reference: decision.ticket_reference().map(ToOwned::to_owned),
            risk_level: decision.risk_level(),
            rationale: decision.rationale().to_owned(),
            recommended_duration: decision.recommended_duration(),
        }
    }

    /// Returns the opaque correlation token carried by both affordances.
    #[must_use]
    pub fn correlation_token(&self) -> String {
        self.request_id.to_string()
    }
}

/// Outbound chat channel for approval requests. Best-effort.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Sends one interactive approval request.
    async fn send_access_request(&self, notification: &AccessRequestNotification)
    -> AppResult<()>;
}
