use std::str::FromStr;
use std::time::Duration;

use mellon_core::{AppError, AppResult};
use mellon_domain::{Grant, GrantState, RequestId};
use tracing::{info, warn};

use crate::grant_registry::{ApprovalOutcome, DenialOutcome, GrantRegistry};
use crate::notification_ports::CallbackAction;

/// Parsed interactive callback from the chat platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionCallback {
    /// Action id of the pressed affordance.
    pub action_id: Option<String>,
    /// Correlation token carried by the affordance.
    pub correlation_token: Option<String>,
    /// Identity of the approver who pressed it.
    pub actor_identity: Option<String>,
}

/// Reply rendered back to the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackReply {
    /// Whether the original interactive message should be replaced.
    pub replace_original: bool,
    /// Message text.
    pub text: String,
}

impl CallbackReply {
    fn replacing(text: String) -> Self {
        Self {
            replace_original: true,
            text,
        }
    }

    fn ephemeral(text: String) -> Self {
        Self {
            replace_original: false,
            text,
        }
    }
}

#[derive(Debug)]
struct ApprovalCommand {
    action: CallbackAction,
    request_id: RequestId,
    approver: String,
}

impl TryFrom<InteractionCallback> for ApprovalCommand {
    type Error = AppError;

    fn try_from(callback: InteractionCallback) -> Result<Self, Self::Error> {
        let action = callback
            .action_id
            .as_deref()
            .ok_or_else(|| AppError::MalformedCallback("missing action id".to_owned()))
            .and_then(CallbackAction::from_str)?;

        let token = callback
            .correlation_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::MalformedCallback("missing correlation token".to_owned()))?;
        let request_id = RequestId::from_str(token).map_err(|_| {
            AppError::MalformedCallback(format!("correlation token '{token}' is not valid"))
        })?;

        let approver = callback
            .actor_identity
            .map(|actor| actor.trim().to_owned())
            .filter(|actor| !actor.is_empty())
            .ok_or_else(|| AppError::MalformedCallback("missing approver identity".to_owned()))?;

        Ok(Self {
            action,
            request_id,
            approver,
        })
    }
}

/// Inbound approver callbacks: validates, dispatches to the registry and
/// renders the reply within the platform's response deadline.
#[derive(Clone)]
pub struct ApprovalGateway {
    registry: GrantRegistry,
    response_deadline: Duration,
}

impl ApprovalGateway {
    /// Creates an approval gateway.
    #[must_use]
    pub fn new(registry: GrantRegistry, response_deadline: Duration) -> Self {
        Self {
            registry,
            response_deadline,
        }
    }

    /// Handles one callback and always produces a reply.
    ///
    /// The registry transition runs on its own task. If it outlives the
    /// response deadline the reply says so and the transition still completes.
    pub async fn handle_callback(&self, callback: InteractionCallback) -> CallbackReply {
        let command = match ApprovalCommand::try_from(callback) {
            Ok(command) => command,
            Err(error) => {
                warn!(error = %error, "rejected malformed approval callback");
                return error_reply(&error);
            }
        };

        let request_id = command.request_id;
        let registry = self.registry.clone();
        let task = tokio::spawn(async move { dispatch(&registry, command).await });

        match tokio::time::timeout(self.response_deadline, task).await {
            Ok(Ok(Ok(reply))) => reply,
            Ok(Ok(Err(error))) => {
                warn!(request_id = %request_id, error = %error, "approval callback failed");
                error_reply(&error)
            }
            Ok(Err(error)) => {
                warn!(request_id = %request_id, error = %error, "approval task aborted");
                error_reply(&AppError::Internal(error.to_string()))
            }
            Err(_) => {
                info!(request_id = %request_id, "approval still running past response deadline");
                CallbackReply::ephemeral(
                    "⏳ Still working on this request. The message will not update; check the audit log for the outcome."
                        .to_owned(),
                )
            }
        }
    }
}

async fn dispatch(registry: &GrantRegistry, command: ApprovalCommand) -> AppResult<CallbackReply> {
    match command.action {
        CallbackAction::Approve => {
            let outcome = registry.approve(command.request_id, &command.approver).await?;
            Ok(match outcome {
                ApprovalOutcome::Granted(grant) | ApprovalOutcome::AlreadyResolved(grant) => {
                    CallbackReply::replacing(resolution_text(&grant))
                }
                ApprovalOutcome::AlreadyActive(grant) => {
                    CallbackReply::replacing(already_active_text(&grant))
                }
            })
        }
        CallbackAction::Deny => {
            let outcome = registry.deny(command.request_id, &command.approver).await?;
            let (DenialOutcome::Denied(grant) | DenialOutcome::AlreadyResolved(grant)) = outcome;
            Ok(CallbackReply::replacing(resolution_text(&grant)))
        }
    }
}

/// Confirmation text for a resolved request, identical for every repeat click.
fn resolution_text(grant: &Grant) -> String {
    let approver = grant.resolved_by().unwrap_or("unknown");
    match grant.state() {
        GrantState::Active => format!(
            "✅ *ACCESS GRANTED.*\nUser {} added by {approver}.\n_⏳ Access expires at {}._",
            grant.principal(),
            format_expiry(grant)
        ),
        GrantState::Revoked => format!(
            "✅ *ACCESS GRANTED.*\nUser {} was added by {approver}.\n_Access expired at {}._",
            grant.principal(),
            format_expiry(grant)
        ),
        GrantState::Denied => format!("🚫 *ACCESS DENIED BY {}.*", approver.to_uppercase()),
        GrantState::Pending => format!("Request for {} is still pending.", grant.principal()),
    }
}

fn already_active_text(grant: &Grant) -> String {
    format!(
        "ℹ️ User {} already holds active access until {}. No new grant was created.",
        grant.principal(),
        format_expiry(grant)
    )
}

fn format_expiry(grant: &Grant) -> String {
    grant
        .expires_at()
        .map(|expires_at| expires_at.format("%H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "an unknown time".to_owned())
}

fn error_reply(error: &AppError) -> CallbackReply {
    let text = match error {
        AppError::UnknownRequest(_) => {
            "⚠️ This access request is unknown or has expired.".to_owned()
        }
        AppError::MalformedCallback(detail) => format!("⚠️ Could not read this action: {detail}"),
        AppError::RemoteMutation(detail) => {
            format!("❌ Error: {detail}. The request is still pending; try again.")
        }
        other => format!("❌ Error: {other}"),
    };
    CallbackReply::ephemeral(text)
}
