use chrono::{DateTime, SecondsFormat, Utc};
use mellon_application::{CallbackReply, InteractionCallback};
use mellon_domain::{AuditEntry, Grant};
use serde::{Deserialize, Serialize};

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Slash command form posted by Slack.
#[derive(Debug, Default, Deserialize)]
pub struct SlashCommandForm {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Slash command acknowledgement.
#[derive(Debug, Serialize)]
pub struct SlashCommandResponse {
    pub response_type: &'static str,
    pub text: String,
}

impl SlashCommandResponse {
    pub fn ephemeral(text: impl Into<String>) -> Self {
        Self {
            response_type: "ephemeral",
            text: text.into(),
        }
    }
}

/// Interactive callback form posted by Slack. `payload` holds JSON.
#[derive(Debug, Default, Deserialize)]
pub struct InteractionForm {
    #[serde(default)]
    pub payload: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SlackInteractionPayload {
    #[serde(default)]
    pub actions: Vec<SlackAction>,
    #[serde(default)]
    pub user: Option<SlackUser>,
}

#[derive(Debug, Deserialize)]
pub struct SlackAction {
    pub action_id: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SlackUser {
    pub id: Option<String>,
    pub name: Option<String>,
    pub username: Option<String>,
}

impl From<SlackInteractionPayload> for InteractionCallback {
    fn from(payload: SlackInteractionPayload) -> Self {
        let action = payload.actions.into_iter().next();
        let actor_identity = payload
            .user
            .and_then(|user| user.name.or(user.username).or(user.id));

        Self {
            action_id: action.as_ref().and_then(|action| action.action_id.clone()),
            correlation_token: action.and_then(|action| action.value),
            actor_identity,
        }
    }
}

/// Reply to an interactive callback.
#[derive(Debug, Serialize)]
pub struct InteractionResponse {
    pub replace_original: bool,
    pub text: String,
}

impl From<CallbackReply> for InteractionResponse {
    fn from(reply: CallbackReply) -> Self {
        Self {
            replace_original: reply.replace_original,
            text: reply.text,
        }
    }
}

/// API representation of a grant.
#[derive(Debug, Serialize)]
pub struct GrantResponse {
    pub grant_id: String,
    pub request_id: String,
    pub principal: String,
    pub state: &'static str,
    pub resolved_by: Option<String>,
    pub decided_at: Option<String>,
    pub granted_at: Option<String>,
    pub expires_at: Option<String>,
    pub revoked_at: Option<String>,
}

impl From<Grant> for GrantResponse {
    fn from(grant: Grant) -> Self {
        Self {
            grant_id: grant.grant_id().to_string(),
            request_id: grant.request_id().to_string(),
            principal: grant.principal().to_string(),
            state: grant.state().as_str(),
            resolved_by: grant.resolved_by().map(str::to_owned),
            decided_at: grant.decided_at().map(timestamp),
            granted_at: grant.granted_at().map(timestamp),
            expires_at: grant.expires_at().map(timestamp),
            revoked_at: grant.revoked_at().map(timestamp),
        }
    }
}

/// API representation of an audit ledger entry.
#[derive(Debug, Serialize)]
pub struct AuditEntryResponse {
    pub sequence: u64,
    pub timestamp: String,
    pub principal: String,
    pub action: &'static str,
    pub actor: String,
    pub detail: String,
}

impl From<AuditEntry> for AuditEntryResponse {
    fn from(entry: AuditEntry) -> Self {
        Self {
            sequence: entry.sequence,
            timestamp: timestamp(entry.timestamp),
            principal: entry.principal.to_string(),
            action: entry.action.as_str(),
            actor: entry.actor,
            detail: entry.detail,
        }
    }
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}
