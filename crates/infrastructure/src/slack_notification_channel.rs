use async_trait::async_trait;
use mellon_application::{AccessRequestNotification, CallbackAction, NotificationChannel};
use mellon_core::{AppError, AppResult};
use mellon_domain::RiskLevel;
use serde::Deserialize;
use serde_json::{Value, json};

const DEFAULT_API_BASE_URL: &str = "https://slack.com/api";

/// Slack `chat.postMessage` notification channel.
pub struct SlackNotificationChannel {
    http_client: reqwest::Client,
    bot_token: String,
    channel_id: String,
    api_base_url: String,
}

#[derive(Debug, Deserialize)]
struct SlackApiResponse {
    ok: bool,
    error: Option<String>,
}

impl SlackNotificationChannel {
    /// Creates a Slack channel posting into `channel_id`.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        bot_token: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            bot_token: bot_token.into(),
            channel_id: channel_id.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
        }
    }

    /// Overrides the Slack Web API base url.
    #[must_use]
    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into().trim_end_matches('/').to_owned();
        self
    }
}

/// Builds the interactive Block Kit approval message.
pub(crate) fn approval_message(channel_id: &str, notification: &AccessRequestNotification) -> Value {
    let (status_emoji, color, risk_text) = match notification.risk_level {
        RiskLevel::High => ("⚠️", "#ff0000", "*HIGH RISK DETECTED*"),
        RiskLevel::Low => ("✅", "#36a64f", "*Low Risk (Verified)*"),
    };
    let correlation_token = notification.correlation_token();

    json!({
        "channel": channel_id,
        "text": format!("New Access Request from {}", notification.principal),
        "attachments": [{
            "color": color,
            "blocks": [
                {
                    "type": "header",
                    "text": {
                        "type": "plain_text",
                        "text": format!("{status_emoji} Mellon Access Request"),
                    },
                },
                {
                    "type": "section",
                    "fields": [
                        {"type": "mrkdwn", "text": format!("*User:*\n{}", notification.principal)},
                        {
                            "type": "mrkdwn",
                            "text": format!(
                                "*Ticket Context:*\n{}",
                                notification.ticket_reference.as_deref().unwrap_or("None")
                            ),
                        },
                        {"type": "mrkdwn", "text": format!("*Risk Level:*\n{risk_text}")},
                        {
                            "type": "mrkdwn",
                            "text": format!(
                                "*Recommended Duration:*\n{} Minutes",
                                notification.recommended_duration.as_minutes_ceil()
                            ),
                        },
                    ],
                },
                {
                    "type": "section",
                    "text": {
                        "type": "mrkdwn",
                        "text": format!(
                            "*Request:*\n> {}\n*AI Rationale:*\n> {}",
                            notification.intent, notification.rationale
                        ),
                    },
                },
                {
                    "type": "actions",
                    "elements": [
                        {
                            "type": "button",
                            "text": {"type": "plain_text", "text": "Approve Access"},
                            "style": "primary",
                            "value": correlation_token,
                            "action_id": CallbackAction::Approve.action_id(),
                        },
                        {
                            "type": "button",
                            "text": {"type": "plain_text", "text": "Deny"},
                            "style": "danger",
                            "value": correlation_token,
                            "action_id": CallbackAction::Deny.action_id(),
                        },
                    ],
                },
            ],
        }],
    })
}

#[async_trait]
impl NotificationChannel for SlackNotificationChannel {
    async fn send_access_request(
        &self,
        notification: &AccessRequestNotification,
    ) -> AppResult<()> {
        let response = self
            .http_client
            .post(format!("{}/chat.postMessage", self.api_base_url))
            .bearer_auth(&self.bot_token)
            .json(&approval_message(&self.channel_id, notification))
            .send()
            .await
            .map_err(|error| {
                AppError::NotificationSend(format!("Slack transport error: {error}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::NotificationSend(format!(
                "Slack chat.postMessage returned status {status}"
            )));
        }

        let body = response.json::<SlackApiResponse>().await.map_err(|error| {
            AppError::NotificationSend(format!("Slack returned an unreadable response: {error}"))
        })?;
        if !body.ok {
            return Err(AppError::NotificationSend(
                body.error.unwrap_or_else(|| "unknown Slack error".to_owned()),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mellon_application::AccessRequestNotification;
    use mellon_core::PrincipalIdentity;
    use mellon_domain::{GrantDuration, RequestId, RiskLevel};

    use super::approval_message;

    fn notification(risk_level: RiskLevel) -> AccessRequestNotification {
        AccessRequestNotification {
            request_id: RequestId::new(),
            principal: PrincipalIdentity::new("alice@example.com")
                .unwrap_or_else(|_| unreachable!()),
            intent: "fixing TICKET-101".to_owned(),
            ticket_reference: Some("TICKET-101".to_owned()),
            risk_level,
            rationale: "Ticket is open and assigned to the requester.".to_owned(),
            recommended_duration: GrantDuration::from_whole_minutes(30),
        }
    }

    #[test]
    fn both_buttons_carry_the_correlation_token() {
        let notification = notification(RiskLevel::Low);
        let message = approval_message("C123", &notification);

        let elements = &message["attachments"][0]["blocks"][3]["elements"];
        let token = notification.request_id.to_string();
        assert_eq!(elements[0]["action_id"], "approve_request");
        assert_eq!(elements[0]["value"], token.as_str());
        assert_eq!(elements[1]["action_id"], "deny_request");
        assert_eq!(elements[1]["value"], token.as_str());
        assert_eq!(message["channel"], "C123");
    }

    #[test]
    fn risk_level_drives_colour_and_fields() {
        let high = approval_message("C123", &notification(RiskLevel::High));
        let low = approval_message("C123", &notification(RiskLevel::Low));

        assert_eq!(high["attachments"][0]["color"], "#ff0000");
        assert_eq!(low["attachments"][0]["color"], "#36a64f");

        let fields = &high["attachments"][0]["blocks"][1]["fields"];
        assert_eq!(fields[1]["text"], "*Ticket Context:*\nTICKET-101");
        assert_eq!(fields[3]["text"], "*Recommended Duration:*\n30 Minutes");
    }
}
