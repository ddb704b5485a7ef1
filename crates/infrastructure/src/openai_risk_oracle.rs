use async_trait::async_trait;
use mellon_application::{RiskAssessment, RiskAssessmentRequest, RiskOracle, TicketContext};
use mellon_core::{AppError, AppResult};
use mellon_domain::RiskLevel;
use serde::Deserialize;
use serde_json::{Map, Value, json};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Risk oracle backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiRiskOracle {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OracleVerdict {
    ticket_id: Option<String>,
    risk_level: String,
    rationale: String,
    #[serde(default)]
    duration: Option<Value>,
}

impl OpenAiRiskOracle {
    /// Creates an oracle using the default model and endpoint.
    #[must_use]
    pub fn new(http_client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_owned(),
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }

    /// Overrides the chat model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Overrides the API base url.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }
}

fn ticket_context_json(tickets: &[TicketContext]) -> Value {
    let mut context = Map::new();
    for ticket in tickets {
        context.insert(
            ticket.ticket_id.clone(),
            json!({
                "status": ticket.status,
                "assignee": ticket.assignee,
                "summary": ticket.summary,
                "type": ticket.ticket_type,
                "severity": ticket.severity,
            }),
        );
    }

    Value::Object(context)
}

pub(crate) fn system_prompt(tickets: &[TicketContext]) -> String {
    format!(
        "You are a Senior Security Engineer.\n\
         Review the access request below against the provided JIRA CONTEXT.\n\n\
         JIRA CONTEXT:\n{}\n\n\
         RULES:\n\
         1. Extract the Ticket ID (e.g., TICKET-101) from the user's request.\n\
         2. Look up the ticket in the JIRA CONTEXT.\n\
         3. If the ticket exists, is not closed AND matches the user's request, Risk = LOW.\n\
         4. If the ticket is missing, closed, or a high-severity mismatch, Risk = HIGH.\n\
         5. Duration: recommend 30 mins for simple bugs, 60 mins for incidents.\n\n\
         Return ONLY valid JSON in this format:\n\
         {{\"ticket_id\": \"TICKET-XXX\" or null, \"risk_level\": \"LOW\" or \"HIGH\", \
         \"rationale\": \"One short sentence explaining why.\", \"duration\": 30}}",
        ticket_context_json(tickets)
    )
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn duration_minutes(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|minutes| minutes.round() as i64)),
        Value::String(text) => text
            .trim()
            .trim_end_matches(|character: char| character.is_alphabetic() || character == ' ')
            .parse::<i64>()
            .ok(),
        _ => None,
    }
}

/// Parses the model's reply into an assessment.
pub(crate) fn parse_assessment(content: &str) -> AppResult<RiskAssessment> {
    let verdict: OracleVerdict = serde_json::from_str(strip_code_fence(content)).map_err(
        |error| AppError::ClassifierUnavailable(format!("oracle reply is not valid JSON: {error}")),
    )?;

    let risk_level = verdict
        .risk_level
        .parse::<RiskLevel>()
        .map_err(|error| AppError::ClassifierUnavailable(error.to_string()))?;
    let ticket_reference = verdict
        .ticket_id
        .map(|ticket_id| ticket_id.trim().to_owned())
        .filter(|ticket_id| !ticket_id.is_empty() && !ticket_id.eq_ignore_ascii_case("null"));

    Ok(RiskAssessment {
        ticket_reference,
        risk_level,
        rationale: verdict.rationale.trim().to_owned(),
        recommended_duration_minutes: duration_minutes(verdict.duration.as_ref()),
    })
}

#[async_trait]
impl RiskOracle for OpenAiRiskOracle {
    async fn assess(&self, request: &RiskAssessmentRequest) -> AppResult<RiskAssessment> {
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                {"role": "system", "content": system_prompt(&request.known_tickets)},
                {
                    "role": "user",
                    "content": format!("User: {}\nRequest: {}", request.principal, request.intent),
                },
            ],
        });

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|error| {
                AppError::ClassifierUnavailable(format!("oracle transport error: {error}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::ClassifierUnavailable(format!(
                "oracle returned status {status}"
            )));
        }

        let completion = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|error| {
                AppError::ClassifierUnavailable(format!("oracle response unreadable: {error}"))
            })?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                AppError::ClassifierUnavailable("oracle returned no completion".to_owned())
            })?;

        parse_assessment(&content)
    }
}

#[cfg(test)]
mod tests {
    use mellon_application::TicketContext;
    use mellon_core::AppError;
    use mellon_domain::RiskLevel;

    use super::{parse_assessment, system_prompt};

    #[test]
    fn parses_plain_json_reply() {
        let assessment = parse_assessment(
            r#"{"ticket_id": "TICKET-101", "risk_level": "LOW", "rationale": "Open bug.", "duration": 30}"#,
        )
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(assessment.ticket_reference.as_deref(), Some("TICKET-101"));
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert_eq!(assessment.rationale, "Open bug.");
        assert_eq!(assessment.recommended_duration_minutes, Some(30));
    }

    #[test]
    fn accepts_fenced_reply_with_string_duration() {
        let assessment = parse_assessment(
            "```json\n{\"ticket_id\": null, \"risk_level\": \"high\", \"rationale\": \"No ticket.\", \"duration\": \"60 minutes\"}\n```",
        )
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(assessment.ticket_reference, None);
        assert_eq!(assessment.risk_level, RiskLevel::High);
        assert_eq!(assessment.recommended_duration_minutes, Some(60));
    }

    #[test]
    fn missing_duration_is_left_for_policy() {
        let assessment =
            parse_assessment(r#"{"ticket_id": "", "risk_level": "HIGH", "rationale": "Closed."}"#)
                .unwrap_or_else(|_| unreachable!());

        assert_eq!(assessment.ticket_reference, None);
        assert_eq!(assessment.recommended_duration_minutes, None);
    }

    #[test]
    fn malformed_reply_is_classifier_unavailable() {
        assert!(matches!(
            parse_assessment("I think this is fine"),
            Err(AppError::ClassifierUnavailable(_))
        ));
        assert!(matches!(
            parse_assessment(r#"{"ticket_id": null, "risk_level": "MEDIUM", "rationale": "?"}"#),
            Err(AppError::ClassifierUnavailable(_))
        ));
    }

    #[test]
    fn prompt_embeds_ticket_context_by_id() {
        let prompt = system_prompt(&[TicketContext {
            ticket_id: "TICKET-404".to_owned(),
            status: "Active".to_owned(),
            assignee: "jake@example.com".to_owned(),
            summary: "Payment gateway failure".to_owned(),
            ticket_type: "Incident".to_owned(),
            severity: "High".to_owned(),
        }]);

        assert!(prompt.contains("\"TICKET-404\":{"));
        assert!(prompt.contains("\"type\":\"Incident\""));
    }
}
