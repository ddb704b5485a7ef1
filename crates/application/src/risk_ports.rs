use async_trait::async_trait;
use mellon_core::{AppResult, PrincipalIdentity};
use mellon_domain::RiskLevel;
use serde::{Deserialize, Serialize};

/// Ticket known to the classifier as context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketContext {
    /// Ticket key, for example `TICKET-101`.
    pub ticket_id: String,
    /// Workflow status.
    pub status: String,
    /// Assignee login.
    pub assignee: String,
    /// Short summary.
    pub summary: String,
    /// Ticket type (bug, incident, task).
    #[serde(rename = "type")]
    pub ticket_type: String,
    /// Severity label.
    pub severity: String,
}

/// Source of ticket context for classification.
#[async_trait]
pub trait TicketCatalog: Send + Sync {
    /// Lists tickets the classifier may reference.
    async fn list_tickets(&self) -> AppResult<Vec<TicketContext>>;
}

/// Request sent to the risk oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskAssessmentRequest {
    /// Principal asking for access.
    pub principal: PrincipalIdentity,
    /// Free-text intent.
    pub intent: String,
    /// Known ticket context.
    pub known_tickets: Vec<TicketContext>,
}

/// Raw oracle answer before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskAssessment {
    /// Ticket the oracle matched.
    pub ticket_reference: Option<String>,
    /// Oracle risk level.
    pub risk_level: RiskLevel,
    /// Oracle rationale.
    pub rationale: String,
    /// Recommended duration in minutes, when the oracle gave one.
    pub recommended_duration_minutes: Option<i64>,
}

/// External risk-scoring oracle. May fail; callers must not trust partial output.
#[async_trait]
pub trait RiskOracle: Send + Sync {
    /// Scores one access request.
    async fn assess(&self, request: &RiskAssessmentRequest) -> AppResult<RiskAssessment>;
}
