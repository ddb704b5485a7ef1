use std::sync::Arc;
use std::time::Duration;

use mellon_core::{AppError, AppResult, NonEmptyString, PrincipalIdentity};
use mellon_domain::{RequestId, RiskDecision};
use tracing::{info, warn};

use crate::grant_policy::GrantPolicy;
use crate::risk_ports::{RiskAssessmentRequest, RiskOracle, TicketCatalog};

/// Turns an oracle assessment into a normalized risk decision.
///
/// Never fails: oracle errors, timeouts and unusable answers all yield the
/// fail-safe HIGH decision with the minimum duration.
#[derive(Clone)]
pub struct RiskClassifierAdapter {
    oracle: Arc<dyn RiskOracle>,
    ticket_catalog: Arc<dyn TicketCatalog>,
    policy: GrantPolicy,
    timeout: Duration,
}

impl RiskClassifierAdapter {
    /// Creates a classifier adapter.
    #[must_use]
    pub fn new(
        oracle: Arc<dyn RiskOracle>,
        ticket_catalog: Arc<dyn TicketCatalog>,
        policy: GrantPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            oracle,
            ticket_catalog,
            policy,
            timeout,
        }
    }

    /// Classifies one request.
    pub async fn classify(
        &self,
        request_id: RequestId,
        principal: &PrincipalIdentity,
        intent: &str,
    ) -> RiskDecision {
        match self.try_classify(request_id, principal, intent).await {
            Ok(decision) => {
                info!(
                    request_id = %request_id,
                    risk_level = %decision.risk_level(),
                    duration = %decision.recommended_duration(),
                    "request classified"
                );
                decision
            }
            Err(error) => {
                warn!(
                    request_id = %request_id,
                    error = %error,
                    "risk classification failed, using fail-safe decision"
                );
                RiskDecision::fail_safe(request_id, self.policy.failsafe_duration())
            }
        }
    }

    async fn try_classify(
        &self,
        request_id: RequestId,
        principal: &PrincipalIdentity,
        intent: &str,
    ) -> AppResult<RiskDecision> {
        let known_tickets = match self.ticket_catalog.list_tickets().await {
            Ok(tickets) => tickets,
            Err(error) => {
                warn!(error = %error, "ticket context unavailable, classifying without it");
                Vec::new()
            }
        };

        let request = RiskAssessmentRequest {
            principal: principal.clone(),
            intent: intent.to_owned(),
            known_tickets,
        };
        let assessment = tokio::time::timeout(self.timeout, self.oracle.assess(&request))
            .await
            .map_err(|_| {
                AppError::ClassifierUnavailable(format!(
                    "risk oracle did not answer within {} ms",
                    self.timeout.as_millis()
                ))
            })??;

        let rationale = NonEmptyString::new(assessment.rationale).map_err(|_| {
            AppError::ClassifierUnavailable("risk oracle returned an empty rationale".to_owned())
        })?;

        Ok(RiskDecision::new(
            request_id,
            assessment.ticket_reference,
            assessment.risk_level,
            rationale,
            self.policy
                .normalize_minutes(assessment.recommended_duration_minutes),
        ))
    }
}
