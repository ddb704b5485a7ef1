use async_trait::async_trait;
use mellon_application::{RiskAssessment, RiskAssessmentRequest, RiskOracle};
use mellon_core::{AppError, AppResult};

/// Oracle used when no classifier is configured. Every request falls back to manual review.
#[derive(Clone, Default)]
pub struct UnavailableRiskOracle;

impl UnavailableRiskOracle {
    /// Creates a new unavailable oracle.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RiskOracle for UnavailableRiskOracle {
    async fn assess(&self, _request: &RiskAssessmentRequest) -> AppResult<RiskAssessment> {
        Err(AppError::ClassifierUnavailable(
            "no risk oracle is configured".to_owned(),
        ))
    }
}
