use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use mellon_core::{AppError, AppResult, NonEmptyString, PrincipalIdentity};
use serde::{Deserialize, Serialize};

use crate::RequestId;

/// Rationale substituted when the risk classifier cannot be reached.
pub const FAIL_SAFE_RATIONALE: &str = "classifier unavailable";

/// Natural-language access request captured at intake. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    request_id: RequestId,
    requester: PrincipalIdentity,
    intent: NonEmptyString,
    created_at: DateTime<Utc>,
}

impl AccessRequest {
    /// Creates a new access request with a fresh request id.
    #[must_use]
    pub fn new(
        requester: PrincipalIdentity,
        intent: NonEmptyString,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self::from_parts(RequestId::new(), requester, intent, created_at)
    }

    /// Rebuilds a request from persisted parts.
    #[must_use]
    pub fn from_parts(
        request_id: RequestId,
        requester: PrincipalIdentity,
        intent: NonEmptyString,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            request_id,
            requester,
            intent,
            created_at,
        }
    }

    /// Returns the request id.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the requesting principal.
    #[must_use]
    pub fn requester(&self) -> &PrincipalIdentity {
        &self.requester
    }

    /// Returns the free-text intent.
    #[must_use]
    pub fn intent(&self) -> &NonEmptyString {
        &self.intent
    }

    /// Returns the intake timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Risk classification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// Request matches a known, open ticket.
    Low,
    /// Anything else, including classifier failure.
    High,
}

impl RiskLevel {
    /// Returns a stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::High => "HIGH",
        }
    }
}

impl FromStr for RiskLevel {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "HIGH" => Ok(Self::High),
            _ => Err(AppError::Validation(format!(
                "unknown risk level value '{value}'"
            ))),
        }
    }
}

impl Display for RiskLevel {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Strictly positive grant duration with whole-second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct GrantDuration(i64);

impl GrantDuration {
    /// Longest duration any grant may carry: seven days.
    pub const MAX_SECONDS: i64 = 7 * 24 * 60 * 60;

    /// Creates a duration from seconds. Accepts `1..=MAX_SECONDS`.
    pub fn from_seconds(seconds: i64) -> AppResult<Self> {
        if seconds <= 0 {
            return Err(AppError::Validation(format!(
                "grant duration must be positive, got {seconds} seconds"
            )));
        }
        if seconds > Self::MAX_SECONDS {
            return Err(AppError::Validation(format!(
                "grant duration of {seconds} seconds exceeds the {} second limit",
                Self::MAX_SECONDS
            )));
        }

        Ok(Self(seconds))
    }

    /// Creates a duration from minutes.
    pub fn from_minutes(minutes: i64) -> AppResult<Self> {
        let seconds = minutes.checked_mul(60).ok_or_else(|| {
            AppError::Validation(format!("grant duration of {minutes} minutes overflows"))
        })?;
        Self::from_seconds(seconds)
    }

    /// Creates a duration from a compile-time minute count. Zero is raised to
    /// one minute and values past the limit are clamped to it.
    #[must_use]
    pub const fn from_whole_minutes(minutes: u16) -> Self {
        let minutes = if minutes == 0 { 1 } else { minutes };
        let seconds = minutes as i64 * 60;
        if seconds > Self::MAX_SECONDS {
            Self(Self::MAX_SECONDS)
        } else {
            Self(seconds)
        }
    }

    /// Returns the duration in seconds.
    #[must_use]
    pub fn as_seconds(&self) -> i64 {
        self.0
    }

    /// Returns the duration in whole minutes, rounded up.
    #[must_use]
    pub fn as_minutes_ceil(&self) -> i64 {
        (self.0 + 59) / 60
    }

    /// Returns the duration as a chrono delta.
    #[must_use]
    pub fn as_time_delta(&self) -> TimeDelta {
        TimeDelta::try_seconds(self.0).unwrap_or(TimeDelta::MAX)
    }
}

impl TryFrom<i64> for GrantDuration {
    type Error = AppError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_seconds(value)
    }
}

impl From<GrantDuration> for i64 {
    fn from(value: GrantDuration) -> Self {
        value.0
    }
}

impl Display for GrantDuration {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0 % 60 == 0 {
            write!(formatter, "{} minutes", self.0 / 60)
        } else {
            write!(formatter, "{} seconds", self.0)
        }
    }
}

/// Structured risk decision produced once per access request. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskDecision {
    request_id: RequestId,
    ticket_reference: Option<String>,
    risk_level: RiskLevel,
    rationale: String,
    recommended_duration: GrantDuration,
}

impl RiskDecision {
    /// Creates a risk decision.
    #[must_use]
    pub fn new(
        request_id: RequestId,
        ticket_reference: Option<String>,
        risk_level: RiskLevel,
        rationale: NonEmptyString,
        recommended_duration: GrantDuration,
    ) -> Self {
        Self {
            request_id,
            ticket_reference: ticket_reference
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty()),
            risk_level,
            rationale: rationale.into(),
            recommended_duration,
        }
    }

    /// Builds the canonical conservative decision used when the classifier is unavailable.
    #[must_use]
    pub fn fail_safe(request_id: RequestId, minimum_duration: GrantDuration) -> Self {
        Self {
            request_id,
            ticket_reference: None,
            risk_level: RiskLevel::High,
            rationale: FAIL_SAFE_RATIONALE.to_owned(),
            recommended_duration: minimum_duration,
        }
    }

    /// Returns the request id the decision belongs to.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the referenced ticket, when one was identified.
    #[must_use]
    pub fn ticket_reference(&self) -> Option<&str> {
        self.ticket_reference.as_deref()
    }

    /// Returns the risk level.
    #[must_use]
    pub fn risk_level(&self) -> RiskLevel {
        self.risk_level
    }

    /// Returns the classifier rationale.
    #[must_use]
    pub fn rationale(&self) -> &str {
        self.rationale.as_str()
    }

    /// Returns the recommended grant duration.
    #[must_use]
    pub fn recommended_duration(&self) -> GrantDuration {
        self.recommended_duration
    }

    /// Returns true when this is the fail-safe substitute decision.
    #[must_use]
    pub fn is_fail_safe(&self) -> bool {
        self.risk_level == RiskLevel::High && self.rationale == FAIL_SAFE_RATIONALE
    }
}
