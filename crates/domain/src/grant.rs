use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use mellon_core::{AppError, AppResult, PrincipalIdentity};
use serde::{Deserialize, Serialize};

use crate::{GrantDuration, GrantId, RequestId, RevocationJobId};

/// Lifecycle state of a grant. Transitions are monotone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantState {
    /// Approval received, directory membership not yet confirmed.
    Pending,
    /// Principal is a member of the privileged group.
    Active,
    /// Membership removed after expiry.
    Revoked,
    /// Approver rejected the request.
    Denied,
}

impl GrantState {
    /// Returns a stable storage value for this state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Revoked => "revoked",
            Self::Denied => "denied",
        }
    }

    /// Returns true for states no transition may leave.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Revoked | Self::Denied)
    }

    /// Returns whether `next` is a legal successor of this state.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Active)
                | (Self::Pending, Self::Denied)
                | (Self::Active, Self::Revoked)
        )
    }

    /// Returns all known states.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[GrantState] = &[
            GrantState::Pending,
            GrantState::Active,
            GrantState::Revoked,
            GrantState::Denied,
        ];

        ALL
    }
}

impl FromStr for GrantState {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "revoked" => Ok(Self::Revoked),
            "denied" => Ok(Self::Denied),
            _ => Err(AppError::Validation(format!(
                "unknown grant state value '{value}'"
            ))),
        }
    }
}

impl Display for GrantState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Time-bound entitlement record for a principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    grant_id: GrantId,
    request_id: RequestId,
    principal: PrincipalIdentity,
    state: GrantState,
    resolved_by: Option<String>,
    decided_at: Option<DateTime<Utc>>,
    granted_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
    revocation_job_id: Option<RevocationJobId>,
}

/// Persisted grant fields used to rebuild a grant from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRecord {
    /// Stable grant id.
    pub grant_id: GrantId,
    /// Originating request id.
    pub request_id: RequestId,
    /// Entitled principal.
    pub principal: PrincipalIdentity,
    /// Lifecycle state.
    pub state: GrantState,
    /// Approver or denier identity.
    pub resolved_by: Option<String>,
    /// Approval or denial timestamp.
    pub decided_at: Option<DateTime<Utc>>,
    /// Activation timestamp.
    pub granted_at: Option<DateTime<Utc>>,
    /// Expiry timestamp.
    pub expires_at: Option<DateTime<Utc>>,
    /// Revocation timestamp.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Scheduled revocation job.
    pub revocation_job_id: Option<RevocationJobId>,
}

impl Grant {
    /// Creates a pending grant for an approved request.
    #[must_use]
    pub fn pending(request_id: RequestId, principal: PrincipalIdentity) -> Self {
        Self {
            grant_id: GrantId::new(),
            request_id,
            principal,
            state: GrantState::Pending,
            resolved_by: None,
            decided_at: None,
            granted_at: None,
            expires_at: None,
            revoked_at: None,
            revocation_job_id: None,
        }
    }

    /// Rebuilds a grant from persisted fields, checking timestamp consistency.
    pub fn from_record(record: GrantRecord) -> AppResult<Self> {
        let needs_window = matches!(record.state, GrantState::Active | GrantState::Revoked);
        if needs_window && (record.granted_at.is_none() || record.expires_at.is_none()) {
            return Err(AppError::Validation(format!(
                "grant '{}' in state '{}' is missing its grant window",
                record.grant_id, record.state
            )));
        }

        Ok(Self {
            grant_id: record.grant_id,
            request_id: record.request_id,
            principal: record.principal,
            state: record.state,
            resolved_by: record.resolved_by,
            decided_at: record.decided_at,
            granted_at: record.granted_at,
            expires_at: record.expires_at,
            revoked_at: record.revoked_at,
            revocation_job_id: record.revocation_job_id,
        })
    }

    /// Moves a pending grant to active with a window starting at `now`.
    pub fn activate(
        &mut self,
        approver: &str,
        now: DateTime<Utc>,
        duration: GrantDuration,
    ) -> AppResult<()> {
        self.ensure_transition(GrantState::Active)?;
        self.state = GrantState::Active;
        self.resolved_by = Some(approver.to_owned());
        self.decided_at = Some(now);
        self.granted_at = Some(now);
        self.expires_at = Some(now + duration.as_time_delta());
        Ok(())
    }

    /// Moves a pending grant to denied.
    pub fn deny(&mut self, approver: &str, now: DateTime<Utc>) -> AppResult<()> {
        self.ensure_transition(GrantState::Denied)?;
        self.state = GrantState::Denied;
        self.resolved_by = Some(approver.to_owned());
        self.decided_at = Some(now);
        Ok(())
    }

    /// Moves an active grant to revoked.
    pub fn revoke(&mut self, now: DateTime<Utc>) -> AppResult<()> {
        self.ensure_transition(GrantState::Revoked)?;
        self.state = GrantState::Revoked;
        self.revoked_at = Some(now);
        Ok(())
    }

    /// Records the revocation job armed for this grant.
    pub fn attach_revocation_job(&mut self, job_id: RevocationJobId) -> AppResult<()> {
        if self.state != GrantState::Active {
            return Err(AppError::Conflict(format!(
                "grant '{}' is '{}' and cannot carry a revocation job",
                self.grant_id, self.state
            )));
        }

        self.revocation_job_id = Some(job_id);
        Ok(())
    }

    fn ensure_transition(&self, next: GrantState) -> AppResult<()> {
        if self.state.can_transition_to(next) {
            return Ok(());
        }

        Err(AppError::Conflict(format!(
            "grant '{}' cannot move from '{}' to '{}'",
            self.grant_id, self.state, next
        )))
    }

    /// Returns the grant id.
    #[must_use]
    pub fn grant_id(&self) -> GrantId {
        self.grant_id
    }

    /// Returns the originating request id.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the entitled principal.
    #[must_use]
    pub fn principal(&self) -> &PrincipalIdentity {
        &self.principal
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> GrantState {
        self.state
    }

    /// Returns the approver or denier.
    #[must_use]
    pub fn resolved_by(&self) -> Option<&str> {
        self.resolved_by.as_deref()
    }

    /// Returns when the approval or denial was recorded.
    #[must_use]
    pub fn decided_at(&self) -> Option<DateTime<Utc>> {
        self.decided_at
    }

    /// Returns the activation timestamp.
    #[must_use]
    pub fn granted_at(&self) -> Option<DateTime<Utc>> {
        self.granted_at
    }

    /// Returns the expiry timestamp.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns the revocation timestamp.
    #[must_use]
    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    /// Returns the revocation job id, once armed.
    #[must_use]
    pub fn revocation_job_id(&self) -> Option<RevocationJobId> {
        self.revocation_job_id
    }

    /// Returns true when the grant is active and not yet past its expiry.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.state == GrantState::Active && self.expires_at.is_some_and(|expires| expires > now)
    }
}
