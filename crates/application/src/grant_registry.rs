use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mellon_core::{AppError, AppResult, PrincipalIdentity};
use mellon_domain::{
    AccessRequest, AuditAction, Grant, GrantId, GrantState, RequestId, RiskDecision,
};
use tracing::{debug, error, info, warn};

use crate::audit_ports::{AuditEvent, AuditRepository};
use crate::clock::Clock;
use crate::directory_ports::{DirectoryUserId, IdentityDirectory};
use crate::grant_policy::GrantPolicy;
use crate::grant_ports::{GrantQuery, GrantRepository, StoredRequest};
use crate::keyed_slots::KeyedSlots;
use crate::revocation_scheduler::{RevocationHandler, RevocationScheduler};

mod approval;
mod queries;
mod restore;
mod revocation;

pub use restore::RestoreSummary;

/// Actor recorded for automatic revocations.
pub const REVOCATION_ACTOR: &str = "system";

/// Reason recorded when a grant reaches its expiry.
pub const EXPIRY_REASON: &str = "expired";

/// Result of an approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// A new grant was activated.
    Granted(Grant),
    /// The request had already been approved or denied.
    AlreadyResolved(Grant),
    /// The principal already held an active grant; the request now points at it.
    AlreadyActive(Grant),
}

impl ApprovalOutcome {
    /// Returns the grant the request resolved onto.
    #[must_use]
    pub fn grant(&self) -> &Grant {
        match self {
            Self::Granted(grant) | Self::AlreadyResolved(grant) | Self::AlreadyActive(grant) => {
                grant
            }
        }
    }
}

/// Result of a denial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialOutcome {
    /// The request was denied by this call.
    Denied(Grant),
    /// The request had already been approved or denied.
    AlreadyResolved(Grant),
}

impl DenialOutcome {
    /// Returns the grant the request resolved onto.
    #[must_use]
    pub fn grant(&self) -> &Grant {
        match self {
            Self::Denied(grant) | Self::AlreadyResolved(grant) => grant,
        }
    }
}

/// Result of a revocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationOutcome {
    /// This call revoked the grant.
    Revoked {
        /// Grant after revocation.
        grant: Grant,
        /// Directory removal failure, when removal did not succeed.
        directory_error: Option<String>,
    },
    /// The grant was not active; nothing changed.
    NotActive(Grant),
}

/// Authoritative store of requests, decisions and grants.
///
/// Every state transition for a request or grant is serialized on that
/// record's own lock. Approval holds the request lock, then the principal
/// lock, then briefly the existing grant's lock. Revocation holds only the
/// grant lock while mutating the directory and takes the principal lock after
/// releasing it.
#[derive(Clone)]
pub struct GrantRegistry {
    requests: Arc<KeyedSlots<RequestId, StoredRequest>>,
    grants: Arc<KeyedSlots<GrantId, Grant>>,
    principals: Arc<KeyedSlots<PrincipalIdentity, Option<GrantId>>>,
    directory: Arc<dyn IdentityDirectory>,
    scheduler: RevocationScheduler,
    audit_repository: Arc<dyn AuditRepository>,
    grant_repository: Arc<dyn GrantRepository>,
    clock: Arc<dyn Clock>,
    policy: GrantPolicy,
    remote_call_timeout: Duration,
}

impl GrantRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(
        directory: Arc<dyn IdentityDirectory>,
        scheduler: RevocationScheduler,
        audit_repository: Arc<dyn AuditRepository>,
        grant_repository: Arc<dyn GrantRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            requests: Arc::new(KeyedSlots::new()),
            grants: Arc::new(KeyedSlots::new()),
            principals: Arc::new(KeyedSlots::new()),
            directory,
            scheduler,
            audit_repository,
            grant_repository,
            clock,
            policy: GrantPolicy::default(),
            remote_call_timeout: Duration::from_secs(10),
        }
    }

    /// Overrides the grant duration policy.
    #[must_use]
    pub fn with_policy(mut self, policy: GrantPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Bounds every identity-directory call.
    #[must_use]
    pub fn with_remote_call_timeout(mut self, remote_call_timeout: Duration) -> Self {
        self.remote_call_timeout = remote_call_timeout;
        self
    }

    /// Returns the scheduler that arms revocations for this registry.
    #[must_use]
    pub fn scheduler(&self) -> &RevocationScheduler {
        &self.scheduler
    }

    /// Stores a new access request.
    pub async fn register_request(&self, request: AccessRequest) -> AppResult<()> {
        let request_id = request.request_id();
        if self.requests.get(&request_id).await.is_some() {
            return Err(AppError::Conflict(format!(
                "request '{request_id}' is already registered"
            )));
        }

        let stored = StoredRequest {
            request,
            decision: None,
            grant_id: None,
        };
        self.grant_repository.save_request(&stored).await?;

        if !self.requests.insert(request_id, stored).await {
            return Err(AppError::Conflict(format!(
                "request '{request_id}' is already registered"
            )));
        }

        debug!(request_id = %request_id, "request registered");
        Ok(())
    }

    /// Attaches the single risk decision for a request.
    pub async fn attach_decision(&self, decision: RiskDecision) -> AppResult<()> {
        let request_id = decision.request_id();
        let slot = self.request_slot(request_id).await?;
        let mut stored = slot.lock().await;
        if stored.decision.is_some() {
            return Err(AppError::Conflict(format!(
                "request '{request_id}' already has a risk decision"
            )));
        }

        stored.decision = Some(decision);
        self.persist_request(&stored).await;
        Ok(())
    }

    async fn request_slot(
        &self,
        request_id: RequestId,
    ) -> AppResult<Arc<tokio::sync::Mutex<StoredRequest>>> {
        self.requests
            .get(&request_id)
            .await
            .ok_or_else(|| AppError::UnknownRequest(format!("request '{request_id}' is unknown")))
    }

    async fn grant_snapshot(&self, grant_id: GrantId) -> AppResult<Grant> {
        let grant = self.grants.get(&grant_id).await.ok_or_else(|| {
            AppError::NotFound(format!("grant '{grant_id}' does not exist"))
        })?;
        let snapshot = grant.lock().await.clone();
        Ok(snapshot)
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        future: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        tokio::time::timeout(self.remote_call_timeout, future)
            .await
            .map_err(|_| {
                AppError::RemoteMutation(format!(
                    "{operation} timed out after {} ms",
                    self.remote_call_timeout.as_millis()
                ))
            })?
    }

    async fn resolve_directory_user(
        &self,
        principal: &PrincipalIdentity,
    ) -> AppResult<DirectoryUserId> {
        self.bounded(
            "directory user lookup",
            self.directory.lookup_user(principal),
        )
        .await?
        .ok_or_else(|| {
            AppError::RemoteMutation(format!(
                "could not find a directory user for '{principal}'"
            ))
        })
    }

    async fn current_active_grant(&self, grant_id: Option<GrantId>) -> Option<Grant> {
        let slot = self.grants.get(&grant_id?).await?;
        let grant = slot.lock().await;
        (grant.state() == GrantState::Active).then(|| grant.clone())
    }

    async fn persist_request(&self, stored: &StoredRequest) {
        if let Err(error) = self.grant_repository.save_request(stored).await {
            warn!(
                request_id = %stored.request.request_id(),
                error = %error,
                "failed to persist request"
            );
        }
    }

    async fn persist_grant(&self, grant: &Grant) {
        if let Err(error) = self.grant_repository.save_grant(grant).await {
            warn!(grant_id = %grant.grant_id(), error = %error, "failed to persist grant");
        }
    }

    async fn record_audit(&self, grant: &Grant, action: AuditAction, actor: &str, detail: String) {
        let event = AuditEvent {
            occurred_at: self.clock.now(),
            principal: grant.principal().clone(),
            action,
            actor: actor.to_owned(),
            detail,
        };

        match self.audit_repository.append_entry(event.clone()).await {
            Ok(entry) => info!(
                sequence = entry.sequence,
                principal = %entry.principal,
                action = %entry.action,
                "audit entry recorded"
            ),
            // The ledger is the compliance record; the lost row must be
            // recoverable from the logs.
            Err(error) => error!(
                grant_id = %grant.grant_id(),
                occurred_at = %event.occurred_at,
                principal = %event.principal,
                action = %event.action,
                actor = %event.actor,
                detail = %event.detail,
                error = %error,
                "failed to record audit entry"
            ),
        }
    }
}

#[async_trait]
impl RevocationHandler for GrantRegistry {
    async fn revoke_expired(&self, grant_id: GrantId) -> AppResult<()> {
        self.revoke(grant_id, EXPIRY_REASON).await.map(|_| ())
    }
}
