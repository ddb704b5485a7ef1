use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use mellon_core::{AppError, AppResult, PrincipalIdentity};
use mellon_domain::{AuditEntry, Grant, GrantId};
use tokio::sync::Mutex;

use crate::{
    AccessRequestNotification, AuditEvent, AuditQuery, AuditRepository, Clock, DirectoryUserId,
    GrantRepository, IdentityDirectory, NotificationChannel, RegistrySnapshot, RevocationHandler,
    RiskAssessment, RiskAssessmentRequest, RiskOracle, StoredRequest, TicketCatalog,
    TicketContext,
};

pub(crate) fn epoch() -> DateTime<Utc> {
    match Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0) {
        chrono::LocalResult::Single(value) => value,
        _ => panic!("fixed test epoch should be valid"),
    }
}

pub(crate) fn principal(value: &str) -> PrincipalIdentity {
    match PrincipalIdentity::new(value) {
        Ok(principal) => principal,
        Err(error) => panic!("test principal should be valid: {error}"),
    }
}

/// Clock moved by hand.
pub(crate) struct ManualClock {
    now: StdMutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(crate) fn starting_at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: StdMutex::new(now),
        })
    }

    pub(crate) fn advance(&self, delta: TimeDelta) {
        let mut now = self
            .now
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self
            .now
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Clock that follows tokio time, so paused-time tests drive it with `advance`.
pub(crate) struct TokioClock {
    origin_instant: tokio::time::Instant,
    origin: DateTime<Utc>,
}

impl TokioClock {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            origin_instant: tokio::time::Instant::now(),
            origin: epoch(),
        })
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = self.origin_instant.elapsed();
        self.origin + TimeDelta::from_std(elapsed).unwrap_or(TimeDelta::zero())
    }
}

#[derive(Default)]
pub(crate) struct FakeAuditRepository {
    fail: bool,
    entries: Mutex<Vec<AuditEntry>>,
}

impl FakeAuditRepository {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl AuditRepository for FakeAuditRepository {
    async fn append_entry(&self, event: AuditEvent) -> AppResult<AuditEntry> {
        if self.fail {
            return Err(AppError::Internal("audit ledger unavailable".to_owned()));
        }
        let mut entries = self.entries.lock().await;
        let entry = AuditEntry {
            sequence: entries.len() as u64 + 1,
            timestamp: event.occurred_at,
            principal: event.principal,
            action: event.action,
            actor: event.actor,
            detail: event.detail,
        };
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn list_entries(&self, query: AuditQuery) -> AppResult<Vec<AuditEntry>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .filter(|entry| query.matches(entry))
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct FakeGrantRepository {
    requests: Mutex<HashMap<String, StoredRequest>>,
    grants: Mutex<HashMap<GrantId, Grant>>,
    fail_grant_saves: AtomicBool,
}

impl FakeGrantRepository {
    pub(crate) fn set_failing_grant_saves(&self, failing: bool) {
        self.fail_grant_saves.store(failing, Ordering::SeqCst);
    }

    pub(crate) async fn grant(&self, grant_id: GrantId) -> Option<Grant> {
        self.grants.lock().await.get(&grant_id).cloned()
    }
}

#[async_trait]
impl GrantRepository for FakeGrantRepository {
    async fn save_request(&self, stored: &StoredRequest) -> AppResult<()> {
        self.requests
            .lock()
            .await
            .insert(stored.request.request_id().to_string(), stored.clone());
        Ok(())
    }

    async fn save_grant(&self, grant: &Grant) -> AppResult<()> {
        if self.fail_grant_saves.load(Ordering::SeqCst) {
            return Err(AppError::Internal("grant store unavailable".to_owned()));
        }
        self.grants
            .lock()
            .await
            .insert(grant.grant_id(), grant.clone());
        Ok(())
    }

    async fn load_snapshot(&self) -> AppResult<RegistrySnapshot> {
        Ok(RegistrySnapshot {
            requests: self.requests.lock().await.values().cloned().collect(),
            grants: self.grants.lock().await.values().cloned().collect(),
        })
    }
}

/// Directory that tracks membership and counts every mutation.
#[derive(Default)]
pub(crate) struct FakeIdentityDirectory {
    unknown_users: HashSet<String>,
    fail_add: bool,
    fail_remove: bool,
    add_delay: Option<Duration>,
    members: Mutex<HashSet<String>>,
    add_calls: Mutex<Vec<String>>,
    remove_calls: Mutex<Vec<String>>,
}

impl FakeIdentityDirectory {
    pub(crate) fn with_unknown_user(mut self, login: &str) -> Self {
        self.unknown_users.insert(login.to_owned());
        self
    }

    pub(crate) fn with_member(mut self, login: &str) -> Self {
        self.members.get_mut().insert(format!("okta-{login}"));
        self
    }

    pub(crate) fn failing_add(mut self) -> Self {
        self.fail_add = true;
        self
    }

    pub(crate) fn failing_remove(mut self) -> Self {
        self.fail_remove = true;
        self
    }

    pub(crate) fn with_add_delay(mut self, delay: Duration) -> Self {
        self.add_delay = Some(delay);
        self
    }

    pub(crate) async fn is_member(&self, login: &str) -> bool {
        self.members.lock().await.contains(&format!("okta-{login}"))
    }

    pub(crate) async fn add_calls(&self) -> usize {
        self.add_calls.lock().await.len()
    }

    pub(crate) async fn remove_calls(&self) -> usize {
        self.remove_calls.lock().await.len()
    }
}

#[async_trait]
impl IdentityDirectory for FakeIdentityDirectory {
    async fn lookup_user(
        &self,
        principal: &PrincipalIdentity,
    ) -> AppResult<Option<DirectoryUserId>> {
        if self.unknown_users.contains(principal.as_str()) {
            return Ok(None);
        }

        DirectoryUserId::new(format!("okta-{principal}")).map(Some)
    }

    async fn add_member(&self, user_id: &DirectoryUserId) -> AppResult<()> {
        if let Some(delay) = self.add_delay {
            tokio::time::sleep(delay).await;
        }
        self.add_calls.lock().await.push(user_id.to_string());
        if self.fail_add {
            return Err(AppError::RemoteMutation("group add rejected".to_owned()));
        }

        self.members.lock().await.insert(user_id.to_string());
        Ok(())
    }

    async fn remove_member(&self, user_id: &DirectoryUserId) -> AppResult<()> {
        self.remove_calls.lock().await.push(user_id.to_string());
        if self.fail_remove {
            return Err(AppError::RemoteMutation("group remove rejected".to_owned()));
        }

        self.members.lock().await.remove(user_id.as_str());
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeNotificationChannel {
    fail: bool,
    sent: Mutex<Vec<AccessRequestNotification>>,
}

impl FakeNotificationChannel {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub(crate) async fn sent(&self) -> Vec<AccessRequestNotification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationChannel for FakeNotificationChannel {
    async fn send_access_request(
        &self,
        notification: &AccessRequestNotification,
    ) -> AppResult<()> {
        if self.fail {
            return Err(AppError::NotificationSend("channel_not_found".to_owned()));
        }

        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}

pub(crate) enum OracleBehavior {
    Answer(RiskAssessment),
    Fail,
    Hang,
}

pub(crate) struct FakeRiskOracle {
    behavior: OracleBehavior,
    seen: Mutex<Vec<RiskAssessmentRequest>>,
}

impl FakeRiskOracle {
    pub(crate) fn new(behavior: OracleBehavior) -> Self {
        Self {
            behavior,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) async fn seen(&self) -> Vec<RiskAssessmentRequest> {
        self.seen.lock().await.clone()
    }
}

#[async_trait]
impl RiskOracle for FakeRiskOracle {
    async fn assess(&self, request: &RiskAssessmentRequest) -> AppResult<RiskAssessment> {
        self.seen.lock().await.push(request.clone());
        match &self.behavior {
            OracleBehavior::Answer(assessment) => Ok(assessment.clone()),
            OracleBehavior::Fail => Err(AppError::ClassifierUnavailable(
                "upstream returned 503".to_owned(),
            )),
            OracleBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(AppError::ClassifierUnavailable("hung".to_owned()))
            }
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeTicketCatalog {
    tickets: Vec<TicketContext>,
}

impl FakeTicketCatalog {
    pub(crate) fn with_ticket(mut self, ticket_id: &str, assignee: &str) -> Self {
        self.tickets.push(TicketContext {
            ticket_id: ticket_id.to_owned(),
            status: "In Progress".to_owned(),
            assignee: assignee.to_owned(),
            summary: "Checkout latency spike".to_owned(),
            ticket_type: "incident".to_owned(),
            severity: "high".to_owned(),
        });
        self
    }
}

#[async_trait]
impl TicketCatalog for FakeTicketCatalog {
    async fn list_tickets(&self) -> AppResult<Vec<TicketContext>> {
        Ok(self.tickets.clone())
    }
}

/// Handler that records grant ids it was asked to revoke.
#[derive(Default)]
pub(crate) struct RecordingHandler {
    revoked: Mutex<Vec<GrantId>>,
    delay: Option<Duration>,
}

impl RecordingHandler {
    pub(crate) fn slow(delay: Duration) -> Self {
        Self {
            revoked: Mutex::new(Vec::new()),
            delay: Some(delay),
        }
    }

    pub(crate) async fn revoked(&self) -> Vec<GrantId> {
        self.revoked.lock().await.clone()
    }
}

#[async_trait]
impl RevocationHandler for RecordingHandler {
    async fn revoke_expired(&self, grant_id: GrantId) -> AppResult<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.revoked.lock().await.push(grant_id);
        Ok(())
    }
}
