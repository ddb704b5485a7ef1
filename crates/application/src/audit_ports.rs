use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mellon_core::{AppResult, PrincipalIdentity};
use mellon_domain::{AuditAction, AuditEntry};

/// Audit event payload emitted by lifecycle services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Time the transition happened according to the service clock.
    pub occurred_at: DateTime<Utc>,
    /// Principal whose entitlement changed.
    pub principal: PrincipalIdentity,
    /// Lifecycle action.
    pub action: AuditAction,
    /// Approver identity or automated actor.
    pub actor: String,
    /// Free-form detail.
    pub detail: String,
}

/// Query parameters for audit ledger listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditQuery {
    /// Optional principal filter.
    pub principal: Option<PrincipalIdentity>,
    /// Optional action filter.
    pub action: Option<AuditAction>,
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            principal: None,
            action: None,
            limit: 100,
            offset: 0,
        }
    }
}

impl AuditQuery {
    /// Returns true when an entry passes the principal and action filters.
    #[must_use]
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.principal
            .as_ref()
            .is_none_or(|principal| principal == &entry.principal)
            && self.action.is_none_or(|action| action == entry.action)
    }
}

/// Append-only audit ledger port.
///
/// Implementations serialize concurrent appends into one total order: the
/// returned entry carries its sequence and a timestamp that never decreases
/// along that order.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Appends one entry.
    async fn append_entry(&self, event: AuditEvent) -> AppResult<AuditEntry>;

    /// Lists entries in ledger order.
    async fn list_entries(&self, query: AuditQuery) -> AppResult<Vec<AuditEntry>>;
}
