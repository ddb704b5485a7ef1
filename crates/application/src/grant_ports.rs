use async_trait::async_trait;
use mellon_core::{AppResult, PrincipalIdentity};
use mellon_domain::{AccessRequest, Grant, GrantId, RiskDecision};

/// Persisted request row: the request, its decision, and its resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRequest {
    /// Intake record.
    pub request: AccessRequest,
    /// Risk decision, once classified.
    pub decision: Option<RiskDecision>,
    /// Grant the request resolved onto.
    pub grant_id: Option<GrantId>,
}

/// Everything needed to rebuild the registry after a restart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    /// Known requests.
    pub requests: Vec<StoredRequest>,
    /// Known grants.
    pub grants: Vec<Grant>,
}

/// Query parameters for grant listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantQuery {
    /// Optional principal filter.
    pub principal: Option<PrincipalIdentity>,
    /// Whether to return only active grants.
    pub active_only: bool,
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for pagination.
    pub offset: usize,
}

impl Default for GrantQuery {
    fn default() -> Self {
        Self {
            principal: None,
            active_only: false,
            limit: 50,
            offset: 0,
        }
    }
}

/// Write-through persistence for the grant registry.
#[async_trait]
pub trait GrantRepository: Send + Sync {
    /// Inserts or updates one request row.
    async fn save_request(&self, stored: &StoredRequest) -> AppResult<()>;

    /// Inserts or updates one grant row.
    async fn save_grant(&self, grant: &Grant) -> AppResult<()>;

    /// Loads every persisted request and grant.
    async fn load_snapshot(&self) -> AppResult<RegistrySnapshot>;
}
