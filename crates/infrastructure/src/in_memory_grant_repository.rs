use std::collections::HashMap;

use async_trait::async_trait;
use mellon_application::{GrantRepository, RegistrySnapshot, StoredRequest};
use mellon_core::AppResult;
use mellon_domain::{Grant, GrantId, RequestId};
use tokio::sync::RwLock;

/// In-memory grant repository.
///
/// Lives only as long as the process; restarting loses every pending
/// revocation. Use the PostgreSQL repository where that matters.
#[derive(Debug, Default)]
pub struct InMemoryGrantRepository {
    requests: RwLock<HashMap<RequestId, StoredRequest>>,
    grants: RwLock<HashMap<GrantId, Grant>>,
}

impl InMemoryGrantRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GrantRepository for InMemoryGrantRepository {
    async fn save_request(&self, stored: &StoredRequest) -> AppResult<()> {
        self.requests
            .write()
            .await
            .insert(stored.request.request_id(), stored.clone());
        Ok(())
    }

    async fn save_grant(&self, grant: &Grant) -> AppResult<()> {
        self.grants
            .write()
            .await
            .insert(grant.grant_id(), grant.clone());
        Ok(())
    }

    async fn load_snapshot(&self) -> AppResult<RegistrySnapshot> {
        Ok(RegistrySnapshot {
            requests: self.requests.read().await.values().cloned().collect(),
            grants: self.grants.read().await.values().cloned().collect(),
        })
    }
}
