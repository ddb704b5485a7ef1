use std::collections::HashSet;

use async_trait::async_trait;
use mellon_application::{DirectoryUserId, IdentityDirectory};
use mellon_core::{AppResult, PrincipalIdentity};
use tokio::sync::RwLock;
use tracing::info;

/// Local identity directory for development. Every principal resolves to a
/// user id equal to its login.
#[derive(Debug, Default)]
pub struct InMemoryIdentityDirectory {
    members: RwLock<HashSet<String>>,
}

impl InMemoryIdentityDirectory {
    /// Creates a directory with an empty privileged group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the user id is currently in the privileged group.
    pub async fn is_member(&self, user_id: &str) -> bool {
        self.members.read().await.contains(user_id)
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryIdentityDirectory {
    async fn lookup_user(
        &self,
        principal: &PrincipalIdentity,
    ) -> AppResult<Option<DirectoryUserId>> {
        DirectoryUserId::new(principal.as_str()).map(Some)
    }

    async fn add_member(&self, user_id: &DirectoryUserId) -> AppResult<()> {
        self.members.write().await.insert(user_id.to_string());
        info!(user_id = %user_id, "added to privileged group (in-memory)");
        Ok(())
    }

    async fn remove_member(&self, user_id: &DirectoryUserId) -> AppResult<()> {
        self.members.write().await.remove(user_id.as_str());
        info!(user_id = %user_id, "removed from privileged group (in-memory)");
        Ok(())
    }
}
