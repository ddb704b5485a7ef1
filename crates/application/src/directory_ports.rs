use std::fmt::{Display, Formatter};

use async_trait::async_trait;
use mellon_core::{AppError, AppResult, PrincipalIdentity};

/// Identity-provider user id resolved from a principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirectoryUserId(String);

impl DirectoryUserId {
    /// Creates a directory user id.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::RemoteMutation(
                "identity directory returned an empty user id".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for DirectoryUserId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Privileged-group membership in the identity directory.
///
/// Every verb is idempotent: adding an existing member or removing a
/// non-member succeeds.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Resolves a principal to its directory user id.
    async fn lookup_user(&self, principal: &PrincipalIdentity)
    -> AppResult<Option<DirectoryUserId>>;

    /// Adds a user to the privileged group.
    async fn add_member(&self, user_id: &DirectoryUserId) -> AppResult<()>;

    /// Removes a user from the privileged group.
    async fn remove_member(&self, user_id: &DirectoryUserId) -> AppResult<()>;
}
