use async_trait::async_trait;
use mellon_application::{DirectoryUserId, IdentityDirectory};
use mellon_core::{AppError, AppResult, PrincipalIdentity};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

/// Okta-backed privileged group membership.
pub struct OktaIdentityDirectory {
    http_client: reqwest::Client,
    org_url: Url,
    api_token: String,
    group_id: String,
}

#[derive(Debug, Deserialize)]
struct OktaUser {
    id: String,
}

impl OktaIdentityDirectory {
    /// Creates an Okta directory client for one privileged group.
    pub fn new(
        http_client: reqwest::Client,
        org_url: &str,
        api_token: impl Into<String>,
        group_id: impl Into<String>,
    ) -> AppResult<Self> {
        let org_url = Url::parse(org_url).map_err(|error| {
            AppError::Validation(format!("invalid Okta org url '{org_url}': {error}"))
        })?;
        if org_url.cannot_be_a_base() {
            return Err(AppError::Validation(format!(
                "Okta org url '{org_url}' cannot be used as a base url"
            )));
        }

        Ok(Self {
            http_client,
            org_url,
            api_token: api_token.into(),
            group_id: group_id.into(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.org_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                AppError::Internal(format!("Okta org url '{}' has no path", self.org_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn membership_endpoint(&self, user_id: &DirectoryUserId) -> AppResult<Url> {
        self.endpoint(&[
            "api",
            "v1",
            "groups",
            self.group_id.as_str(),
            "users",
            user_id.as_str(),
        ])
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .header("Authorization", format!("SSWS {}", self.api_token))
    }
}

async fn unexpected_status(operation: &str, response: reqwest::Response) -> AppError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<response body unavailable>".to_owned());
    AppError::RemoteMutation(format!("Okta {operation} failed with status {status}: {body}"))
}

fn transport_error(operation: &str, error: &reqwest::Error) -> AppError {
    AppError::RemoteMutation(format!("Okta {operation} transport error: {error}"))
}

#[async_trait]
impl IdentityDirectory for OktaIdentityDirectory {
    async fn lookup_user(
        &self,
        principal: &PrincipalIdentity,
    ) -> AppResult<Option<DirectoryUserId>> {
        let url = self.endpoint(&["api", "v1", "users", principal.as_str()])?;
        let response = self
            .authorize(self.http_client.get(url))
            .send()
            .await
            .map_err(|error| transport_error("user lookup", &error))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(principal = %principal, "Okta user not found");
                Ok(None)
            }
            status if status.is_success() => {
                let user = response.json::<OktaUser>().await.map_err(|error| {
                    AppError::RemoteMutation(format!("Okta user lookup returned bad JSON: {error}"))
                })?;
                DirectoryUserId::new(user.id).map(Some)
            }
            _ => Err(unexpected_status("user lookup", response).await),
        }
    }

    async fn add_member(&self, user_id: &DirectoryUserId) -> AppResult<()> {
        let url = self.membership_endpoint(user_id)?;
        let response = self
            .authorize(self.http_client.put(url))
            .send()
            .await
            .map_err(|error| transport_error("group add", &error))?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(unexpected_status("group add", response).await)
    }

    async fn remove_member(&self, user_id: &DirectoryUserId) -> AppResult<()> {
        let url = self.membership_endpoint(user_id)?;
        let response = self
            .authorize(self.http_client.delete(url))
            .send()
            .await
            .map_err(|error| transport_error("group removal", &error))?;

        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }

        Err(unexpected_status("group removal", response).await)
    }
}

#[cfg(test)]
mod tests {
    use mellon_application::DirectoryUserId;

    use super::OktaIdentityDirectory;

    fn directory(org_url: &str) -> OktaIdentityDirectory {
        OktaIdentityDirectory::new(reqwest::Client::new(), org_url, "token", "grp-1")
            .unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn lookup_path_escapes_login() {
        let url = directory("https://example.okta.com/")
            .endpoint(&["api", "v1", "users", "alice smith@example.com"]);

        assert_eq!(
            url.map(|url| url.to_string()).ok().as_deref(),
            Some("https://example.okta.com/api/v1/users/alice%20smith@example.com")
        );
    }

    #[test]
    fn membership_path_targets_configured_group() {
        let user_id = DirectoryUserId::new("00u1").unwrap_or_else(|_| unreachable!());
        let url = directory("https://example.okta.com").membership_endpoint(&user_id);

        assert_eq!(
            url.map(|url| url.to_string()).ok().as_deref(),
            Some("https://example.okta.com/api/v1/groups/grp-1/users/00u1")
        );
    }

    #[test]
    fn invalid_org_url_is_rejected() {
        assert!(
            OktaIdentityDirectory::new(reqwest::Client::new(), "not a url", "token", "grp").is_err()
        );
    }
}
