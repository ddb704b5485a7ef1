use super::*;

/// Counts of records rebuilt by [`GrantRegistry::restore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Requests loaded.
    pub requests: usize,
    /// Grants loaded.
    pub grants: usize,
    /// Active grants whose revocation was re-armed.
    pub rearmed: usize,
}

impl GrantRegistry {
    /// Rebuilds registry state from the grant repository.
    ///
    /// Every active grant gets a fresh revocation job at its original expiry.
    /// Grants that expired while the process was down fire as soon as the
    /// scheduler runs. Records already present in memory are skipped.
    pub async fn restore(&self) -> AppResult<RestoreSummary> {
        let snapshot = self.grant_repository.load_snapshot().await?;
        let mut summary = RestoreSummary::default();

        for stored in snapshot.requests {
            if self
                .requests
                .insert(stored.request.request_id(), stored)
                .await
            {
                summary.requests += 1;
            }
        }

        for grant in snapshot.grants {
            let grant_id = grant.grant_id();
            let principal = grant.principal().clone();
            let expires_at = grant.expires_at();
            let is_active = grant.state() == GrantState::Active;
            if !self.grants.insert(grant_id, grant).await {
                continue;
            }
            summary.grants += 1;

            if !is_active {
                continue;
            }

            let expires_at = expires_at.ok_or_else(|| {
                AppError::Internal(format!("active grant '{grant_id}' has no expiry"))
            })?;
            let principal_slot = self
                .principals
                .get_or_insert_with(principal, || None)
                .await;
            *principal_slot.lock().await = Some(grant_id);

            let job_id = self.scheduler.schedule(grant_id, expires_at).await;
            let rearmed = match self.grants.get(&grant_id).await {
                Some(slot) => {
                    let mut live = slot.lock().await;
                    if live.state() == GrantState::Active {
                        live.attach_revocation_job(job_id)?;
                    }
                    live.clone()
                }
                None => continue,
            };
            self.persist_grant(&rearmed).await;
            summary.rearmed += 1;
        }

        info!(
            requests = summary.requests,
            grants = summary.grants,
            rearmed = summary.rearmed,
            "grant registry restored"
        );
        Ok(summary)
    }
}
