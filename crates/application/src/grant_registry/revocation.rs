use super::*;

impl GrantRegistry {
    /// Revokes an active grant. Idempotent: non-active grants are left alone.
    ///
    /// A failed directory removal is logged and recorded in the audit detail,
    /// but the grant still moves to revoked.
    pub async fn revoke(&self, grant_id: GrantId, reason: &str) -> AppResult<RevocationOutcome> {
        let slot = self.grants.get(&grant_id).await.ok_or_else(|| {
            AppError::NotFound(format!("grant '{grant_id}' does not exist"))
        })?;

        let (revoked, directory_error) = {
            let mut grant = slot.lock().await;
            if grant.state() != GrantState::Active {
                debug!(grant_id = %grant_id, state = %grant.state(), "grant not active, skipping revocation");
                return Ok(RevocationOutcome::NotActive(grant.clone()));
            }

            let directory_error = match self.remove_membership(grant.principal()).await {
                Ok(()) => None,
                Err(error) => {
                    warn!(
                        grant_id = %grant_id,
                        principal = %grant.principal(),
                        error = %error,
                        "directory removal failed, revoking grant anyway"
                    );
                    Some(error.to_string())
                }
            };

            grant.revoke(self.clock.now())?;
            (grant.clone(), directory_error)
        };

        self.persist_grant(&revoked).await;

        if let Some(principal_slot) = self.principals.get(revoked.principal()).await {
            let mut active_grant_id = principal_slot.lock().await;
            if *active_grant_id == Some(grant_id) {
                *active_grant_id = None;
            }
        }

        if let Some(job_id) = revoked.revocation_job_id() {
            // Already fired when the scheduler called us; cancels it otherwise.
            let _ = self.scheduler.cancel(job_id).await;
        }

        let detail = match &directory_error {
            Some(error) => format!("{reason}; directory removal failed: {error}"),
            None => reason.to_owned(),
        };
        self.record_audit(&revoked, AuditAction::Revoked, REVOCATION_ACTOR, detail)
            .await;

        info!(
            grant_id = %grant_id,
            principal = %revoked.principal(),
            reason = reason,
            "access revoked"
        );
        Ok(RevocationOutcome::Revoked {
            grant: revoked,
            directory_error,
        })
    }

    async fn remove_membership(&self, principal: &PrincipalIdentity) -> AppResult<()> {
        let user_id = self.resolve_directory_user(principal).await?;
        self.bounded(
            "privileged group removal",
            self.directory.remove_member(&user_id),
        )
        .await
    }
}
