use super::*;

fn normalize_approver(approver: &str) -> AppResult<&str> {
    let approver = approver.trim();
    if approver.is_empty() {
        return Err(AppError::Validation(
            "approver identity must not be empty".to_owned(),
        ));
    }

    Ok(approver)
}

impl GrantRegistry {
    /// Approves a pending request.
    ///
    /// Adds the principal to the privileged group, activates the grant and
    /// arms its revocation. Duplicate approvals return the existing
    /// resolution. If the directory mutation fails, or the active grant cannot
    /// be stored, the membership is undone and the request stays pending.
    pub async fn approve(
        &self,
        request_id: RequestId,
        approver: &str,
    ) -> AppResult<ApprovalOutcome> {
        let approver = normalize_approver(approver)?;
        let slot = self.request_slot(request_id).await?;
        let mut stored = slot.lock().await;

        if let Some(grant_id) = stored.grant_id {
            debug!(request_id = %request_id, grant_id = %grant_id, "request already resolved");
            return Ok(ApprovalOutcome::AlreadyResolved(
                self.grant_snapshot(grant_id).await?,
            ));
        }

        let principal = stored.request.requester().clone();
        let principal_slot = self
            .principals
            .get_or_insert_with(principal.clone(), || None)
            .await;
        let mut active_grant_id = principal_slot.lock().await;

        if let Some(existing) = self.current_active_grant(*active_grant_id).await {
            stored.grant_id = Some(existing.grant_id());
            self.persist_request(&stored).await;
            info!(
                request_id = %request_id,
                grant_id = %existing.grant_id(),
                principal = %principal,
                "principal already holds an active grant"
            );
            return Ok(ApprovalOutcome::AlreadyActive(existing));
        }

        let duration = stored
            .decision
            .as_ref()
            .map_or(self.policy.default_duration(), RiskDecision::recommended_duration);

        let user_id = self.resolve_directory_user(&principal).await?;
        self.add_membership(&principal, &user_id).await?;

        let mut grant = Grant::pending(request_id, principal.clone());
        grant.activate(approver, self.clock.now(), duration)?;
        let grant_id = grant.grant_id();
        let expires_at = grant.expires_at().ok_or_else(|| {
            AppError::Internal(format!("active grant '{grant_id}' has no expiry"))
        })?;

        // The active grant must be durable before anyone is told about it,
        // otherwise a restart would never revoke the membership.
        if let Err(error) = self.grant_repository.save_grant(&grant).await {
            warn!(
                request_id = %request_id,
                grant_id = %grant_id,
                error = %error,
                "failed to persist new grant, rolling back membership"
            );
            self.rollback_membership(&principal, &user_id).await;
            return Err(AppError::RemoteMutation(format!(
                "could not record the grant for '{principal}'; group membership was rolled back"
            )));
        }

        self.grants.insert(grant_id, grant.clone()).await;
        let job_id = self.scheduler.schedule(grant_id, expires_at).await;
        if let Some(slot) = self.grants.get(&grant_id).await {
            let mut live = slot.lock().await;
            if live.state() == GrantState::Active {
                live.attach_revocation_job(job_id)?;
            }
            grant = live.clone();
        }

        *active_grant_id = Some(grant_id);
        stored.grant_id = Some(grant_id);
        self.persist_grant(&grant).await;
        self.persist_request(&stored).await;

        let mut detail = format!("approved by {approver} for {duration}, expires {expires_at}");
        if let Some(ticket) = stored
            .decision
            .as_ref()
            .and_then(RiskDecision::ticket_reference)
        {
            detail.push_str(&format!("; ticket {ticket}"));
        }
        self.record_audit(&grant, AuditAction::Granted, approver, detail)
            .await;

        info!(
            request_id = %request_id,
            grant_id = %grant_id,
            principal = %principal,
            approver = approver,
            expires_at = %expires_at,
            "access granted"
        );
        Ok(ApprovalOutcome::Granted(grant))
    }

    /// Denies a pending request. No directory change and no revocation job.
    pub async fn deny(&self, request_id: RequestId, approver: &str) -> AppResult<DenialOutcome> {
        let approver = normalize_approver(approver)?;
        let slot = self.request_slot(request_id).await?;
        let mut stored = slot.lock().await;

        if let Some(grant_id) = stored.grant_id {
            debug!(request_id = %request_id, grant_id = %grant_id, "request already resolved");
            return Ok(DenialOutcome::AlreadyResolved(
                self.grant_snapshot(grant_id).await?,
            ));
        }

        let mut grant = Grant::pending(request_id, stored.request.requester().clone());
        grant.deny(approver, self.clock.now())?;
        let grant_id = grant.grant_id();

        self.grants.insert(grant_id, grant.clone()).await;
        stored.grant_id = Some(grant_id);
        self.persist_grant(&grant).await;
        self.persist_request(&stored).await;
        self.record_audit(
            &grant,
            AuditAction::Denied,
            approver,
            format!("rejected by {approver}"),
        )
        .await;

        info!(
            request_id = %request_id,
            principal = %grant.principal(),
            approver = approver,
            "access denied"
        );
        Ok(DenialOutcome::Denied(grant))
    }

    async fn add_membership(
        &self,
        principal: &PrincipalIdentity,
        user_id: &DirectoryUserId,
    ) -> AppResult<()> {
        match tokio::time::timeout(self.remote_call_timeout, self.directory.add_member(user_id))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                // The add may still land after we give up.
                self.rollback_membership(principal, user_id).await;
                Err(AppError::RemoteMutation(format!(
                    "adding '{principal}' to the privileged group timed out after {} ms",
                    self.remote_call_timeout.as_millis()
                )))
            }
        }
    }

    /// Undoes a group add so no membership exists without a recorded grant.
    async fn rollback_membership(
        &self,
        principal: &PrincipalIdentity,
        user_id: &DirectoryUserId,
    ) {
        let removal = self
            .bounded(
                "compensating group removal",
                self.directory.remove_member(user_id),
            )
            .await;
        if let Err(error) = removal {
            error!(
                principal = %principal,
                user_id = %user_id,
                error = %error,
                "compensating group removal failed; membership must be removed by hand"
            );
        }
    }
}
