use super::*;

impl GrantRegistry {
    /// Returns one grant.
    pub async fn grant(&self, grant_id: GrantId) -> AppResult<Grant> {
        self.grant_snapshot(grant_id).await
    }

    /// Returns a request and its risk decision.
    pub async fn request(&self, request_id: RequestId) -> AppResult<StoredRequest> {
        let slot = self.request_slot(request_id).await?;
        let stored = slot.lock().await.clone();
        Ok(stored)
    }

    /// Returns the grant a request resolved onto, if any.
    pub async fn grant_for_request(&self, request_id: RequestId) -> AppResult<Option<Grant>> {
        let grant_id = self.request(request_id).await?.grant_id;
        match grant_id {
            Some(grant_id) => self.grant_snapshot(grant_id).await.map(Some),
            None => Ok(None),
        }
    }

    /// Returns the principal's active grant, if any.
    pub async fn active_grant_for(&self, principal: &PrincipalIdentity) -> Option<Grant> {
        let slot = self.principals.get(principal).await?;
        let grant_id = *slot.lock().await;
        self.current_active_grant(grant_id).await
    }

    /// Lists grants, newest decision first.
    pub async fn list_grants(&self, query: GrantQuery) -> Vec<Grant> {
        let mut grants = Vec::new();
        for slot in self.grants.values().await {
            let grant = slot.lock().await;
            let principal_matches = query
                .principal
                .as_ref()
                .is_none_or(|principal| principal == grant.principal());
            let state_matches = !query.active_only || grant.state() == GrantState::Active;
            if principal_matches && state_matches {
                grants.push(grant.clone());
            }
        }

        grants.sort_by(|left, right| {
            right
                .decided_at()
                .cmp(&left.decided_at())
                .then_with(|| right.grant_id().to_string().cmp(&left.grant_id().to_string()))
        });
        grants
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect()
    }

    /// Counts grants currently active.
    pub async fn active_grant_count(&self) -> usize {
        let mut active = 0;
        for slot in self.grants.values().await {
            if slot.lock().await.state() == GrantState::Active {
                active += 1;
            }
        }
        active
    }
}
