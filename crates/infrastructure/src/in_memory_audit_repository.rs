use async_trait::async_trait;
use mellon_application::{AuditEvent, AuditQuery, AuditRepository};
use mellon_core::AppResult;
use mellon_domain::AuditEntry;
use tokio::sync::Mutex;

/// In-memory audit ledger.
#[derive(Debug, Default)]
pub struct InMemoryAuditRepository {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditRepository {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn append_entry(&self, event: AuditEvent) -> AppResult<AuditEntry> {
        let mut entries = self.entries.lock().await;
        let timestamp = entries
            .last()
            .map_or(event.occurred_at, |last| last.timestamp.max(event.occurred_at));

        let entry = AuditEntry {
            sequence: entries.len() as u64 + 1,
            timestamp,
            principal: event.principal,
            action: event.action,
            actor: event.actor,
            detail: event.detail,
        };
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn list_entries(&self, query: AuditQuery) -> AppResult<Vec<AuditEntry>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .filter(|entry| query.matches(entry))
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeDelta, Utc};
    use mellon_application::{AuditEvent, AuditQuery, AuditRepository};
    use mellon_core::PrincipalIdentity;
    use mellon_domain::AuditAction;

    use super::InMemoryAuditRepository;

    fn event(login: &str, action: AuditAction, offset_seconds: i64) -> AuditEvent {
        AuditEvent {
            occurred_at: Utc::now() + TimeDelta::seconds(offset_seconds),
            principal: PrincipalIdentity::new(login).unwrap_or_else(|_| unreachable!()),
            action,
            actor: "bob".to_owned(),
            detail: "test".to_owned(),
        }
    }

    #[tokio::test]
    async fn concurrent_appends_form_a_total_order() {
        let repository = Arc::new(InMemoryAuditRepository::new());

        let mut handles = Vec::new();
        for index in 0..32_i64 {
            let repository = repository.clone();
            handles.push(tokio::spawn(async move {
                repository
                    .append_entry(event("alice", AuditAction::Granted, -index))
                    .await
            }));
        }
        for handle in handles {
            assert!(matches!(handle.await, Ok(Ok(_))));
        }

        let entries = repository
            .list_entries(AuditQuery {
                limit: 100,
                ..AuditQuery::default()
            })
            .await
            .unwrap_or_default();
        assert_eq!(entries.len(), 32);
        assert!(entries.windows(2).all(|pair| {
            pair[0].sequence + 1 == pair[1].sequence && pair[0].timestamp <= pair[1].timestamp
        }));
    }

    #[tokio::test]
    async fn list_filters_by_principal_and_action() {
        let repository = InMemoryAuditRepository::new();
        for (login, action) in [
            ("alice", AuditAction::Granted),
            ("bob", AuditAction::Denied),
            ("alice", AuditAction::Revoked),
        ] {
            assert!(repository.append_entry(event(login, action, 0)).await.is_ok());
        }

        let alice = repository
            .list_entries(AuditQuery {
                principal: PrincipalIdentity::new("alice").ok(),
                ..AuditQuery::default()
            })
            .await
            .unwrap_or_default();
        let revoked = repository
            .list_entries(AuditQuery {
                action: Some(AuditAction::Revoked),
                ..AuditQuery::default()
            })
            .await
            .unwrap_or_default();

        assert_eq!(alice.len(), 2);
        assert_eq!(revoked.len(), 1);
        assert_eq!(revoked[0].sequence, 3);
    }
}
