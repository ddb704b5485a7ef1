use chrono::{TimeDelta, Utc};
use mellon_application::{AuditEvent, AuditQuery, AuditRepository};
use mellon_core::PrincipalIdentity;
use mellon_domain::AuditAction;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use super::PostgresAuditRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(4)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres audit tests: {error}");
    }

    Some(pool)
}

#[tokio::test]
async fn appended_entries_are_listed_in_order_with_monotone_timestamps() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresAuditRepository::new(pool);
    let login = format!("audit-{}@example.com", uuid::Uuid::new_v4());
    let principal = PrincipalIdentity::new(login).unwrap_or_else(|_| unreachable!());

    let granted = repository
        .append_entry(AuditEvent {
            occurred_at: Utc::now(),
            principal: principal.clone(),
            action: AuditAction::Granted,
            actor: "bob".to_owned(),
            detail: "approved by bob".to_owned(),
        })
        .await;
    let revoked = repository
        .append_entry(AuditEvent {
            occurred_at: Utc::now() - TimeDelta::minutes(10),
            principal: principal.clone(),
            action: AuditAction::Revoked,
            actor: "system".to_owned(),
            detail: "expired".to_owned(),
        })
        .await;
    assert!(granted.is_ok());
    assert!(revoked.is_ok());

    let entries = repository
        .list_entries(AuditQuery {
            principal: Some(principal),
            ..AuditQuery::default()
        })
        .await
        .unwrap_or_default();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, AuditAction::Granted);
    assert_eq!(entries[1].action, AuditAction::Revoked);
    assert!(entries[0].sequence < entries[1].sequence);
    assert!(entries[0].timestamp <= entries[1].timestamp);
}
