use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mellon_application::{AuditEvent, AuditQuery, AuditRepository};
use mellon_core::{AppError, AppResult, PrincipalIdentity};
use mellon_domain::{AuditAction, AuditEntry};
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed append-only audit ledger.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditEntryRow {
    sequence: i64,
    occurred_at: DateTime<Utc>,
    principal: String,
    action: String,
    actor: String,
    detail: String,
}

impl TryFrom<AuditEntryRow> for AuditEntry {
    type Error = AppError;

    fn try_from(row: AuditEntryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            sequence: u64::try_from(row.sequence).map_err(|error| {
                AppError::Internal(format!("invalid audit sequence {}: {error}", row.sequence))
            })?,
            timestamp: row.occurred_at,
            principal: PrincipalIdentity::new(row.principal)?,
            action: row.action.parse::<AuditAction>()?,
            actor: row.actor,
            detail: row.detail,
        })
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append_entry(&self, event: AuditEvent) -> AppResult<AuditEntry> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start audit transaction: {error}"))
        })?;

        // Serializes appends so sequence order and timestamp order agree.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext('mellon_audit_entries'))")
            .execute(&mut *transaction)
            .await
            .map_err(|error| AppError::Internal(format!("failed to lock audit ledger: {error}")))?;

        let row = sqlx::query_as::<_, AuditEntryRow>(
            r#"
            INSERT INTO mellon_audit_entries (occurred_at, principal, action, actor, detail)
            VALUES (
                GREATEST($1, COALESCE((SELECT max(occurred_at) FROM mellon_audit_entries), $1)),
                $2, $3, $4, $5
            )
            RETURNING sequence, occurred_at, principal, action, actor, detail
            "#,
        )
        .bind(event.occurred_at)
        .bind(event.principal.as_str())
        .bind(event.action.as_str())
        .bind(event.actor)
        .bind(event.detail)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append audit entry: {error}")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit audit entry: {error}"))
        })?;

        AuditEntry::try_from(row)
    }

    async fn list_entries(&self, query: AuditQuery) -> AppResult<Vec<AuditEntry>> {
        let capped_limit = query.limit.clamp(1, 500) as i64;
        let capped_offset = query.offset.min(100_000) as i64;
        let rows = sqlx::query_as::<_, AuditEntryRow>(
            r#"
            SELECT sequence, occurred_at, principal, action, actor, detail
            FROM mellon_audit_entries
            WHERE ($1::TEXT IS NULL OR principal = $1)
                AND ($2::TEXT IS NULL OR action = $2)
            ORDER BY sequence ASC
            LIMIT $3
            OFFSET $4
            "#,
        )
        .bind(query.principal.as_ref().map(PrincipalIdentity::as_str))
        .bind(query.action.map(|action| action.as_str()))
        .bind(capped_limit)
        .bind(capped_offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list audit entries: {error}")))?;

        rows.into_iter().map(AuditEntry::try_from).collect()
    }
}

#[cfg(test)]
mod tests;
