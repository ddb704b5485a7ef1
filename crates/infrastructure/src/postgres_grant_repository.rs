use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mellon_application::{GrantRepository, RegistrySnapshot, StoredRequest};
use mellon_core::{AppError, AppResult, NonEmptyString, PrincipalIdentity};
use mellon_domain::{
    AccessRequest, Grant, GrantDuration, GrantId, GrantRecord, RequestId, RevocationJobId,
    RiskDecision, RiskLevel,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// PostgreSQL-backed write-through store for requests and grants.
#[derive(Clone)]
pub struct PostgresGrantRepository {
    pool: PgPool,
}

impl PostgresGrantRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AccessRequestRow {
    request_id: Uuid,
    requester: String,
    intent: String,
    created_at: DateTime<Utc>,
    ticket_reference: Option<String>,
    risk_level: Option<String>,
    rationale: Option<String>,
    recommended_duration_seconds: Option<i64>,
    grant_id: Option<Uuid>,
}

impl TryFrom<AccessRequestRow> for StoredRequest {
    type Error = AppError;

    fn try_from(row: AccessRequestRow) -> Result<Self, Self::Error> {
        let request_id = RequestId::from_uuid(row.request_id);
        let request = AccessRequest::from_parts(
            request_id,
            PrincipalIdentity::new(row.requester)?,
            NonEmptyString::new(row.intent)?,
            row.created_at,
        );

        let decision = match (row.risk_level, row.rationale, row.recommended_duration_seconds) {
            (Some(risk_level), Some(rationale), Some(seconds)) => Some(RiskDecision::new(
                request_id,
                row.ticket_reference,
                risk_level.parse::<RiskLevel>()?,
                NonEmptyString::new(rationale)?,
                GrantDuration::from_seconds(seconds)?,
            )),
            _ => None,
        };

        Ok(Self {
            request,
            decision,
            grant_id: row.grant_id.map(GrantId::from_uuid),
        })
    }
}

#[derive(Debug, FromRow)]
struct GrantRow {
    grant_id: Uuid,
    request_id: Uuid,
    principal: String,
    state: String,
    resolved_by: Option<String>,
    decided_at: Option<DateTime<Utc>>,
    granted_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
    revocation_job_id: Option<Uuid>,
}

impl TryFrom<GrantRow> for Grant {
    type Error = AppError;

    fn try_from(row: GrantRow) -> Result<Self, Self::Error> {
        Grant::from_record(GrantRecord {
            grant_id: GrantId::from_uuid(row.grant_id),
            request_id: RequestId::from_uuid(row.request_id),
            principal: PrincipalIdentity::new(row.principal)?,
            state: row.state.parse()?,
            resolved_by: row.resolved_by,
            decided_at: row.decided_at,
            granted_at: row.granted_at,
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
            revocation_job_id: row.revocation_job_id.map(RevocationJobId::from_uuid),
        })
    }
}

#[async_trait]
impl GrantRepository for PostgresGrantRepository {
    async fn save_request(&self, stored: &StoredRequest) -> AppResult<()> {
        let decision = stored.decision.as_ref();
        sqlx::query(
            r#"
            INSERT INTO mellon_access_requests (
                request_id,
                requester,
                intent,
                created_at,
                ticket_reference,
                risk_level,
                rationale,
                recommended_duration_seconds,
                grant_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (request_id) DO UPDATE SET
                ticket_reference = EXCLUDED.ticket_reference,
                risk_level = EXCLUDED.risk_level,
                rationale = EXCLUDED.rationale,
                recommended_duration_seconds = EXCLUDED.recommended_duration_seconds,
                grant_id = EXCLUDED.grant_id
            "#,
        )
        .bind(stored.request.request_id().as_uuid())
        .bind(stored.request.requester().as_str())
        .bind(stored.request.intent().as_str())
        .bind(stored.request.created_at())
        .bind(decision.and_then(RiskDecision::ticket_reference))
        .bind(decision.map(|decision| decision.risk_level().as_str()))
        .bind(decision.map(RiskDecision::rationale))
        .bind(decision.map(|decision| decision.recommended_duration().as_seconds()))
        .bind(stored.grant_id.map(|grant_id| grant_id.as_uuid()))
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save access request '{}': {error}",
                stored.request.request_id()
            ))
        })?;

        Ok(())
    }

    async fn save_grant(&self, grant: &Grant) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO mellon_grants (
                grant_id,
                request_id,
                principal,
                state,
                resolved_by,
                decided_at,
                granted_at,
                expires_at,
                revoked_at,
                revocation_job_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (grant_id) DO UPDATE SET
                state = EXCLUDED.state,
                resolved_by = EXCLUDED.resolved_by,
                decided_at = EXCLUDED.decided_at,
                granted_at = EXCLUDED.granted_at,
                expires_at = EXCLUDED.expires_at,
                revoked_at = EXCLUDED.revoked_at,
                revocation_job_id = EXCLUDED.revocation_job_id
            "#,
        )
        .bind(grant.grant_id().as_uuid())
        .bind(grant.request_id().as_uuid())
        .bind(grant.principal().as_str())
        .bind(grant.state().as_str())
        .bind(grant.resolved_by())
        .bind(grant.decided_at())
        .bind(grant.granted_at())
        .bind(grant.expires_at())
        .bind(grant.revoked_at())
        .bind(grant.revocation_job_id().map(|job_id| job_id.as_uuid()))
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save grant '{}': {error}",
                grant.grant_id()
            ))
        })?;

        Ok(())
    }

    async fn load_snapshot(&self) -> AppResult<RegistrySnapshot> {
        let request_rows = sqlx::query_as::<_, AccessRequestRow>(
            r#"
            SELECT
                request_id,
                requester,
                intent,
                created_at,
                ticket_reference,
                risk_level,
                rationale,
                recommended_duration_seconds,
                grant_id
            FROM mellon_access_requests
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load access requests: {error}")))?;

        let grant_rows = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT
                grant_id,
                request_id,
                principal,
                state,
                resolved_by,
                decided_at,
                granted_at,
                expires_at,
                revoked_at,
                revocation_job_id
            FROM mellon_grants
            ORDER BY decided_at ASC NULLS FIRST
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load grants: {error}")))?;

        Ok(RegistrySnapshot {
            requests: request_rows
                .into_iter()
                .map(StoredRequest::try_from)
                .collect::<AppResult<_>>()?,
            grants: grant_rows
                .into_iter()
                .map(Grant::try_from)
                .collect::<AppResult<_>>()?,
        })
    }
}
