use std::str::FromStr;

use axum::Json;
use axum::extract::{Query, State};
use mellon_application::AuditQuery;
use mellon_core::PrincipalIdentity;
use mellon_domain::AuditAction;

use crate::dto::AuditEntryResponse;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, serde::Deserialize)]
pub struct AuditListQuery {
    pub principal: Option<String>,
    pub action: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub async fn list_audit_entries_handler(
    State(state): State<AppState>,
    Query(query): Query<AuditListQuery>,
) -> ApiResult<Json<Vec<AuditEntryResponse>>> {
    let principal = query.principal.map(PrincipalIdentity::new).transpose()?;
    let action = query
        .action
        .as_deref()
        .map(AuditAction::from_str)
        .transpose()?;

    let entries = state
        .audit_repository
        .list_entries(AuditQuery {
            principal,
            action,
            limit: query.limit.unwrap_or(100).min(1000),
            offset: query.offset.unwrap_or(0),
        })
        .await?
        .into_iter()
        .map(AuditEntryResponse::from)
        .collect();

    Ok(Json(entries))
}
