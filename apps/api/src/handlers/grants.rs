use axum::Json;
use axum::extract::{Query, State};
use mellon_application::GrantQuery;
use mellon_core::PrincipalIdentity;

use crate::dto::GrantResponse;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, serde::Deserialize)]
pub struct GrantListQuery {
    pub principal: Option<String>,
    pub active_only: Option<bool>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub async fn list_grants_handler(
    State(state): State<AppState>,
    Query(query): Query<GrantListQuery>,
) -> ApiResult<Json<Vec<GrantResponse>>> {
    let principal = query.principal.map(PrincipalIdentity::new).transpose()?;

    let grants = state
        .grant_registry
        .list_grants(GrantQuery {
            principal,
            active_only: query.active_only.unwrap_or(false),
            limit: query.limit.unwrap_or(50).min(500),
            offset: query.offset.unwrap_or(0),
        })
        .await
        .into_iter()
        .map(GrantResponse::from)
        .collect();

    Ok(Json(grants))
}
