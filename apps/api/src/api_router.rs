use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(app_state: AppState) -> Router {
    let slack_routes = Router::new()
        .route("/slack/command", post(handlers::slack::slash_command_handler))
        .route(
            "/slack/interactions",
            post(handlers::slack::interactions_handler),
        );

    let read_routes = Router::new()
        .route("/api/grants", get(handlers::grants::list_grants_handler))
        .route(
            "/api/audit",
            get(handlers::audit::list_audit_entries_handler),
        );

    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(slack_routes)
        .merge(read_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
