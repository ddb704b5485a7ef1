//! Mellon API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dto;
mod error;
mod handlers;
mod state;

use std::sync::Arc;

use mellon_application::RevocationHandler;
use mellon_core::AppError;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::api_config::{ApiConfig, PersistenceConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    if config.migrate_only {
        let PersistenceConfig::Postgres { database_url } = &config.persistence else {
            return Err(AppError::Validation(
                "migrate requires PERSISTENCE_BACKEND=postgres".to_owned(),
            ));
        };
        api_services::connect_database(database_url).await?;
        info!("database migrations applied successfully");
        return Ok(());
    }

    let app_state = api_services::build_app_state(&config).await?;

    let restored = app_state.grant_registry.restore().await?;
    info!(
        requests = restored.requests,
        grants = restored.grants,
        rearmed = restored.rearmed,
        "registry restored"
    );

    let (shutdown_sender, shutdown_receiver) = watch::channel(false);
    let scheduler = app_state.grant_registry.scheduler().clone();
    let handler: Arc<dyn RevocationHandler> = Arc::new(app_state.grant_registry.clone());
    let scheduler_task =
        tokio::spawn(async move { scheduler.run(handler, shutdown_receiver).await });

    let app = api_router::build_router(app_state);
    let address = config.socket_address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, intake_mode = config.intake_mode.as_str(), "mellon api listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")));

    shutdown_sender.send_replace(true);
    if let Err(error) = scheduler_task.await {
        warn!(error = %error, "revocation scheduler task ended abnormally");
    }

    served
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(error = %error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
