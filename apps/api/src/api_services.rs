use std::sync::Arc;

use mellon_application::{
    ApprovalGateway, AuditRepository, Clock, GrantRegistry, GrantRepository, IdentityDirectory,
    NotificationChannel, RequestOrchestrator, RevocationScheduler, RiskClassifierAdapter,
    RiskOracle, SystemClock, TicketCatalog,
};
use mellon_core::{AppError, AppResult};
use mellon_infrastructure::{
    ConsoleNotificationChannel, CsvAuditRepository, InMemoryAuditRepository,
    InMemoryGrantRepository, InMemoryIdentityDirectory, OktaIdentityDirectory, OpenAiRiskOracle,
    PostgresAuditRepository, PostgresGrantRepository, SlackNotificationChannel,
    StaticTicketCatalog, UnavailableRiskOracle,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::api_config::{
    ApiConfig, ClassifierProviderConfig, DirectoryProviderConfig, NotificationProviderConfig,
    PersistenceConfig,
};
use crate::state::AppState;

pub async fn connect_database(database_url: &str) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    Ok(pool)
}

pub async fn build_app_state(config: &ApiConfig) -> AppResult<AppState> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let http_client = reqwest::Client::builder()
        .timeout(config.outbound_timeout)
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build http client: {error}")))?;

    let (audit_repository, grant_repository) = build_repositories(&config.persistence).await?;
    let directory = build_directory(&config.directory_provider, http_client.clone())?;
    let notification_channel =
        build_notification_channel(&config.notification_provider, http_client.clone());
    let oracle = build_risk_oracle(&config.classifier_provider, config, http_client);
    let ticket_catalog = build_ticket_catalog(config)?;

    let scheduler =
        RevocationScheduler::new(clock.clone()).with_idle_interval(config.scheduler_idle_interval);
    let grant_registry = GrantRegistry::new(
        directory,
        scheduler,
        audit_repository.clone(),
        grant_repository,
        clock.clone(),
    )
    .with_policy(config.grant_policy)
    .with_remote_call_timeout(config.outbound_timeout);

    let classifier = RiskClassifierAdapter::new(
        oracle,
        ticket_catalog,
        config.grant_policy,
        config.classifier_timeout,
    );
    let orchestrator = RequestOrchestrator::new(
        grant_registry.clone(),
        classifier,
        notification_channel,
        clock,
        config.intake_mode,
    )
    .with_notification_timeout(config.outbound_timeout);

    Ok(AppState {
        orchestrator,
        approval_gateway: ApprovalGateway::new(grant_registry.clone(), config.callback_deadline),
        grant_registry,
        audit_repository,
        principal_login_domain: config.principal_login_domain.clone(),
    })
}

async fn build_repositories(
    persistence: &PersistenceConfig,
) -> AppResult<(Arc<dyn AuditRepository>, Arc<dyn GrantRepository>)> {
    match persistence {
        PersistenceConfig::Memory { audit_csv_path } => {
            warn!("in-memory persistence: pending requests and active grants do not survive a restart");
            let audit_repository: Arc<dyn AuditRepository> = match audit_csv_path {
                Some(path) => {
                    info!(path = %path.display(), "audit ledger backed by CSV file");
                    Arc::new(CsvAuditRepository::open(path.clone())?)
                }
                None => Arc::new(InMemoryAuditRepository::new()),
            };
            Ok((audit_repository, Arc::new(InMemoryGrantRepository::new())))
        }
        PersistenceConfig::Postgres { database_url } => {
            let pool = connect_database(database_url).await?;
            Ok((
                Arc::new(PostgresAuditRepository::new(pool.clone())),
                Arc::new(PostgresGrantRepository::new(pool)),
            ))
        }
    }
}

fn build_directory(
    provider: &DirectoryProviderConfig,
    http_client: reqwest::Client,
) -> AppResult<Arc<dyn IdentityDirectory>> {
    Ok(match provider {
        DirectoryProviderConfig::Okta(okta) => Arc::new(OktaIdentityDirectory::new(
            http_client,
            okta.org_url.as_str(),
            okta.api_token.clone(),
            okta.group_id.clone(),
        )?),
        DirectoryProviderConfig::Memory => {
            warn!("identity directory is in-memory; no real group membership will change");
            Arc::new(InMemoryIdentityDirectory::new())
        }
    })
}

fn build_notification_channel(
    provider: &NotificationProviderConfig,
    http_client: reqwest::Client,
) -> Arc<dyn NotificationChannel> {
    match provider {
        NotificationProviderConfig::Slack(slack) => Arc::new(SlackNotificationChannel::new(
            http_client,
            slack.bot_token.clone(),
            slack.channel_id.clone(),
        )),
        NotificationProviderConfig::Console => Arc::new(ConsoleNotificationChannel::new()),
    }
}

fn build_risk_oracle(
    provider: &ClassifierProviderConfig,
    config: &ApiConfig,
    http_client: reqwest::Client,
) -> Arc<dyn RiskOracle> {
    match provider {
        ClassifierProviderConfig::OpenAi(openai) => {
            let mut oracle = OpenAiRiskOracle::new(http_client, openai.api_key.clone());
            if let Some(model) = openai.model.as_deref() {
                oracle = oracle.with_model(model);
            }
            if let Some(base_url) = openai.base_url.as_deref() {
                oracle = oracle.with_base_url(base_url);
            }
            Arc::new(oracle)
        }
        ClassifierProviderConfig::FailSafe => {
            info!(
                failsafe = %config.grant_policy.failsafe_duration(),
                "no risk classifier configured; every request is HIGH risk"
            );
            Arc::new(UnavailableRiskOracle::new())
        }
    }
}

fn build_ticket_catalog(config: &ApiConfig) -> AppResult<Arc<dyn TicketCatalog>> {
    let catalog = match config.ticket_catalog_path.as_ref() {
        Some(path) => StaticTicketCatalog::load(path)?,
        None => StaticTicketCatalog::empty(),
    };
    info!(tickets = catalog.len(), "ticket catalog loaded");

    Ok(Arc::new(catalog))
}
