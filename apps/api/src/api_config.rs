use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use mellon_application::{GrantPolicy, IntakeMode};
use mellon_core::AppError;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Debug, Clone)]
pub enum PersistenceConfig {
    Memory { audit_csv_path: Option<PathBuf> },
    Postgres { database_url: String },
}

#[derive(Debug, Clone)]
pub struct OpenAiRuntimeConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ClassifierProviderConfig {
    OpenAi(OpenAiRuntimeConfig),
    FailSafe,
}

#[derive(Debug, Clone)]
pub struct OktaRuntimeConfig {
    pub org_url: String,
    pub api_token: String,
    pub group_id: String,
}

#[derive(Debug, Clone)]
pub enum DirectoryProviderConfig {
    Okta(OktaRuntimeConfig),
    Memory,
}

#[derive(Debug, Clone)]
pub struct SlackRuntimeConfig {
    pub bot_token: String,
    pub channel_id: String,
}

#[derive(Debug, Clone)]
pub enum NotificationProviderConfig {
    Slack(SlackRuntimeConfig),
    Console,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub api_host: String,
    pub api_port: u16,
    pub persistence: PersistenceConfig,
    pub classifier_provider: ClassifierProviderConfig,
    pub directory_provider: DirectoryProviderConfig,
    pub notification_provider: NotificationProviderConfig,
    pub classifier_timeout: Duration,
    pub outbound_timeout: Duration,
    pub callback_deadline: Duration,
    pub scheduler_idle_interval: Duration,
    pub grant_policy: GrantPolicy,
    pub intake_mode: IntakeMode,
    pub principal_login_domain: Option<String>,
    pub ticket_catalog_path: Option<PathBuf>,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = parsed_env("API_PORT", 3000_u16)?;

        let persistence = match env::var("PERSISTENCE_BACKEND")
            .unwrap_or_else(|_| "memory".to_owned())
            .as_str()
        {
            "memory" => PersistenceConfig::Memory {
                audit_csv_path: match env::var("AUDIT_CSV_PATH") {
                    Ok(value) if value.trim().is_empty() => None,
                    Ok(value) => Some(PathBuf::from(value)),
                    Err(_) => Some(PathBuf::from("audit_log.csv")),
                },
            },
            "postgres" => PersistenceConfig::Postgres {
                database_url: required_non_empty_env("DATABASE_URL")?,
            },
            other => {
                return Err(AppError::Validation(format!(
                    "PERSISTENCE_BACKEND must be either 'memory' or 'postgres', got '{other}'"
                )));
            }
        };

        let classifier_provider = match env::var("CLASSIFIER_PROVIDER")
            .unwrap_or_else(|_| "failsafe".to_owned())
            .as_str()
        {
            "openai" => {
                let base_url = optional_non_empty_env("OPENAI_BASE_URL");
                if let Some(base_url) = base_url.as_deref() {
                    validate_url("OPENAI_BASE_URL", base_url)?;
                }
                ClassifierProviderConfig::OpenAi(OpenAiRuntimeConfig {
                    api_key: required_non_empty_env("OPENAI_API_KEY")?,
                    base_url,
                    model: optional_non_empty_env("OPENAI_MODEL"),
                })
            }
            "failsafe" => ClassifierProviderConfig::FailSafe,
            other => {
                return Err(AppError::Validation(format!(
                    "CLASSIFIER_PROVIDER must be either 'openai' or 'failsafe', got '{other}'"
                )));
            }
        };

        let directory_provider = match env::var("DIRECTORY_PROVIDER")
            .unwrap_or_else(|_| "memory".to_owned())
            .as_str()
        {
            "okta" => {
                let org_url = required_non_empty_env("OKTA_ORG_URL")?;
                validate_url("OKTA_ORG_URL", &org_url)?;
                DirectoryProviderConfig::Okta(OktaRuntimeConfig {
                    org_url,
                    api_token: required_non_empty_env("OKTA_API_TOKEN")?,
                    group_id: required_non_empty_env("TARGET_GROUP_ID")?,
                })
            }
            "memory" => DirectoryProviderConfig::Memory,
            other => {
                return Err(AppError::Validation(format!(
                    "DIRECTORY_PROVIDER must be either 'okta' or 'memory', got '{other}'"
                )));
            }
        };

        let notification_provider = match env::var("NOTIFICATION_PROVIDER")
            .unwrap_or_else(|_| "console".to_owned())
            .as_str()
        {
            "slack" => NotificationProviderConfig::Slack(SlackRuntimeConfig {
                bot_token: required_non_empty_env("SLACK_BOT_TOKEN")?,
                channel_id: required_non_empty_env("SLACK_CHANNEL_ID")?,
            }),
            "console" => NotificationProviderConfig::Console,
            other => {
                return Err(AppError::Validation(format!(
                    "NOTIFICATION_PROVIDER must be either 'slack' or 'console', got '{other}'"
                )));
            }
        };

        let grant_policy = GrantPolicy::from_minutes(
            parsed_env("GRANT_DEFAULT_MINUTES", 30_i64)?,
            parsed_env("GRANT_FAILSAFE_MINUTES", 15_i64)?,
            parsed_env("GRANT_MAX_MINUTES", 240_i64)?,
        )?;

        let intake_mode = optional_non_empty_env("INTAKE_MODE")
            .map(|value| IntakeMode::from_str(value.as_str()))
            .transpose()?
            .unwrap_or(IntakeMode::Background);

        Ok(Self {
            migrate_only,
            api_host,
            api_port,
            persistence,
            classifier_provider,
            directory_provider,
            notification_provider,
            classifier_timeout: seconds_env("CLASSIFIER_TIMEOUT_SECONDS", 20)?,
            outbound_timeout: seconds_env("OUTBOUND_TIMEOUT_SECONDS", 10)?,
            callback_deadline: seconds_env("CALLBACK_DEADLINE_SECONDS", 2)?,
            scheduler_idle_interval: seconds_env("SCHEDULER_IDLE_SECONDS", 30)?,
            grant_policy,
            intake_mode,
            principal_login_domain: optional_non_empty_env("PRINCIPAL_LOGIN_DOMAIN"),
            ticket_catalog_path: optional_non_empty_env("TICKET_CATALOG_PATH").map(PathBuf::from),
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn optional_non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parsed_env<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional_non_empty_env(name)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|error| AppError::Validation(format!("invalid {name}: {error}")))
        })
        .transpose()
        .map(|value| value.unwrap_or(default))
}

fn seconds_env(name: &str, default: u64) -> Result<Duration, AppError> {
    let seconds = parsed_env(name, default)?;
    if seconds == 0 {
        return Err(AppError::Validation(format!("{name} must be positive")));
    }

    Ok(Duration::from_secs(seconds))
}

fn validate_url(name: &str, value: &str) -> Result<(), AppError> {
    let url =
        Url::parse(value).map_err(|error| AppError::Validation(format!("invalid {name}: {error}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::Validation(format!(
            "{name} must use http or https, got '{}'",
            url.scheme()
        )));
    }

    Ok(())
}
