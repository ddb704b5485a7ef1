//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod console_notification_channel;
mod csv_audit_repository;
mod in_memory_audit_repository;
mod in_memory_grant_repository;
mod in_memory_identity_directory;
mod okta_identity_directory;
mod openai_risk_oracle;
mod postgres_audit_repository;
mod postgres_grant_repository;
mod slack_notification_channel;
mod static_ticket_catalog;
mod unavailable_risk_oracle;

pub use console_notification_channel::ConsoleNotificationChannel;
pub use csv_audit_repository::CsvAuditRepository;
pub use in_memory_audit_repository::InMemoryAuditRepository;
pub use in_memory_grant_repository::InMemoryGrantRepository;
pub use in_memory_identity_directory::InMemoryIdentityDirectory;
pub use okta_identity_directory::OktaIdentityDirectory;
pub use openai_risk_oracle::OpenAiRiskOracle;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_grant_repository::PostgresGrantRepository;
pub use slack_notification_channel::SlackNotificationChannel;
pub use static_ticket_catalog::StaticTicketCatalog;
pub use unavailable_risk_oracle::UnavailableRiskOracle;
