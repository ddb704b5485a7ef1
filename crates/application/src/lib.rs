//! Application services and ports for the access-grant lifecycle.

#![forbid(unsafe_code)]

mod approval_gateway;
mod audit_ports;
mod clock;
mod directory_ports;
mod grant_policy;
mod grant_ports;
mod grant_registry;
mod keyed_slots;
mod notification_ports;
mod request_orchestrator;
mod revocation_scheduler;
mod risk_classifier;
mod risk_ports;

#[cfg(test)]
mod test_support;

pub use approval_gateway::{ApprovalGateway, CallbackReply, InteractionCallback};
pub use audit_ports::{AuditEvent, AuditQuery, AuditRepository};
pub use clock::{Clock, SystemClock};
pub use directory_ports::{DirectoryUserId, IdentityDirectory};
pub use grant_policy::GrantPolicy;
pub use grant_ports::{GrantQuery, GrantRepository, RegistrySnapshot, StoredRequest};
pub use grant_registry::{
    ApprovalOutcome, DenialOutcome, EXPIRY_REASON, GrantRegistry, REVOCATION_ACTOR,
    RestoreSummary, RevocationOutcome,
};
pub use notification_ports::{AccessRequestNotification, CallbackAction, NotificationChannel};
pub use request_orchestrator::{IntakeMode, RequestOrchestrator};
pub use revocation_scheduler::{
    CancelOutcome, FireOutcome, RevocationHandler, RevocationScheduler,
};
pub use risk_classifier::RiskClassifierAdapter;
pub use risk_ports::{
    RiskAssessment, RiskAssessmentRequest, RiskOracle, TicketCatalog, TicketContext,
};
