use std::sync::Arc;

use mellon_application::{ApprovalGateway, AuditRepository, GrantRegistry, RequestOrchestrator};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: RequestOrchestrator,
    pub approval_gateway: ApprovalGateway,
    pub grant_registry: GrantRegistry,
    pub audit_repository: Arc<dyn AuditRepository>,
    pub principal_login_domain: Option<String>,
}
