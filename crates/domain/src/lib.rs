//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod audit;
mod grant;
mod ids;
mod request;
mod revocation;

pub use audit::{AuditAction, AuditEntry};
pub use grant::{Grant, GrantRecord, GrantState};
pub use ids::{GrantId, RequestId, RevocationJobId};
pub use request::{AccessRequest, FAIL_SAFE_RATIONALE, GrantDuration, RiskDecision, RiskLevel};
pub use revocation::{RevocationJob, RevocationJobStatus};
