use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use mellon_core::{AppError, PrincipalIdentity};
use serde::{Deserialize, Serialize};

/// Lifecycle actions recorded in the audit ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    /// Principal added to the privileged group.
    Granted,
    /// Principal removed from the privileged group.
    Revoked,
    /// Request rejected by an approver.
    Denied,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "GRANTED",
            Self::Revoked => "REVOKED",
            Self::Denied => "DENIED",
        }
    }
}

impl FromStr for AuditAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "GRANTED" => Ok(Self::Granted),
            "REVOKED" => Ok(Self::Revoked),
            "DENIED" => Ok(Self::Denied),
            _ => Err(AppError::Validation(format!(
                "unknown audit action value '{value}'"
            ))),
        }
    }
}

impl Display for AuditAction {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Append-only audit record.
///
/// Field order after `sequence` is the stable external row layout:
/// `timestamp, principal, action, actor, detail`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the ledger's total order.
    pub sequence: u64,
    /// Time the entry was appended.
    pub timestamp: DateTime<Utc>,
    /// Principal whose entitlement changed.
    pub principal: PrincipalIdentity,
    /// Lifecycle action.
    pub action: AuditAction,
    /// Approver identity, or the scheduler for automatic revocations.
    pub actor: String,
    /// Free-form detail.
    pub detail: String,
}
