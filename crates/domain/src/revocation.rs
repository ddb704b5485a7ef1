use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{GrantId, RevocationJobId};

/// Status of a one-shot revocation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationJobStatus {
    /// Waiting for its fire time.
    Scheduled,
    /// Fired once; terminal.
    Fired,
    /// Cancelled before firing; terminal.
    Cancelled,
}

impl RevocationJobStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Fired => "fired",
            Self::Cancelled => "cancelled",
        }
    }
}

/// One-shot deferred revocation for a single grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationJob {
    job_id: RevocationJobId,
    grant_id: GrantId,
    fire_at: DateTime<Utc>,
    status: RevocationJobStatus,
}

impl RevocationJob {
    /// Creates a scheduled job.
    #[must_use]
    pub fn scheduled(grant_id: GrantId, fire_at: DateTime<Utc>) -> Self {
        Self {
            job_id: RevocationJobId::new(),
            grant_id,
            fire_at,
            status: RevocationJobStatus::Scheduled,
        }
    }

    /// Marks the job fired. Returns false when the job was not scheduled.
    pub fn mark_fired(&mut self) -> bool {
        self.transition(RevocationJobStatus::Fired)
    }

    /// Marks the job cancelled. Returns false when the job was not scheduled.
    pub fn mark_cancelled(&mut self) -> bool {
        self.transition(RevocationJobStatus::Cancelled)
    }

    fn transition(&mut self, next: RevocationJobStatus) -> bool {
        if self.status != RevocationJobStatus::Scheduled {
            return false;
        }

        self.status = next;
        true
    }

    /// Returns the job id.
    #[must_use]
    pub fn job_id(&self) -> RevocationJobId {
        self.job_id
    }

    /// Returns the grant this job revokes.
    #[must_use]
    pub fn grant_id(&self) -> GrantId {
        self.grant_id
    }

    /// Returns the fire time.
    #[must_use]
    pub fn fire_at(&self) -> DateTime<Utc> {
        self.fire_at
    }

    /// Returns the job status.
    #[must_use]
    pub fn status(&self) -> RevocationJobStatus {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{RevocationJob, RevocationJobStatus};
    use crate::GrantId;

    #[test]
    fn fired_job_cannot_be_cancelled() {
        let mut job = RevocationJob::scheduled(GrantId::new(), Utc::now());
        assert!(job.mark_fired());
        assert!(!job.mark_cancelled());
        assert_eq!(job.status(), RevocationJobStatus::Fired);
    }

    #[test]
    fn cancelled_job_never_fires() {
        let mut job = RevocationJob::scheduled(GrantId::new(), Utc::now());
        assert!(job.mark_cancelled());
        assert!(!job.mark_fired());
        assert_eq!(job.status(), RevocationJobStatus::Cancelled);
    }
}
