use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use mellon_core::{AppError, AppResult};
use mellon_domain::{GrantId, RevocationJob, RevocationJobId, RevocationJobStatus};
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::keyed_slots::KeyedSlots;

mod dispatch;

/// Callback invoked when a revocation job fires.
#[async_trait]
pub trait RevocationHandler: Send + Sync {
    /// Revokes an expired grant.
    async fn revoke_expired(&self, grant_id: GrantId) -> AppResult<()>;
}

/// Result of cancelling a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job will never fire.
    Cancelled,
    /// The job had already fired.
    AlreadyFired,
    /// The job had already been cancelled.
    AlreadyCancelled,
}

/// Result of firing a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// This call fired the job and invoked the handler.
    Fired {
        /// Grant the handler was invoked for.
        grant_id: GrantId,
        /// Whether the handler reported success.
        handler_succeeded: bool,
    },
    /// Another call fired the job first.
    AlreadyFired,
    /// The job was cancelled.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueEntry {
    fire_at: DateTime<Utc>,
    sequence: u64,
    job_id: RevocationJobId,
}

/// Time-ordered queue of one-shot revocation jobs.
///
/// Each job fires at most once. Cancel and fire decide the job status under
/// the job's own lock, so exactly one of them wins. Cancelled jobs stay in the
/// heap and are skipped when popped. Fired and cancelled jobs are kept for
/// `settled_retention` past their fire time, then pruned by the dispatch loop.
#[derive(Clone)]
pub struct RevocationScheduler {
    clock: Arc<dyn Clock>,
    queue: Arc<Mutex<BinaryHeap<Reverse<QueueEntry>>>>,
    jobs: Arc<KeyedSlots<RevocationJobId, RevocationJob>>,
    sequence: Arc<AtomicU64>,
    pending: Arc<AtomicUsize>,
    wake: Arc<Notify>,
    idle_interval: Duration,
    settled_retention: Duration,
}

impl RevocationScheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            queue: Arc::new(Mutex::new(BinaryHeap::new())),
            jobs: Arc::new(KeyedSlots::new()),
            sequence: Arc::new(AtomicU64::new(0)),
            pending: Arc::new(AtomicUsize::new(0)),
            wake: Arc::new(Notify::new()),
            idle_interval: Duration::from_secs(30),
            settled_retention: Duration::from_secs(60 * 60),
        }
    }

    /// Sets how long fired and cancelled jobs stay queryable after their fire time.
    #[must_use]
    pub fn with_settled_retention(mut self, settled_retention: Duration) -> Self {
        self.settled_retention = settled_retention;
        self
    }

    /// Sets the longest time the dispatch loop sleeps before re-reading the clock.
    #[must_use]
    pub fn with_idle_interval(mut self, idle_interval: Duration) -> Self {
        self.idle_interval = idle_interval;
        self
    }

    /// Registers a job that fires at `fire_at`.
    pub async fn schedule(&self, grant_id: GrantId, fire_at: DateTime<Utc>) -> RevocationJobId {
        let job = RevocationJob::scheduled(grant_id, fire_at);
        let job_id = job.job_id();
        if self.jobs.insert(job_id, job).await {
            self.pending.fetch_add(1, Ordering::Relaxed);
        }

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.queue.lock().await.push(Reverse(QueueEntry {
            fire_at,
            sequence,
            job_id,
        }));
        self.wake.notify_one();

        debug!(job_id = %job_id, grant_id = %grant_id, fire_at = %fire_at, "revocation scheduled");
        job_id
    }

    /// Cancels a scheduled job.
    pub async fn cancel(&self, job_id: RevocationJobId) -> AppResult<CancelOutcome> {
        let job = self.job_slot(job_id).await?;
        let mut job = job.lock().await;
        if job.mark_cancelled() {
            self.pending.fetch_sub(1, Ordering::Relaxed);
            debug!(job_id = %job_id, "revocation cancelled");
            return Ok(CancelOutcome::Cancelled);
        }

        Ok(match job.status() {
            RevocationJobStatus::Fired => CancelOutcome::AlreadyFired,
            RevocationJobStatus::Cancelled | RevocationJobStatus::Scheduled => {
                CancelOutcome::AlreadyCancelled
            }
        })
    }

    /// Fires a job now, regardless of its fire time.
    ///
    /// The handler runs at most once per job even under concurrent calls.
    /// Handler failures are logged and leave the job fired.
    pub async fn fire(
        &self,
        job_id: RevocationJobId,
        handler: &dyn RevocationHandler,
    ) -> AppResult<FireOutcome> {
        let job = self.job_slot(job_id).await?;
        let grant_id = {
            let mut job = job.lock().await;
            if !job.mark_fired() {
                return Ok(match job.status() {
                    RevocationJobStatus::Cancelled => FireOutcome::Cancelled,
                    RevocationJobStatus::Fired | RevocationJobStatus::Scheduled => {
                        FireOutcome::AlreadyFired
                    }
                });
            }
            self.pending.fetch_sub(1, Ordering::Relaxed);
            job.grant_id()
        };

        let handler_succeeded = match handler.revoke_expired(grant_id).await {
            Ok(()) => {
                info!(job_id = %job_id, grant_id = %grant_id, "revocation fired");
                true
            }
            Err(error) => {
                warn!(
                    job_id = %job_id,
                    grant_id = %grant_id,
                    error = %error,
                    "revocation handler failed"
                );
                false
            }
        };

        Ok(FireOutcome::Fired {
            grant_id,
            handler_succeeded,
        })
    }

    /// Returns a snapshot of one job.
    pub async fn job(&self, job_id: RevocationJobId) -> AppResult<RevocationJob> {
        let job = self.job_slot(job_id).await?;
        let snapshot = job.lock().await.clone();
        Ok(snapshot)
    }

    /// Counts jobs still waiting to fire.
    pub async fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    /// Drops fired and cancelled jobs whose fire time is older than the
    /// retention window. Returns how many were dropped.
    pub async fn prune_settled(&self) -> usize {
        let retention = TimeDelta::from_std(self.settled_retention).unwrap_or(TimeDelta::MAX);
        let Some(cutoff) = self.clock.now().checked_sub_signed(retention) else {
            return 0;
        };

        let pruned = self
            .jobs
            .remove_where(|job| {
                job.status() != RevocationJobStatus::Scheduled && job.fire_at() < cutoff
            })
            .await;
        if pruned > 0 {
            debug!(pruned = pruned, "settled revocation jobs pruned");
        }
        pruned
    }

    /// Returns the earliest queued fire time, including lazily skipped entries.
    pub async fn next_fire_at(&self) -> Option<DateTime<Utc>> {
        self.queue
            .lock()
            .await
            .peek()
            .map(|Reverse(entry)| entry.fire_at)
    }

    async fn job_slot(&self, job_id: RevocationJobId) -> AppResult<Arc<Mutex<RevocationJob>>> {
        self.jobs.get(&job_id).await.ok_or_else(|| {
            AppError::NotFound(format!("revocation job '{job_id}' does not exist"))
        })
    }

    async fn take_due(&self, now: DateTime<Utc>) -> Vec<RevocationJobId> {
        let mut queue = self.queue.lock().await;
        let mut due = Vec::new();
        while queue
            .peek()
            .is_some_and(|Reverse(entry)| entry.fire_at <= now)
        {
            if let Some(Reverse(entry)) = queue.pop() {
                due.push(entry.job_id);
            }
        }
        due
    }
}
