//! DeadLetterJob entity — a post-mortem copy of a permanently failed job.

use crate::{DeadLetterId, Entity, Job, JobId, Priority, WorkerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Immutable record of a job whose retry budget was exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterJob {
    pub id: DeadLetterId,
    pub original_job_id: JobId,

    pub job_name: String,
    pub job_type: String,
    pub job_payload: Value,
    pub job_priority: Priority,

    pub failure_reason: String,
    /// Total attempts made, including the last — `retry_count + 1` at permanent failure.
    pub failure_count: u32,
    pub last_error: String,
    pub error_stack: Option<String>,

    pub worker_id: Option<WorkerId>,

    pub original_created_at: DateTime<Utc>,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetterJob {
    /// Builds a dead-letter entry from the job being permanently failed, per §4.2.
    #[must_use]
    pub fn from_job(job: &Job, failure_reason: String, error_stack: Option<String>) -> Self {
        Self {
            id: DeadLetterId::new(),
            original_job_id: job.id,
            job_name: job.name.clone(),
            job_type: job.job_type.clone(),
            job_payload: job.payload.clone(),
            job_priority: job.priority,
            failure_reason: failure_reason.clone(),
            failure_count: job.retry_count + 1,
            last_error: job.error.clone().unwrap_or(failure_reason),
            error_stack,
            worker_id: job.worker_id,
            original_created_at: job.created_at,
            failed_at: Utc::now(),
        }
    }

    /// Rebuilds a fresh, `PENDING` job from this dead-letter record, as done
    /// by an operator-initiated retry (`POST /dead-letter/:id/retry`).
    #[must_use]
    pub fn to_retry_job(&self) -> Job {
        Job::new(
            self.job_name.clone(),
            self.job_type.clone(),
            self.job_payload.clone(),
            self.job_priority,
        )
    }
}

impl Entity<DeadLetterId> for DeadLetterJob {
    fn id(&self) -> &DeadLetterId {
        &self.id
    }
}
