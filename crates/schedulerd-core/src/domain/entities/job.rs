//! Job entity — a single unit of work.

use crate::{Entity, JobId, JobStatus, Priority, ScheduleId, SchedulerError, WorkerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

/// A single unit of work tracked through its lifecycle in the Durable Store.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Job {
    pub id: JobId,

    #[validate(length(min = 1, max = 255))]
    pub name: String,

    /// Handler key; looked up in the job processor's handler registry.
    #[validate(length(min = 1, max = 128))]
    pub job_type: String,

    /// Opaque structured document, round-trips through JSON losslessly.
    pub payload: Value,

    pub priority: Priority,

    /// Earliest fire time. `None` means "ready immediately".
    pub scheduled_at: Option<DateTime<Utc>>,

    /// Back-reference to the `Schedule` that created this job, if any.
    pub schedule_id: Option<ScheduleId>,

    #[validate(range(min = 0))]
    pub max_retries: u32,

    #[validate(range(min = 100))]
    pub retry_delay_ms: u64,

    #[validate(range(min = 0))]
    pub retry_count: u32,

    pub status: JobStatus,

    /// Set while `PROCESSING`, cleared on completion, failure, or recovery.
    pub worker_id: Option<WorkerId>,

    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    /// Mutually exclusive with `error` at any terminal state.
    pub result: Option<Value>,
    pub error: Option<String>,

    pub webhook_url: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Creates a new `PENDING` job.
    #[must_use]
    pub fn new(name: String, job_type: String, payload: Value, priority: Priority) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            name,
            job_type,
            payload,
            priority,
            scheduled_at: None,
            schedule_id: None,
            max_retries: 3,
            retry_delay_ms: 1_000,
            retry_count: 0,
            status: JobStatus::Pending,
            worker_id: None,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            webhook_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a job produced by a firing `Schedule`, per §4.4 of the template rules.
    #[must_use]
    pub fn from_schedule(
        schedule_id: ScheduleId,
        schedule_name: &str,
        job_type: String,
        payload: Value,
        priority: Priority,
    ) -> Self {
        let mut job = Self::new(format!("{schedule_name} (scheduled)"), job_type, payload, priority);
        job.schedule_id = Some(schedule_id);
        job
    }

    /// Attempts the `status` transition required to place this job in the ready/delayed index.
    pub fn mark_queued(&mut self) -> Result<(), SchedulerError> {
        self.transition_to(JobStatus::Queued)
    }

    /// Marks the job as claimed by a worker and running.
    pub fn mark_processing(&mut self, worker_id: WorkerId) -> Result<(), SchedulerError> {
        self.transition_to(JobStatus::Processing)?;
        self.worker_id = Some(worker_id);
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Marks the job completed successfully.
    pub fn mark_completed(&mut self, result: Value) -> Result<(), SchedulerError> {
        self.transition_to(JobStatus::Completed)?;
        self.result = Some(result);
        self.error = None;
        self.worker_id = None;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Computes the exponential backoff delay (ms) for the next retry, capped at `max_delay_ms`.
    #[must_use]
    pub fn backoff_delay_ms(&self, max_delay_ms: u64) -> u64 {
        let factor = 2u64.saturating_pow(self.retry_count);
        self.retry_delay_ms.saturating_mul(factor).min(max_delay_ms)
    }

    /// Records a failed handler invocation, scheduling a retry if the budget allows.
    ///
    /// Returns `true` if the job was requeued for another attempt, `false` if it
    /// was routed to permanent failure (caller must then write a `DeadLetterJob`).
    pub fn record_failure(&mut self, error: String) -> Result<bool, SchedulerError> {
        if self.retry_count < self.max_retries {
            self.transition_to(JobStatus::Retrying)?;
            self.retry_count += 1;
            self.error = Some(error);
            self.worker_id = None;
            Ok(true)
        } else {
            self.transition_to(JobStatus::Failed)?;
            self.error = Some(error);
            self.result = None;
            self.completed_at = Some(Utc::now());
            Ok(false)
        }
    }

    /// Returns the job to `QUEUED` after a retry's backoff has elapsed.
    pub fn mark_requeued(&mut self) -> Result<(), SchedulerError> {
        self.transition_to(JobStatus::Queued)
    }

    /// Cancels the job if it is in a cancellable state.
    pub fn cancel(&mut self) -> Result<(), SchedulerError> {
        self.transition_to(JobStatus::Cancelled)
    }

    /// Reclaims a job abandoned by a dead worker (orphan recovery, §4.5).
    pub fn recover_from_dead_worker(&mut self) -> Result<(), SchedulerError> {
        if self.status != JobStatus::Processing {
            return Err(SchedulerError::conflict(format!(
                "cannot recover job {} from status {}, expected PROCESSING",
                self.id, self.status
            )));
        }
        self.status = JobStatus::Retrying;
        self.retry_count += 1;
        self.error = Some("Worker died — job recovered automatically".to_string());
        self.worker_id = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn transition_to(&mut self, next: JobStatus) -> Result<(), SchedulerError> {
        if !self.status.can_transition_to(next) {
            return Err(SchedulerError::conflict(format!(
                "illegal job transition from {} to {next} for job {}",
                self.status, self.id
            )));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl Entity<JobId> for Job {
    fn id(&self) -> &JobId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Job {
        Job::new("test".into(), "echo".into(), json!({"x": 1}), Priority::Normal)
    }

    #[test]
    fn happy_path_transitions() {
        let mut job = sample();
        job.mark_queued().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        job.mark_processing(WorkerId::new()).unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.worker_id.is_some());
        job.mark_completed(json!({"ok": true})).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.worker_id.is_none());
        assert!(job.result.is_some());
    }

    #[test]
    fn retry_then_exhaust() {
        let mut job = sample();
        job.max_retries = 1;
        job.mark_queued().unwrap();
        job.mark_processing(WorkerId::new()).unwrap();
        let requeued = job.record_failure("boom".into()).unwrap();
        assert!(requeued);
        assert_eq!(job.status, JobStatus::Retrying);
        assert_eq!(job.retry_count, 1);

        job.mark_requeued().unwrap();
        job.mark_processing(WorkerId::new()).unwrap();
        let requeued = job.record_failure("boom again".into()).unwrap();
        assert!(!requeued);
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[test]
    fn cannot_cancel_while_processing() {
        let mut job = sample();
        job.mark_queued().unwrap();
        job.mark_processing(WorkerId::new()).unwrap();
        assert!(job.cancel().is_err());
    }

    #[test]
    fn cancel_from_pending_queued_retrying() {
        let mut job = sample();
        assert!(job.cancel().is_ok());

        let mut job = sample();
        job.mark_queued().unwrap();
        assert!(job.cancel().is_ok());
    }

    #[test]
    fn backoff_is_exponential_and_capped() {
        let mut job = sample();
        job.retry_delay_ms = 1_000;
        assert_eq!(job.backoff_delay_ms(60_000), 1_000);
        job.retry_count = 3;
        assert_eq!(job.backoff_delay_ms(60_000), 8_000);
        job.retry_count = 20;
        assert_eq!(job.backoff_delay_ms(60_000), 60_000);
    }

    #[test]
    fn recover_from_dead_worker_requires_processing() {
        let mut job = sample();
        assert!(job.recover_from_dead_worker().is_err());

        job.mark_queued().unwrap();
        job.mark_processing(WorkerId::new()).unwrap();
        job.recover_from_dead_worker().unwrap();
        assert_eq!(job.status, JobStatus::Retrying);
        assert_eq!(job.retry_count, 1);
        assert!(job.worker_id.is_none());
    }
}
