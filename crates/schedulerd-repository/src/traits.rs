//! Repository trait definitions — one per Durable Store (C1) entity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schedulerd_core::{
    DeadLetterId, DeadLetterJob, Interface, Job, JobId, JobStatus, Page, PageRequest, Schedule,
    ScheduleId, SchedulerResult, WebhookEvent, WebhookEventId, Worker, WorkerId,
};

/// Durable Store access for jobs.
#[async_trait]
pub trait JobRepository: Interface + Send + Sync {
    /// Finds a job by ID.
    async fn find_by_id(&self, id: JobId) -> SchedulerResult<Option<Job>>;

    /// Lists jobs with pagination, most recently created first.
    async fn find_all(&self, page: PageRequest) -> SchedulerResult<Page<Job>>;

    /// Lists jobs in a given status with pagination.
    async fn find_by_status(&self, status: JobStatus, page: PageRequest) -> SchedulerResult<Page<Job>>;

    /// Finds jobs `PROCESSING` and claimed by one of the given workers — the
    /// predicate orphan recovery (C7) pushes into the `WHERE` clause per §9.
    async fn find_processing_by_worker_ids(&self, worker_ids: &[WorkerId]) -> SchedulerResult<Vec<Job>>;

    /// Inserts a new job row.
    async fn save(&self, job: &Job) -> SchedulerResult<Job>;

    /// Persists a job's mutable state (status, retry count, timestamps, ...).
    async fn update(&self, job: &Job) -> SchedulerResult<Job>;

    /// Persists `job`'s mutable state only if it is still `PROCESSING` and
    /// owned by `expected_worker_id` — the compare-and-set guard against a
    /// late finisher racing orphan recovery's reclaim, per §4.5. Returns
    /// `false` without writing anything if the guard does not hold.
    async fn update_if_owned(&self, job: &Job, expected_worker_id: WorkerId) -> SchedulerResult<bool>;

    /// Counts jobs in a given status.
    async fn count_by_status(&self, status: JobStatus) -> SchedulerResult<u64>;
}

/// Durable Store access for recurring schedule templates.
#[async_trait]
pub trait ScheduleRepository: Interface + Send + Sync {
    /// Finds a schedule by ID.
    async fn find_by_id(&self, id: ScheduleId) -> SchedulerResult<Option<Schedule>>;

    /// Lists schedules with pagination.
    async fn find_all(&self, page: PageRequest) -> SchedulerResult<Page<Schedule>>;

    /// Finds enabled schedules whose `next_run_at` is at or before `now` — the
    /// due-schedule scan the Schedule Executor (C6) polls on.
    async fn find_due(&self, now: DateTime<Utc>) -> SchedulerResult<Vec<Schedule>>;

    /// Inserts a new schedule.
    async fn save(&self, schedule: &Schedule) -> SchedulerResult<Schedule>;

    /// Persists schedule changes (enable/disable, firing bookkeeping).
    async fn update(&self, schedule: &Schedule) -> SchedulerResult<Schedule>;

    /// Deletes a schedule by ID.
    async fn delete(&self, id: ScheduleId) -> SchedulerResult<bool>;
}

/// Durable Store access for worker registrations.
#[async_trait]
pub trait WorkerRepository: Interface + Send + Sync {
    /// Finds a worker by ID.
    async fn find_by_id(&self, id: WorkerId) -> SchedulerResult<Option<Worker>>;

    /// Lists workers with pagination.
    async fn find_all(&self, page: PageRequest) -> SchedulerResult<Page<Worker>>;

    /// Finds active workers whose heartbeat is older than `stale_threshold_ms` —
    /// the liveness scan orphan recovery (C7) drives off of.
    async fn find_stale(&self, now: DateTime<Utc>, stale_threshold_ms: i64) -> SchedulerResult<Vec<Worker>>;

    /// Registers a new worker.
    async fn save(&self, worker: &Worker) -> SchedulerResult<Worker>;

    /// Persists worker state (heartbeat, job counters, status).
    async fn update(&self, worker: &Worker) -> SchedulerResult<Worker>;

    /// Counts workers not yet marked `stopped` — the readiness check's
    /// "at least one active worker" signal per §6.
    async fn count_active(&self) -> SchedulerResult<u64>;
}

/// Durable Store access for permanently failed jobs.
#[async_trait]
pub trait DeadLetterRepository: Interface + Send + Sync {
    /// Finds a dead-letter entry by ID.
    async fn find_by_id(&self, id: DeadLetterId) -> SchedulerResult<Option<DeadLetterJob>>;

    /// Lists dead-letter entries with pagination, most recently failed first.
    async fn find_all(&self, page: PageRequest) -> SchedulerResult<Page<DeadLetterJob>>;

    /// Inserts a dead-letter entry.
    async fn save(&self, entry: &DeadLetterJob) -> SchedulerResult<DeadLetterJob>;

    /// Deletes a dead-letter entry by ID (operator-initiated retry removes it).
    async fn delete(&self, id: DeadLetterId) -> SchedulerResult<bool>;

    /// Deletes entries that failed before `before` — the retention sweep
    /// driven by `queue.dead_letter_retention_days`.
    async fn delete_older_than(&self, before: DateTime<Utc>) -> SchedulerResult<u64>;
}

/// Durable Store access for the webhook delivery outbox.
#[async_trait]
pub trait WebhookEventRepository: Interface + Send + Sync {
    /// Finds a webhook event by ID.
    async fn find_by_id(&self, id: WebhookEventId) -> SchedulerResult<Option<WebhookEvent>>;

    /// Lists webhook events with pagination.
    async fn find_all(&self, page: PageRequest) -> SchedulerResult<Page<WebhookEvent>>;

    /// Finds events not yet in a terminal state with attempts remaining — the
    /// coarse pushdown the webhook retry loop (C8) narrows with
    /// [`WebhookEvent::is_due_for_retry`](schedulerd_core::WebhookEvent::is_due_for_retry).
    async fn find_retry_candidates(&self) -> SchedulerResult<Vec<WebhookEvent>>;

    /// Inserts a new outbox entry.
    async fn save(&self, event: &WebhookEvent) -> SchedulerResult<WebhookEvent>;

    /// Persists delivery attempt outcome.
    async fn update(&self, event: &WebhookEvent) -> SchedulerResult<WebhookEvent>;
}
