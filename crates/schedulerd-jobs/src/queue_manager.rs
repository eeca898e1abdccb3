//! Queue Manager (C3) — the Queue Index (C2) client.
//!
//! Four indexes: `ready` (priority-adjusted timestamp order), `delayed`
//! (absolute fire time), `processing` (job id → worker), `deadletter`
//! (failure time). See `schedulerd_jobs::redis::RedisQueueManager` for the
//! Redis-backed implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schedulerd_core::{JobId, Priority, SchedulerResult, WorkerId};

/// Cardinalities of the four Queue Manager indexes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub ready: u64,
    pub delayed: u64,
    pub processing: u64,
    pub deadletter: u64,
}

/// The Queue Manager (C3): the Queue Index (C2) client used by the Worker,
/// Job Processor, Schedule Executor, and Orphan Recovery.
///
/// All operations are expected to be individually atomic in the backing KV
/// engine; the Queue Manager provides no multi-step atomicity across calls.
#[async_trait]
pub trait QueueManager: Send + Sync {
    /// Adds `job_id` to the `ready` index with score `now + offset(priority)`.
    async fn enqueue(&self, job_id: JobId, priority: Priority) -> SchedulerResult<()>;

    /// Adds `job_id` to the `delayed` index with score `fire_at.millis`.
    async fn enqueue_delayed(&self, job_id: JobId, fire_at: DateTime<Utc>, priority: Priority) -> SchedulerResult<()>;

    /// Atomically pops the minimum-score element of `ready`. Non-blocking.
    async fn dequeue(&self) -> SchedulerResult<Option<JobId>>;

    /// Scans `delayed` for members due (`score <= now`), re-encodes each under
    /// the ready-priority formula, and moves it to `ready`. Returns the count
    /// promoted. Idempotent per member, safe under concurrent callers.
    async fn promote_delayed(&self) -> SchedulerResult<u64>;

    /// Writes `{worker_id, started_at=now}` into `processing`.
    async fn mark_processing(&self, job_id: JobId, worker_id: WorkerId) -> SchedulerResult<()>;

    /// Removes `job_id` from `processing`.
    async fn mark_completed(&self, job_id: JobId) -> SchedulerResult<()>;

    /// Removes `job_id` from `processing`, adds it to `delayed` with
    /// `fire_at = now + delay_ms`. Used for retries and orphan recovery.
    async fn requeue(&self, job_id: JobId, priority: Priority, delay_ms: u64) -> SchedulerResult<()>;

    /// Adds a structured member to `deadletter`, removes `job_id` from `processing`.
    async fn move_to_dlq(&self, job_id: JobId, reason: &str) -> SchedulerResult<()>;

    /// Removes the member(s) embedding `job_id` from `deadletter`.
    async fn remove_from_dlq(&self, job_id: JobId) -> SchedulerResult<()>;

    /// Returns the cardinalities of the four indexes.
    async fn stats(&self) -> SchedulerResult<QueueStats>;
}
