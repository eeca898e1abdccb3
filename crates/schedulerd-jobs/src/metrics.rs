//! Prometheus metrics for the job scheduler service.
//!
//! There is no per-queue-name concept in this service — one `ready`/
//! `delayed`/`processing`/`deadletter` set of Queue Manager indexes serves
//! every job — so labels are keyed by `job_type` instead of `queue`.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Metric names for the job scheduler.
pub mod names {
    /// Total jobs enqueued.
    pub const JOBS_ENQUEUED_TOTAL: &str = "schedulerd_jobs_enqueued_total";
    /// Total jobs dequeued for processing.
    pub const JOBS_DEQUEUED_TOTAL: &str = "schedulerd_jobs_dequeued_total";
    /// Total jobs completed successfully.
    pub const JOBS_COMPLETED_TOTAL: &str = "schedulerd_jobs_completed_total";
    /// Total jobs failed (a single attempt, not necessarily terminal).
    pub const JOBS_FAILED_TOTAL: &str = "schedulerd_jobs_failed_total";
    /// Total jobs retried.
    pub const JOBS_RETRIED_TOTAL: &str = "schedulerd_jobs_retried_total";
    /// Total jobs sent to the dead-letter queue.
    pub const JOBS_DEAD_LETTERED_TOTAL: &str = "schedulerd_jobs_dead_lettered_total";
    /// Total jobs recovered from a dead worker by orphan recovery.
    pub const JOBS_RECOVERED_TOTAL: &str = "schedulerd_jobs_recovered_total";

    /// Queue Manager index cardinalities.
    pub const QUEUE_READY: &str = "schedulerd_queue_ready";
    pub const QUEUE_DELAYED: &str = "schedulerd_queue_delayed";
    pub const QUEUE_PROCESSING: &str = "schedulerd_queue_processing";
    pub const QUEUE_DEAD_LETTER: &str = "schedulerd_queue_dead_letter";

    /// Job execution duration in seconds.
    pub const JOB_DURATION_SECONDS: &str = "schedulerd_job_duration_seconds";

    /// Active worker process gauge.
    pub const WORKERS_ACTIVE: &str = "schedulerd_workers_active";
    /// Worker slot concurrency gauge.
    pub const WORKERS_CONCURRENCY: &str = "schedulerd_workers_concurrency";

    /// Whether this Schedule Executor instance holds the leader lease.
    pub const SCHEDULER_IS_LEADER: &str = "schedulerd_scheduler_is_leader";
    /// Total schedule firings.
    pub const SCHEDULER_JOBS_TRIGGERED: &str = "schedulerd_scheduler_jobs_triggered_total";

    /// Total webhook delivery attempts.
    pub const WEBHOOK_ATTEMPTS_TOTAL: &str = "schedulerd_webhook_attempts_total";
    /// Total webhook deliveries exhausting their retry budget.
    pub const WEBHOOK_FAILED_TOTAL: &str = "schedulerd_webhook_failed_total";
    /// Webhook delivery attempt duration in seconds.
    pub const WEBHOOK_DURATION_SECONDS: &str = "schedulerd_webhook_duration_seconds";

    /// Redis operation duration in seconds.
    pub const REDIS_OPERATION_DURATION: &str = "schedulerd_redis_operation_duration_seconds";
}

/// Registers descriptions for every metric above; call once at startup.
pub fn register_metrics() {
    describe_counter!(names::JOBS_ENQUEUED_TOTAL, "Total number of jobs enqueued");
    describe_counter!(names::JOBS_DEQUEUED_TOTAL, "Total number of jobs dequeued for processing");
    describe_counter!(names::JOBS_COMPLETED_TOTAL, "Total number of jobs completed successfully");
    describe_counter!(names::JOBS_FAILED_TOTAL, "Total number of job attempts that failed");
    describe_counter!(names::JOBS_RETRIED_TOTAL, "Total number of job retries scheduled");
    describe_counter!(names::JOBS_DEAD_LETTERED_TOTAL, "Total number of jobs sent to the dead-letter queue");
    describe_counter!(names::JOBS_RECOVERED_TOTAL, "Total number of jobs recovered from a dead worker");

    describe_gauge!(names::QUEUE_READY, "Current size of the ready index");
    describe_gauge!(names::QUEUE_DELAYED, "Current size of the delayed index");
    describe_gauge!(names::QUEUE_PROCESSING, "Current size of the processing index");
    describe_gauge!(names::QUEUE_DEAD_LETTER, "Current size of the dead-letter index");

    describe_histogram!(names::JOB_DURATION_SECONDS, "Job execution duration in seconds");

    describe_gauge!(names::WORKERS_ACTIVE, "Number of registered worker processes");
    describe_gauge!(names::WORKERS_CONCURRENCY, "Configured processing slots per worker");

    describe_gauge!(names::SCHEDULER_IS_LEADER, "Whether this instance holds the scheduler leader lease (1) or not (0)");
    describe_counter!(names::SCHEDULER_JOBS_TRIGGERED, "Total number of schedules fired");

    describe_counter!(names::WEBHOOK_ATTEMPTS_TOTAL, "Total number of webhook delivery attempts");
    describe_counter!(names::WEBHOOK_FAILED_TOTAL, "Total number of webhook deliveries that exhausted their retry budget");
    describe_histogram!(names::WEBHOOK_DURATION_SECONDS, "Webhook delivery attempt duration in seconds");

    describe_histogram!(names::REDIS_OPERATION_DURATION, "Redis operation duration in seconds");
}

/// Job lifecycle metrics, labeled by `job_type`.
#[derive(Clone)]
pub struct JobMetrics;

impl JobMetrics {
    pub fn job_enqueued(job_type: &str, priority: &str) {
        counter!(names::JOBS_ENQUEUED_TOTAL, "job_type" => job_type.to_string(), "priority" => priority.to_string())
            .increment(1);
    }

    pub fn job_dequeued(job_type: &str) {
        counter!(names::JOBS_DEQUEUED_TOTAL, "job_type" => job_type.to_string()).increment(1);
    }

    pub fn job_completed(job_type: &str, duration: Duration) {
        counter!(names::JOBS_COMPLETED_TOTAL, "job_type" => job_type.to_string()).increment(1);
        histogram!(names::JOB_DURATION_SECONDS, "job_type" => job_type.to_string(), "status" => "completed")
            .record(duration.as_secs_f64());
    }

    pub fn job_failed(job_type: &str, duration: Duration) {
        counter!(names::JOBS_FAILED_TOTAL, "job_type" => job_type.to_string()).increment(1);
        histogram!(names::JOB_DURATION_SECONDS, "job_type" => job_type.to_string(), "status" => "failed")
            .record(duration.as_secs_f64());
    }

    pub fn job_retried(job_type: &str, retry_count: u32) {
        counter!(names::JOBS_RETRIED_TOTAL, "job_type" => job_type.to_string(), "retry_count" => retry_count.to_string())
            .increment(1);
    }

    pub fn job_dead_lettered(job_type: &str) {
        counter!(names::JOBS_DEAD_LETTERED_TOTAL, "job_type" => job_type.to_string()).increment(1);
    }

    pub fn job_recovered(job_type: &str) {
        counter!(names::JOBS_RECOVERED_TOTAL, "job_type" => job_type.to_string()).increment(1);
    }

    /// Updates the four Queue Manager index gauges from a [`crate::QueueStats`] snapshot.
    pub fn update_queue_sizes(ready: u64, delayed: u64, processing: u64, deadletter: u64) {
        gauge!(names::QUEUE_READY).set(ready as f64);
        gauge!(names::QUEUE_DELAYED).set(delayed as f64);
        gauge!(names::QUEUE_PROCESSING).set(processing as f64);
        gauge!(names::QUEUE_DEAD_LETTER).set(deadletter as f64);
    }
}

/// Worker (C5) fleet metrics.
#[derive(Clone)]
pub struct WorkerMetrics;

impl WorkerMetrics {
    pub fn update_workers(active: u64, concurrency: u32) {
        gauge!(names::WORKERS_ACTIVE).set(active as f64);
        gauge!(names::WORKERS_CONCURRENCY).set(f64::from(concurrency));
    }
}

/// Schedule Executor (C6) metrics.
#[derive(Clone)]
pub struct SchedulerMetrics;

impl SchedulerMetrics {
    pub fn update_leader_status(is_leader: bool) {
        gauge!(names::SCHEDULER_IS_LEADER).set(if is_leader { 1.0 } else { 0.0 });
    }

    pub fn job_triggered(schedule_name: &str) {
        counter!(names::SCHEDULER_JOBS_TRIGGERED, "schedule_name" => schedule_name.to_string()).increment(1);
    }
}

/// Webhook Pipeline (C8) metrics.
#[derive(Clone)]
pub struct WebhookMetrics;

impl WebhookMetrics {
    pub fn attempt(job_type: &str, duration: Duration) {
        counter!(names::WEBHOOK_ATTEMPTS_TOTAL, "job_type" => job_type.to_string()).increment(1);
        histogram!(names::WEBHOOK_DURATION_SECONDS, "job_type" => job_type.to_string()).record(duration.as_secs_f64());
    }

    pub fn exhausted(job_type: &str) {
        counter!(names::WEBHOOK_FAILED_TOTAL, "job_type" => job_type.to_string()).increment(1);
    }
}

/// Redis (Queue Manager) operation metrics.
#[derive(Clone)]
pub struct RedisMetrics;

impl RedisMetrics {
    pub fn operation_duration(operation: &str, duration: Duration) {
        histogram!(names::REDIS_OPERATION_DURATION, "operation" => operation.to_string()).record(duration.as_secs_f64());
    }
}
