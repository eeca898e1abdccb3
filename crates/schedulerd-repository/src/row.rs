//! Shared helpers for converting Postgres rows into domain value objects.
//!
//! Status and priority columns are stored as `TEXT`; parsing is centralized
//! here rather than duplicated per repository.

use schedulerd_core::{JobStatus, Priority, SchedulerError, WebhookStatus, WorkerStatus};

pub fn parse_priority(value: &str) -> Result<Priority, SchedulerError> {
    match value {
        "critical" => Ok(Priority::Critical),
        "high" => Ok(Priority::High),
        "normal" => Ok(Priority::Normal),
        "low" => Ok(Priority::Low),
        other => Err(SchedulerError::internal(format!("unknown priority in row: {other}"))),
    }
}

pub fn parse_job_status(value: &str) -> Result<JobStatus, SchedulerError> {
    match value {
        "pending" => Ok(JobStatus::Pending),
        "queued" => Ok(JobStatus::Queued),
        "processing" => Ok(JobStatus::Processing),
        "completed" => Ok(JobStatus::Completed),
        "retrying" => Ok(JobStatus::Retrying),
        "failed" => Ok(JobStatus::Failed),
        "cancelled" => Ok(JobStatus::Cancelled),
        other => Err(SchedulerError::internal(format!("unknown job status in row: {other}"))),
    }
}

pub fn parse_worker_status(value: &str) -> Result<WorkerStatus, SchedulerError> {
    match value {
        "active" => Ok(WorkerStatus::Active),
        "idle" => Ok(WorkerStatus::Idle),
        "stopped" => Ok(WorkerStatus::Stopped),
        other => Err(SchedulerError::internal(format!("unknown worker status in row: {other}"))),
    }
}

pub fn parse_webhook_status(value: &str) -> Result<WebhookStatus, SchedulerError> {
    match value {
        "pending" => Ok(WebhookStatus::Pending),
        "retrying" => Ok(WebhookStatus::Retrying),
        "success" => Ok(WebhookStatus::Success),
        "failed" => Ok(WebhookStatus::Failed),
        other => Err(SchedulerError::internal(format!("unknown webhook status in row: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_priority() {
        for p in Priority::all() {
            assert_eq!(parse_priority(p.as_str()).unwrap(), p);
        }
    }

    #[test]
    fn rejects_unknown_priority() {
        assert!(parse_priority("urgent").is_err());
    }

    #[test]
    fn round_trips_every_job_status() {
        for s in [
            JobStatus::Pending,
            JobStatus::Queued,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Retrying,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert_eq!(parse_job_status(&s.to_string()).unwrap(), s);
        }
    }
}
