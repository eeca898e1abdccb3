//! Worker entity — a registration of a live processing process.

use crate::{Entity, WorkerId, WorkerStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Registration of a live worker process.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Worker {
    pub id: WorkerId,

    #[validate(length(min = 1, max = 255))]
    pub name: String,

    pub hostname: String,
    pub pid: u32,

    pub status: WorkerStatus,

    /// Advisory configured concurrency; `active_jobs` tracks real occupancy.
    pub concurrency: u32,
    pub active_jobs: u32,

    pub processed_count: u64,
    pub failed_count: u64,

    pub last_heartbeat: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
}

impl Worker {
    /// Registers a new worker, marked `active` with a fresh heartbeat.
    #[must_use]
    pub fn new(name: String, hostname: String, pid: u32, concurrency: u32) -> Self {
        let now = Utc::now();
        Self {
            id: WorkerId::new(),
            name,
            hostname,
            pid,
            status: WorkerStatus::Active,
            concurrency,
            active_jobs: 0,
            processed_count: 0,
            failed_count: 0,
            last_heartbeat: now,
            started_at: now,
            stopped_at: None,
        }
    }

    /// Records a heartbeat. `lastHeartbeat` is non-decreasing per invariant (b).
    pub fn heartbeat(&mut self) {
        let now = Utc::now();
        if now > self.last_heartbeat {
            self.last_heartbeat = now;
        }
    }

    /// Checks whether this worker's heartbeat has aged past `stale_threshold_ms`.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, stale_threshold_ms: i64) -> bool {
        self.status == WorkerStatus::Active
            && (now - self.last_heartbeat).num_milliseconds() > stale_threshold_ms
    }

    /// Increments the in-flight job count and flips status to `active`.
    pub fn job_started(&mut self) {
        self.active_jobs += 1;
        self.status = WorkerStatus::Active;
    }

    /// Decrements the in-flight job count and records the outcome.
    pub fn job_finished(&mut self, succeeded: bool) {
        self.active_jobs = self.active_jobs.saturating_sub(1);
        if succeeded {
            self.processed_count += 1;
        } else {
            self.failed_count += 1;
        }
        if self.active_jobs == 0 {
            self.status = WorkerStatus::Idle;
        }
    }

    /// Shuts the worker down cleanly, per invariant (a): `stopped` iff `stoppedAt` is set.
    pub fn stop(&mut self) {
        self.status = WorkerStatus::Stopped;
        self.active_jobs = 0;
        self.stopped_at = Some(Utc::now());
    }
}

impl Entity<WorkerId> for Worker {
    fn id(&self) -> &WorkerId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> Worker {
        Worker::new("worker-1".into(), "host-a".into(), 1234, 4)
    }

    #[test]
    fn new_worker_is_active_with_no_jobs() {
        let w = sample();
        assert_eq!(w.status, WorkerStatus::Active);
        assert_eq!(w.active_jobs, 0);
        assert!(w.stopped_at.is_none());
    }

    #[test]
    fn job_lifecycle_updates_counters_and_status() {
        let mut w = sample();
        w.job_started();
        assert_eq!(w.active_jobs, 1);
        w.job_finished(true);
        assert_eq!(w.active_jobs, 0);
        assert_eq!(w.processed_count, 1);
        assert_eq!(w.status, WorkerStatus::Idle);
    }

    #[test]
    fn job_failure_counts_toward_failed_count() {
        let mut w = sample();
        w.job_started();
        w.job_finished(false);
        assert_eq!(w.failed_count, 1);
    }

    #[test]
    fn stop_clears_active_jobs_and_sets_stopped_at() {
        let mut w = sample();
        w.job_started();
        w.stop();
        assert_eq!(w.status, WorkerStatus::Stopped);
        assert_eq!(w.active_jobs, 0);
        assert!(w.stopped_at.is_some());
    }

    #[test]
    fn staleness_threshold() {
        let mut w = sample();
        w.last_heartbeat = Utc::now() - Duration::seconds(120);
        assert!(w.is_stale(Utc::now(), 90_000));
        assert!(!w.is_stale(Utc::now(), 150_000));
    }

    #[test]
    fn stopped_worker_is_never_stale() {
        let mut w = sample();
        w.last_heartbeat = Utc::now() - Duration::seconds(500);
        w.stop();
        assert!(!w.is_stale(Utc::now(), 1));
    }
}
