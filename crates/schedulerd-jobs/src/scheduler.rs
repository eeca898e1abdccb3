//! Schedule Executor (C6) — fires due `Schedule`s into new jobs.
//!
//! Cron expressions are stored as five fields (minute hour dom month dow);
//! the `cron` crate parses six (seconds first), so a literal `"0"` seconds
//! field is prepended before parsing. `chrono_tz::Tz` evaluates `next_run_at`
//! in the schedule's IANA timezone so DST transitions land on the same wall
//! clock time every day.
//!
//! Single-instance semantics are mandatory (§9 Open Question 2): running two
//! Schedule Executors against the same Durable Store double-fires schedules.
//! This implementation additionally offers a Redis-leased leader-election
//! mode behind [`ScheduleExecutor::with_leader_election`], off by default,
//! for deployments that want more than one executor process standing by.

use crate::metrics::{JobMetrics, SchedulerMetrics};
use crate::queue_manager::QueueManager;
use crate::redis::RedisKeys;
use chrono::Utc;
use cron::Schedule as CronSchedule;
use deadpool_redis::Pool;
use schedulerd_config::SchedulerLoopConfig;
use schedulerd_core::{Job, Schedule, SchedulerError, SchedulerResult};
use schedulerd_repository::{JobRepository, ScheduleRepository};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

const LEADER_LOCK_TTL_SECS: u64 = 30;

/// Parses a five-field cron expression and computes its next firing at or
/// after `after`, evaluated in `timezone`.
fn next_run_after(cron_expr: &str, timezone: &str, after: chrono::DateTime<Utc>) -> SchedulerResult<chrono::DateTime<Utc>> {
    let tz: chrono_tz::Tz = timezone
        .parse()
        .map_err(|_| SchedulerError::validation(format!("unknown timezone '{timezone}'")))?;
    let six_field = format!("0 {cron_expr}");
    let schedule = CronSchedule::from_str(&six_field)
        .map_err(|e| SchedulerError::validation(format!("invalid cron expression '{cron_expr}': {e}")))?;
    let local_after = after.with_timezone(&tz);
    schedule
        .after(&local_after)
        .next()
        .map(|next| next.with_timezone(&Utc))
        .ok_or_else(|| SchedulerError::internal(format!("cron expression '{cron_expr}' has no future firing")))
}

/// Optional Redis leader-election lease, held across polls while enabled.
struct LeaderLease {
    pool: Pool,
    lock_key: String,
    token: String,
}

impl LeaderLease {
    async fn try_acquire(&self) -> SchedulerResult<bool> {
        let mut conn = self.pool.get().await.map_err(|e| SchedulerError::Cache(e.to_string()))?;
        let acquired: bool = redis::cmd("SET")
            .arg(&self.lock_key)
            .arg(&self.token)
            .arg("NX")
            .arg("EX")
            .arg(LEADER_LOCK_TTL_SECS)
            .query_async::<Option<String>>(&mut *conn)
            .await?
            .is_some();
        Ok(acquired)
    }

    async fn release(&self) {
        let Ok(mut conn) = self.pool.get().await else { return };
        let script = redis::Script::new(
            r#"
            if redis.call("GET", KEYS[1]) == ARGV[1] then
                return redis.call("DEL", KEYS[1])
            end
            return 0
            "#,
        );
        let _: Result<i64, _> = script.key(&self.lock_key).arg(&self.token).invoke_async(&mut *conn).await;
    }
}

/// Polls for due schedules and fires each one into a new job.
pub struct ScheduleExecutor {
    schedules: Arc<dyn ScheduleRepository>,
    jobs: Arc<dyn JobRepository>,
    queue: Arc<dyn QueueManager>,
    config: SchedulerLoopConfig,
    leader: Option<LeaderLease>,
}

impl ScheduleExecutor {
    /// Creates a Schedule Executor with single-instance (mandatory) semantics.
    #[must_use]
    pub fn new(
        schedules: Arc<dyn ScheduleRepository>,
        jobs: Arc<dyn JobRepository>,
        queue: Arc<dyn QueueManager>,
        config: SchedulerLoopConfig,
    ) -> Self {
        Self { schedules, jobs, queue, config, leader: None }
    }

    /// Enables the opt-in Redis-leased leader-election extension: only the
    /// process holding the lease fires schedules on a given poll.
    #[must_use]
    pub fn with_leader_election(mut self, pool: Pool, key_prefix: impl Into<String>) -> Self {
        let lock_key = RedisKeys::new(key_prefix).scheduler_lock();
        self.leader = Some(LeaderLease { pool, lock_key, token: Uuid::new_v4().to_string() });
        self
    }

    /// Runs the due-schedule poll loop until `shutdown` fires.
    #[instrument(skip_all)]
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.check_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("schedule executor started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    if let Some(leader) = &self.leader {
                        leader.release().await;
                    }
                    info!("schedule executor stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let is_leader = self.is_leader().await;
                    if self.leader.is_some() {
                        SchedulerMetrics::update_leader_status(is_leader);
                    }
                    if is_leader {
                        if let Err(error) = self.poll_once().await {
                            error!(%error, "schedule poll failed");
                        }
                    }
                }
            }
        }
    }

    async fn is_leader(&self) -> bool {
        let Some(leader) = &self.leader else { return true };
        match leader.try_acquire().await {
            Ok(acquired) => acquired,
            Err(error) => {
                warn!(%error, "leader-election check failed, skipping this poll");
                false
            }
        }
    }

    /// Scans for due schedules and fires each one. Exposed for tests; `run`
    /// calls this on every tick.
    #[instrument(skip(self))]
    pub async fn poll_once(&self) -> SchedulerResult<u64> {
        let now = Utc::now();
        let due = self.schedules.find_due(now).await?;
        let mut fired = 0u64;

        for schedule in due {
            match self.fire(schedule, now).await {
                Ok(()) => fired += 1,
                Err(error) => error!(%error, "failed to fire schedule"),
            }
        }

        if fired > 0 {
            debug!(count = fired, "fired due schedules");
        }
        Ok(fired)
    }

    async fn fire(&self, mut schedule: Schedule, now: chrono::DateTime<Utc>) -> SchedulerResult<()> {
        let next_run_at = next_run_after(&schedule.cron_expr, &schedule.timezone, now);

        let mut job = Job::from_schedule(
            schedule.id,
            &schedule.name,
            schedule.job_type.clone(),
            schedule.job_payload.clone(),
            schedule.job_priority,
        );
        job.mark_queued()?;

        if let Err(error) = self.jobs.save(&job).await {
            match next_run_at {
                Ok(next) => schedule.skip_firing(next),
                Err(_) => schedule.skip_firing(now + chrono::Duration::minutes(1)),
            }
            self.schedules.update(&schedule).await?;
            return Err(error);
        }

        self.queue.enqueue(job.id, job.priority).await?;
        JobMetrics::job_enqueued(&job.job_type, job.priority.as_str());

        let next_run_at = next_run_at?;
        schedule.record_firing(now, next_run_at)?;
        self.schedules.update(&schedule).await?;

        SchedulerMetrics::job_triggered(&schedule.name);
        info!(schedule_id = %schedule.id, job_id = %job.id, next_run_at = %next_run_at, "schedule fired");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cron_bridges_five_field_to_six_and_respects_timezone() {
        let after = Utc::now();
        let next = next_run_after("0 9 * * *", "America/New_York", after).unwrap();
        assert!(next > after);
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let err = next_run_after("0 9 * * *", "Mars/Phobos", Utc::now());
        assert!(err.is_err());
    }

    #[test]
    fn malformed_cron_is_rejected() {
        let err = next_run_after("not a cron", "UTC", Utc::now());
        assert!(err.is_err());
    }
}
