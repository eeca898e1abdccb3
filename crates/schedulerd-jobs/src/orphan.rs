//! Orphan Recovery (C7) — reclaims jobs abandoned by dead workers.
//!
//! A worker is dead once its heartbeat has aged past
//! `orphan.stale_threshold_ms` (`WorkerRepository::find_stale`, predicate
//! pushed into SQL per §9 Open Question 4). Every job that dead worker still
//! shows `PROCESSING` (`JobRepository::find_processing_by_worker_ids`, same
//! pushdown) is requeued after `orphan.recovery_delay_ms` and the worker
//! itself is marked `stopped`.
//!
//! The late-finisher race in §4.5's "Correctness" paragraph — a worker that
//! was merely slow to heartbeat, not actually dead, finishing the job just as
//! recovery reclaims it — is closed by `JobRepository::update_if_owned`'s
//! compare-and-set guard: recovery only ever calls the unconditional
//! `update`, so a late finisher's own `update_if_owned` (worker_id-scoped)
//! simply fails once recovery has already moved the job to `retrying`.

use crate::metrics::JobMetrics;
use crate::queue_manager::QueueManager;
use chrono::Utc;
use schedulerd_config::OrphanConfig;
use schedulerd_core::{JobId, SchedulerResult};
use schedulerd_repository::{JobRepository, WorkerRepository};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, instrument, warn};

/// Sweeps for stale workers and reclaims the jobs they left `PROCESSING`.
pub struct OrphanRecovery {
    workers: Arc<dyn WorkerRepository>,
    jobs: Arc<dyn JobRepository>,
    queue: Arc<dyn QueueManager>,
    config: OrphanConfig,
}

impl OrphanRecovery {
    /// Creates a new Orphan Recovery sweeper.
    #[must_use]
    pub fn new(
        workers: Arc<dyn WorkerRepository>,
        jobs: Arc<dyn JobRepository>,
        queue: Arc<dyn QueueManager>,
        config: OrphanConfig,
    ) -> Self {
        Self { workers, jobs, queue, config }
    }

    /// Runs the stale-worker sweep loop until `shutdown` fires.
    #[instrument(skip_all)]
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.check_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("orphan recovery started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("orphan recovery stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(error) = self.sweep_once().await {
                        error!(%error, "orphan sweep failed");
                    }
                }
            }
        }
    }

    /// Runs a single sweep. Exposed for tests; `run` calls this on every tick.
    #[instrument(skip(self))]
    pub async fn sweep_once(&self) -> SchedulerResult<u64> {
        let now = Utc::now();
        let stale = self.workers.find_stale(now, self.config.stale_threshold_ms).await?;
        if stale.is_empty() {
            return Ok(0);
        }

        let stale_ids: Vec<_> = stale.iter().map(|w| w.id).collect();
        warn!(count = stale.len(), "found stale workers, reclaiming their jobs");

        let orphaned = self.jobs.find_processing_by_worker_ids(&stale_ids).await?;
        let mut recovered = 0u64;
        for job in orphaned {
            if let Err(error) = self.recover_job(job.id).await {
                error!(job_id = %job.id, %error, "failed to recover orphaned job");
            } else {
                recovered += 1;
            }
        }

        for mut worker in stale {
            worker.stop();
            self.workers.update(&worker).await?;
            warn!(worker_id = %worker.id, "marked stale worker stopped");
        }

        info!(count = recovered, "recovered orphaned jobs");
        Ok(recovered)
    }

    async fn recover_job(&self, job_id: JobId) -> SchedulerResult<()> {
        let Some(mut job) = self.jobs.find_by_id(job_id).await? else {
            return Ok(());
        };
        job.recover_from_dead_worker()?;
        self.jobs.update(&job).await?;
        self.queue.requeue(job.id, job.priority, self.config.recovery_delay_ms).await?;
        JobMetrics::job_recovered(&job.job_type);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue_manager::QueueStats;
    use async_trait::async_trait;
    use chrono::DateTime;
    use parking_lot::Mutex;
    use schedulerd_core::{JobStatus, Page, PageRequest, Priority, Worker, WorkerId};
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeWorkers {
        rows: Mutex<HashMap<WorkerId, Worker>>,
    }

    #[async_trait]
    impl WorkerRepository for FakeWorkers {
        async fn find_by_id(&self, id: WorkerId) -> SchedulerResult<Option<Worker>> {
            Ok(self.rows.lock().get(&id).cloned())
        }
        async fn find_all(&self, _page: PageRequest) -> SchedulerResult<Page<Worker>> {
            unimplemented!()
        }
        async fn find_stale(&self, now: DateTime<Utc>, stale_threshold_ms: i64) -> SchedulerResult<Vec<Worker>> {
            Ok(self.rows.lock().values().filter(|w| w.is_stale(now, stale_threshold_ms)).cloned().collect())
        }
        async fn save(&self, worker: &Worker) -> SchedulerResult<Worker> {
            self.rows.lock().insert(worker.id, worker.clone());
            Ok(worker.clone())
        }
        async fn update(&self, worker: &Worker) -> SchedulerResult<Worker> {
            self.rows.lock().insert(worker.id, worker.clone());
            Ok(worker.clone())
        }
        async fn count_active(&self) -> SchedulerResult<u64> {
            Ok(self.rows.lock().values().filter(|w| w.status != schedulerd_core::WorkerStatus::Stopped).count() as u64)
        }
    }

    #[derive(Default)]
    struct FakeJobs {
        rows: Mutex<HashMap<JobId, schedulerd_core::Job>>,
    }

    #[async_trait]
    impl JobRepository for FakeJobs {
        async fn find_by_id(&self, id: JobId) -> SchedulerResult<Option<schedulerd_core::Job>> {
            Ok(self.rows.lock().get(&id).cloned())
        }
        async fn find_all(&self, _page: PageRequest) -> SchedulerResult<Page<schedulerd_core::Job>> {
            unimplemented!()
        }
        async fn find_by_status(&self, _status: JobStatus, _page: PageRequest) -> SchedulerResult<Page<schedulerd_core::Job>> {
            unimplemented!()
        }
        async fn find_processing_by_worker_ids(&self, worker_ids: &[WorkerId]) -> SchedulerResult<Vec<schedulerd_core::Job>> {
            Ok(self
                .rows
                .lock()
                .values()
                .filter(|j| j.status == JobStatus::Processing && j.worker_id.is_some_and(|w| worker_ids.contains(&w)))
                .cloned()
                .collect())
        }
        async fn save(&self, job: &schedulerd_core::Job) -> SchedulerResult<schedulerd_core::Job> {
            self.rows.lock().insert(job.id, job.clone());
            Ok(job.clone())
        }
        async fn update(&self, job: &schedulerd_core::Job) -> SchedulerResult<schedulerd_core::Job> {
            self.rows.lock().insert(job.id, job.clone());
            Ok(job.clone())
        }
        async fn update_if_owned(&self, job: &schedulerd_core::Job, expected_worker_id: WorkerId) -> SchedulerResult<bool> {
            let mut rows = self.rows.lock();
            let Some(current) = rows.get(&job.id) else { return Ok(false) };
            if current.status != JobStatus::Processing || current.worker_id != Some(expected_worker_id) {
                return Ok(false);
            }
            rows.insert(job.id, job.clone());
            Ok(true)
        }
        async fn count_by_status(&self, _status: JobStatus) -> SchedulerResult<u64> {
            unimplemented!()
        }
    }

    #[derive(Default)]
    struct FakeQueue {
        requeued: Mutex<Vec<JobId>>,
    }

    #[async_trait]
    impl QueueManager for FakeQueue {
        async fn enqueue(&self, _job_id: JobId, _priority: Priority) -> SchedulerResult<()> {
            Ok(())
        }
        async fn enqueue_delayed(&self, _job_id: JobId, _fire_at: DateTime<Utc>, _priority: Priority) -> SchedulerResult<()> {
            Ok(())
        }
        async fn dequeue(&self) -> SchedulerResult<Option<JobId>> {
            Ok(None)
        }
        async fn promote_delayed(&self) -> SchedulerResult<u64> {
            Ok(0)
        }
        async fn mark_processing(&self, _job_id: JobId, _worker_id: WorkerId) -> SchedulerResult<()> {
            Ok(())
        }
        async fn mark_completed(&self, _job_id: JobId) -> SchedulerResult<()> {
            Ok(())
        }
        async fn requeue(&self, job_id: JobId, _priority: Priority, _delay_ms: u64) -> SchedulerResult<()> {
            self.requeued.lock().push(job_id);
            Ok(())
        }
        async fn move_to_dlq(&self, _job_id: JobId, _reason: &str) -> SchedulerResult<()> {
            Ok(())
        }
        async fn remove_from_dlq(&self, _job_id: JobId) -> SchedulerResult<()> {
            Ok(())
        }
        async fn stats(&self) -> SchedulerResult<QueueStats> {
            Ok(QueueStats::default())
        }
    }

    #[tokio::test]
    async fn sweep_recovers_jobs_owned_by_stale_workers_and_stops_them() {
        let workers = Arc::new(FakeWorkers::default());
        let mut dead = Worker::new("w1".into(), "host".into(), 1, 1);
        dead.last_heartbeat = Utc::now() - chrono::Duration::milliseconds(200_000);
        workers.save(&dead).await.unwrap();

        let jobs = Arc::new(FakeJobs::default());
        let mut job = schedulerd_core::Job::new("t".into(), "echo".into(), json!({}), Priority::Normal);
        job.mark_queued().unwrap();
        job.mark_processing(dead.id).unwrap();
        jobs.save(&job).await.unwrap();

        let queue = Arc::new(FakeQueue::default());
        let config = OrphanConfig { stale_threshold_ms: 90_000, ..OrphanConfig::default() };
        let recovery = OrphanRecovery::new(workers.clone(), jobs.clone(), queue.clone(), config);

        let recovered = recovery.sweep_once().await.unwrap();
        assert_eq!(recovered, 1);
        assert_eq!(queue.requeued.lock().len(), 1);

        let recovered_job = jobs.rows.lock().get(&job.id).cloned().unwrap();
        assert_eq!(recovered_job.status, JobStatus::Retrying);
        assert!(recovered_job.worker_id.is_none());

        let stopped_worker = workers.rows.lock().get(&dead.id).cloned().unwrap();
        assert_eq!(stopped_worker.status, schedulerd_core::WorkerStatus::Stopped);
    }

    #[tokio::test]
    async fn sweep_is_a_no_op_when_no_workers_are_stale() {
        let workers = Arc::new(FakeWorkers::default());
        let mut fresh = Worker::new("w1".into(), "host".into(), 1, 1);
        fresh.last_heartbeat = Utc::now();
        workers.save(&fresh).await.unwrap();

        let recovery = OrphanRecovery::new(workers, Arc::new(FakeJobs::default()), Arc::new(FakeQueue::default()), OrphanConfig::default());
        assert_eq!(recovery.sweep_once().await.unwrap(), 0);
    }
}
