//! Worker (C5) — the process that claims and executes jobs.
//!
//! Hosts `concurrency` independent processing slots (§9 Open Question 3:
//! resolved as N independent semaphore-bounded slots rather than a shared
//! pool), a heartbeat ticker, and a delayed-job promotion ticker. Every task
//! group observes a `tokio::sync::broadcast` shutdown signal via
//! `tokio::select!`.

use crate::processor::{JobProcessor, ProcessOutcome};
use crate::queue_manager::QueueManager;
use schedulerd_config::WorkerConfig;
use schedulerd_core::{SchedulerResult, Worker as WorkerRegistration, WorkerId};
use schedulerd_repository::WorkerRepository;
use std::sync::Arc;
use tokio::sync::{broadcast, Semaphore};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// A single worker process: registers itself in the Durable Store, then runs
/// `concurrency` dequeue-and-process slots plus housekeeping tickers until
/// shutdown is signalled.
pub struct Worker {
    id: WorkerId,
    registry: Arc<dyn WorkerRepository>,
    queue: Arc<dyn QueueManager>,
    processor: Arc<JobProcessor>,
    config: WorkerConfig,
}

impl Worker {
    /// Registers a new worker row and returns a handle ready to `run`.
    pub async fn register(
        name: String,
        registry: Arc<dyn WorkerRepository>,
        queue: Arc<dyn QueueManager>,
        processor: Arc<JobProcessor>,
        config: WorkerConfig,
    ) -> SchedulerResult<Self> {
        let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
        let registration = WorkerRegistration::new(name, hostname, std::process::id(), config.concurrency);
        let saved = registry.save(&registration).await?;
        info!(worker_id = %saved.id, concurrency = config.concurrency, "worker registered");
        Ok(Self { id: saved.id, registry, queue, processor, config })
    }

    /// Returns this worker's id.
    #[must_use]
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Runs the worker's slots and housekeeping tickers until `shutdown`
    /// fires, then marks the worker `stopped` in the Durable Store.
    #[instrument(skip_all, fields(worker_id = %self.id))]
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> SchedulerResult<()> {
        let permits = Arc::new(Semaphore::new(self.config.concurrency as usize));

        let mut slot_shutdown = shutdown.resubscribe();
        let slots = self.run_slots(Arc::clone(&permits), &mut slot_shutdown);

        let mut heartbeat_shutdown = shutdown.resubscribe();
        let heartbeat = self.run_heartbeat(&mut heartbeat_shutdown);

        let mut promote_shutdown = shutdown.resubscribe();
        let promote = self.run_promoter(&mut promote_shutdown);

        tokio::select! {
            () = slots => {}
            () = heartbeat => {}
            () = promote => {}
            _ = shutdown.recv() => {}
        }

        self.shutdown().await
    }

    async fn run_slots(&self, permits: Arc<Semaphore>, shutdown: &mut broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => return,
                permit = permits.clone().acquire_owned() => {
                    let Ok(permit) = permit else { return };
                    match self.queue.dequeue().await {
                        Ok(Some(job_id)) => {
                            let processor = Arc::clone(&self.processor);
                            let registry = Arc::clone(&self.registry);
                            let worker_id = self.id;
                            tokio::spawn(async move {
                                let _permit = permit;
                                Self::record_job_started(&registry, worker_id).await;
                                let succeeded = match processor.process(job_id, worker_id).await {
                                    Ok(ProcessOutcome::Completed) => {
                                        debug!(job_id = %job_id, "slot finished job");
                                        true
                                    }
                                    Ok(outcome) => {
                                        debug!(job_id = %job_id, ?outcome, "slot finished job");
                                        false
                                    }
                                    Err(error) => {
                                        error!(job_id = %job_id, %error, "slot failed to process job");
                                        false
                                    }
                                };
                                Self::record_job_finished(&registry, worker_id, succeeded).await;
                            });
                        }
                        Ok(None) => {
                            drop(permit);
                            tokio::time::sleep(self.config.poll_interval()).await;
                        }
                        Err(error) => {
                            drop(permit);
                            warn!(%error, "dequeue failed, backing off");
                            tokio::time::sleep(self.config.poll_interval()).await;
                        }
                    }
                }
            }
        }
    }

    async fn run_heartbeat(&self, shutdown: &mut broadcast::Receiver<()>) {
        let mut ticker = interval(self.config.heartbeat_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.recv() => return,
                _ = ticker.tick() => {
                    if let Err(error) = self.beat().await {
                        warn!(%error, "heartbeat write failed");
                    }
                }
            }
        }
    }

    async fn beat(&self) -> SchedulerResult<()> {
        let Some(mut worker) = self.registry.find_by_id(self.id).await? else {
            warn!("worker registration missing during heartbeat; it may have been pruned");
            return Ok(());
        };
        worker.heartbeat();
        self.registry.update(&worker).await?;
        Ok(())
    }

    /// Marks the worker row occupied for one in-flight job, per §4.3 step 4.
    async fn record_job_started(registry: &Arc<dyn WorkerRepository>, worker_id: WorkerId) {
        match registry.find_by_id(worker_id).await {
            Ok(Some(mut worker)) => {
                worker.job_started();
                if let Err(error) = registry.update(&worker).await {
                    warn!(%error, "failed to record job_started");
                }
            }
            Ok(None) => warn!("worker registration missing while recording job_started"),
            Err(error) => warn!(%error, "failed to load worker registration for job_started"),
        }
    }

    /// Releases the in-flight slot and records the outcome, per §4.3 step 4.
    async fn record_job_finished(registry: &Arc<dyn WorkerRepository>, worker_id: WorkerId, succeeded: bool) {
        match registry.find_by_id(worker_id).await {
            Ok(Some(mut worker)) => {
                worker.job_finished(succeeded);
                if let Err(error) = registry.update(&worker).await {
                    warn!(%error, "failed to record job_finished");
                }
            }
            Ok(None) => warn!("worker registration missing while recording job_finished"),
            Err(error) => warn!(%error, "failed to load worker registration for job_finished"),
        }
    }

    async fn run_promoter(&self, shutdown: &mut broadcast::Receiver<()>) {
        let mut ticker = interval(self.config.promote_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.recv() => return,
                _ = ticker.tick() => {
                    match self.queue.promote_delayed().await {
                        Ok(0) => {}
                        Ok(count) => debug!(count, "promoted delayed jobs to ready"),
                        Err(error) => warn!(%error, "delayed-job promotion sweep failed"),
                    }
                }
            }
        }
    }

    async fn shutdown(&self) -> SchedulerResult<()> {
        if let Some(mut worker) = self.registry.find_by_id(self.id).await? {
            worker.stop();
            self.registry.update(&worker).await?;
        }
        info!("worker stopped");
        Ok(())
    }
}
