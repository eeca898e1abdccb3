//! Job Processor (C4) — claims, executes, and resolves a single job.
//!
//! Invoked by a Worker (C5) slot once it has dequeued a job id. Owns the
//! status-transition and retry/backoff bookkeeping described in §4.2; the
//! Worker owns concurrency and polling.

use crate::handler::{HandlerRegistry, Outcome};
use crate::metrics::JobMetrics;
use crate::queue_manager::QueueManager;
use crate::webhook::WebhookPipeline;
use chrono::Utc;
use schedulerd_core::{DeadLetterJob, Job, JobId, SchedulerResult, WorkerId};
use schedulerd_repository::{DeadLetterRepository, JobRepository};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Claims, runs, and resolves jobs against the Durable Store, Queue Manager,
/// and dead-letter queue.
pub struct JobProcessor {
    jobs: Arc<dyn JobRepository>,
    dead_letters: Arc<dyn DeadLetterRepository>,
    queue: Arc<dyn QueueManager>,
    handlers: HandlerRegistry,
    backoff_max_delay_ms: u64,
    webhooks: Option<Arc<WebhookPipeline>>,
}

/// What happened to a job after one processing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Completed,
    Retrying { retry_count: u32, delay_ms: u64 },
    DeadLettered,
    /// The job id was claimed by `mark_processing` but no longer exists, or
    /// was already claimed by another worker — nothing to do.
    Skipped,
}

impl JobProcessor {
    /// Creates a new Job Processor over the given repositories, Queue
    /// Manager, and handler registry.
    #[must_use]
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        dead_letters: Arc<dyn DeadLetterRepository>,
        queue: Arc<dyn QueueManager>,
        handlers: HandlerRegistry,
        backoff_max_delay_ms: u64,
    ) -> Self {
        Self { jobs, dead_letters, queue, handlers, backoff_max_delay_ms, webhooks: None }
    }

    /// Enables outbound webhook notifications on completion/dead-letter, per
    /// §4.2 step 4. Off by default so handlerless tests don't need an outbox.
    #[must_use]
    pub fn with_webhooks(mut self, webhooks: Arc<WebhookPipeline>) -> Self {
        self.webhooks = Some(webhooks);
        self
    }

    async fn notify(&self, job: &Job) {
        if let Some(webhooks) = &self.webhooks {
            if let Err(error) = webhooks.notify(job).await {
                warn!(%error, job_id = %job.id, "failed to write webhook outbox entry");
            }
        }
    }

    /// Claims `job_id` for `worker_id`, invokes its handler, and resolves the
    /// outcome. Steps follow §4.2: fetch, claim, invoke, resolve.
    #[instrument(skip(self), fields(job_id = %job_id, worker_id = %worker_id))]
    pub async fn process(&self, job_id: JobId, worker_id: WorkerId) -> SchedulerResult<ProcessOutcome> {
        let Some(mut job) = self.jobs.find_by_id(job_id).await? else {
            warn!("dequeued job id has no matching row; dropping");
            return Ok(ProcessOutcome::Skipped);
        };

        if job.mark_processing(worker_id).is_err() {
            warn!(status = %job.status, "job already left a claimable state; dropping");
            return Ok(ProcessOutcome::Skipped);
        }
        self.jobs.update(&job).await?;
        self.queue.mark_processing(job_id, worker_id).await?;
        JobMetrics::job_dequeued(&job.job_type);

        let outcome = self.invoke_handler(&job).await;
        self.resolve(job, worker_id, outcome).await
    }

    fn elapsed(job: &Job) -> std::time::Duration {
        job.started_at
            .and_then(|started| (Utc::now() - started).to_std().ok())
            .unwrap_or_default()
    }

    async fn invoke_handler(&self, job: &Job) -> Outcome {
        match self.handlers.resolve(job) {
            Ok(handler) => handler.handle(job).await,
            Err(outcome) => outcome,
        }
    }

    #[instrument(skip(self, job, outcome), fields(job_id = %job.id))]
    async fn resolve(
        &self,
        mut job: Job,
        worker_id: WorkerId,
        outcome: Outcome,
    ) -> SchedulerResult<ProcessOutcome> {
        match outcome {
            Outcome::Success(result) => {
                let duration = Self::elapsed(&job);
                job.mark_completed(result)?;
                if !self.jobs.update_if_owned(&job, worker_id).await? {
                    warn!("job was reclaimed before completion could be recorded; discarding result");
                    return Ok(ProcessOutcome::Skipped);
                }
                self.queue.mark_completed(job.id).await?;
                JobMetrics::job_completed(&job.job_type, duration);
                info!("job completed");
                self.notify(&job).await;
                Ok(ProcessOutcome::Completed)
            }
            Outcome::TransientError(message) => self.fail(job, worker_id, message, false).await,
            Outcome::PermanentError(message) => self.fail(job, worker_id, message, true).await,
        }
    }

    async fn fail(
        &self,
        mut job: Job,
        worker_id: WorkerId,
        message: String,
        force_permanent: bool,
    ) -> SchedulerResult<ProcessOutcome> {
        if force_permanent {
            job.retry_count = job.max_retries;
        }

        let duration = Self::elapsed(&job);
        let delay_ms = job.backoff_delay_ms(self.backoff_max_delay_ms);
        let requeued = job.record_failure(message.clone())?;
        if !self.jobs.update_if_owned(&job, worker_id).await? {
            warn!("job was reclaimed before failure could be recorded; discarding outcome");
            return Ok(ProcessOutcome::Skipped);
        }
        JobMetrics::job_failed(&job.job_type, duration);

        if requeued {
            self.queue.requeue(job.id, job.priority, delay_ms).await?;
            JobMetrics::job_retried(&job.job_type, job.retry_count);
            warn!(retry_count = job.retry_count, delay_ms, "job failed, scheduled for retry");
            Ok(ProcessOutcome::Retrying { retry_count: job.retry_count, delay_ms })
        } else {
            self.notify(&job).await;
            let job_type = job.job_type.clone();
            self.dead_letter(job, message).await?;
            JobMetrics::job_dead_lettered(&job_type);
            Ok(ProcessOutcome::DeadLettered)
        }
    }

    async fn dead_letter(&self, job: Job, reason: String) -> SchedulerResult<()> {
        let entry = DeadLetterJob::from_job(&job, reason, None);
        self.dead_letters.save(&entry).await?;
        self.queue.move_to_dlq(job.id, &entry.failure_reason).await?;
        error!(job_id = %job.id, dead_letter_id = %entry.id, "job permanently failed, moved to dead-letter queue");
        Ok(())
    }
}

fn _assert_send_sync() {
    fn assert<T: Send + Sync>() {}
    assert::<JobProcessor>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::JobHandler;
    use crate::queue_manager::QueueStats;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use parking_lot::Mutex;
    use schedulerd_core::{JobStatus, Page, PageRequest, Priority};
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeJobs {
        rows: Mutex<HashMap<JobId, Job>>,
    }

    #[async_trait]
    impl JobRepository for FakeJobs {
        async fn find_by_id(&self, id: JobId) -> SchedulerResult<Option<Job>> {
            Ok(self.rows.lock().get(&id).cloned())
        }
        async fn find_all(&self, _page: PageRequest) -> SchedulerResult<Page<Job>> {
            unimplemented!()
        }
        async fn find_by_status(&self, _status: JobStatus, _page: PageRequest) -> SchedulerResult<Page<Job>> {
            unimplemented!()
        }
        async fn find_processing_by_worker_ids(&self, _worker_ids: &[WorkerId]) -> SchedulerResult<Vec<Job>> {
            unimplemented!()
        }
        async fn save(&self, job: &Job) -> SchedulerResult<Job> {
            self.rows.lock().insert(job.id, job.clone());
            Ok(job.clone())
        }
        async fn update(&self, job: &Job) -> SchedulerResult<Job> {
            self.rows.lock().insert(job.id, job.clone());
            Ok(job.clone())
        }
        async fn update_if_owned(&self, job: &Job, expected_worker_id: WorkerId) -> SchedulerResult<bool> {
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
    struct FakeDeadLetters {
        saved: Mutex<Vec<DeadLetterJob>>,
    }

    #[async_trait]
    impl DeadLetterRepository for FakeDeadLetters {
        async fn find_by_id(&self, _id: schedulerd_core::DeadLetterId) -> SchedulerResult<Option<DeadLetterJob>> {
            unimplemented!()
        }
        async fn find_all(&self, _page: PageRequest) -> SchedulerResult<Page<DeadLetterJob>> {
            unimplemented!()
        }
        async fn save(&self, entry: &DeadLetterJob) -> SchedulerResult<DeadLetterJob> {
            self.saved.lock().push(entry.clone());
            Ok(entry.clone())
        }
        async fn delete(&self, _id: schedulerd_core::DeadLetterId) -> SchedulerResult<bool> {
            unimplemented!()
        }
        async fn delete_older_than(&self, _before: DateTime<Utc>) -> SchedulerResult<u64> {
            unimplemented!()
        }
    }

    #[derive(Default)]
    struct FakeWebhookEvents {
        saved: Mutex<Vec<schedulerd_core::WebhookEvent>>,
    }

    #[async_trait]
    impl schedulerd_repository::WebhookEventRepository for FakeWebhookEvents {
        async fn find_by_id(&self, _id: schedulerd_core::WebhookEventId) -> SchedulerResult<Option<schedulerd_core::WebhookEvent>> {
            unimplemented!()
        }
        async fn find_all(&self, _page: PageRequest) -> SchedulerResult<Page<schedulerd_core::WebhookEvent>> {
            unimplemented!()
        }
        async fn find_retry_candidates(&self) -> SchedulerResult<Vec<schedulerd_core::WebhookEvent>> {
            Ok(vec![])
        }
        async fn save(&self, event: &schedulerd_core::WebhookEvent) -> SchedulerResult<schedulerd_core::WebhookEvent> {
            self.saved.lock().push(event.clone());
            Ok(event.clone())
        }
        async fn update(&self, event: &schedulerd_core::WebhookEvent) -> SchedulerResult<schedulerd_core::WebhookEvent> {
            self.saved.lock().push(event.clone());
            Ok(event.clone())
        }
    }

    #[derive(Default)]
    struct FakeQueue {
        requeued: Mutex<Vec<JobId>>,
        dlq: Mutex<Vec<JobId>>,
        completed: Mutex<Vec<JobId>>,
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
        async fn mark_completed(&self, job_id: JobId) -> SchedulerResult<()> {
            self.completed.lock().push(job_id);
            Ok(())
        }
        async fn requeue(&self, job_id: JobId, _priority: Priority, _delay_ms: u64) -> SchedulerResult<()> {
            self.requeued.lock().push(job_id);
            Ok(())
        }
        async fn move_to_dlq(&self, job_id: JobId, _reason: &str) -> SchedulerResult<()> {
            self.dlq.lock().push(job_id);
            Ok(())
        }
        async fn remove_from_dlq(&self, _job_id: JobId) -> SchedulerResult<()> {
            Ok(())
        }
        async fn stats(&self) -> SchedulerResult<QueueStats> {
            Ok(QueueStats::default())
        }
    }

    struct AlwaysSucceed;
    #[async_trait]
    impl JobHandler for AlwaysSucceed {
        async fn handle(&self, _job: &Job) -> Outcome {
            Outcome::Success(json!({"ok": true}))
        }
    }

    struct AlwaysFail;
    #[async_trait]
    impl JobHandler for AlwaysFail {
        async fn handle(&self, _job: &Job) -> Outcome {
            Outcome::TransientError("boom".into())
        }
    }

    fn make_processor(
        jobs: Arc<FakeJobs>,
        dead_letters: Arc<FakeDeadLetters>,
        queue: Arc<FakeQueue>,
        handler: Arc<dyn JobHandler>,
    ) -> JobProcessor {
        let handlers = HandlerRegistry::new();
        handlers.register("echo", handler);
        JobProcessor::new(jobs, dead_letters, queue, handlers, 60_000)
    }

    #[tokio::test]
    async fn successful_job_completes_and_clears_the_queue_index() {
        let jobs = Arc::new(FakeJobs::default());
        let job = Job::new("t".into(), "echo".into(), json!({}), Priority::Normal);
        jobs.save(&job).await.unwrap();
        let queue = Arc::new(FakeQueue::default());
        let processor = make_processor(jobs.clone(), Arc::new(FakeDeadLetters::default()), queue.clone(), Arc::new(AlwaysSucceed));

        let outcome = processor.process(job.id, WorkerId::new()).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::Completed);
        assert_eq!(queue.completed.lock().len(), 1);
        assert_eq!(jobs.rows.lock().get(&job.id).unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn transient_failure_within_budget_requeues() {
        let jobs = Arc::new(FakeJobs::default());
        let mut job = Job::new("t".into(), "echo".into(), json!({}), Priority::Normal);
        job.max_retries = 2;
        jobs.save(&job).await.unwrap();
        let queue = Arc::new(FakeQueue::default());
        let processor = make_processor(jobs.clone(), Arc::new(FakeDeadLetters::default()), queue.clone(), Arc::new(AlwaysFail));

        let outcome = processor.process(job.id, WorkerId::new()).await.unwrap();
        assert!(matches!(outcome, ProcessOutcome::Retrying { retry_count: 1, .. }));
        assert_eq!(queue.requeued.lock().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_retry_budget_dead_letters() {
        let jobs = Arc::new(FakeJobs::default());
        let mut job = Job::new("t".into(), "echo".into(), json!({}), Priority::Normal);
        job.max_retries = 0;
        jobs.save(&job).await.unwrap();
        let queue = Arc::new(FakeQueue::default());
        let dead_letters = Arc::new(FakeDeadLetters::default());
        let processor = make_processor(jobs.clone(), dead_letters.clone(), queue.clone(), Arc::new(AlwaysFail));

        let outcome = processor.process(job.id, WorkerId::new()).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::DeadLettered);
        assert_eq!(queue.dlq.lock().len(), 1);
        assert_eq!(dead_letters.saved.lock().len(), 1);
    }

    #[tokio::test]
    async fn reclaimed_job_does_not_overwrite_the_new_owner() {
        let jobs = Arc::new(FakeJobs::default());
        let job = Job::new("t".into(), "echo".into(), json!({}), Priority::Normal);
        jobs.save(&job).await.unwrap();
        let queue = Arc::new(FakeQueue::default());
        let processor = make_processor(jobs.clone(), Arc::new(FakeDeadLetters::default()), queue.clone(), Arc::new(AlwaysSucceed));

        let claiming_worker = WorkerId::new();
        let mut claimed = job.clone();
        claimed.mark_processing(claiming_worker).unwrap();
        jobs.update(&claimed).await.unwrap();

        let other_worker = WorkerId::new();
        let outcome = processor.process(job.id, other_worker).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::Skipped);
    }

    #[tokio::test]
    async fn missing_handler_is_dead_lettered_without_a_retry() {
        let jobs = Arc::new(FakeJobs::default());
        let job = Job::new("t".into(), "unregistered".into(), json!({}), Priority::Normal);
        jobs.save(&job).await.unwrap();
        let queue = Arc::new(FakeQueue::default());
        let dead_letters = Arc::new(FakeDeadLetters::default());
        let processor = JobProcessor::new(jobs.clone(), dead_letters.clone(), queue.clone(), HandlerRegistry::new(), 60_000);

        let outcome = processor.process(job.id, WorkerId::new()).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::DeadLettered);
        assert_eq!(dead_letters.saved.lock().len(), 1);
    }

    #[tokio::test]
    async fn completed_job_with_webhook_url_writes_an_outbox_entry() {
        let jobs = Arc::new(FakeJobs::default());
        let mut job = Job::new("t".into(), "echo".into(), json!({}), Priority::Normal);
        job.webhook_url = Some("http://127.0.0.1:1/hook".into());
        jobs.save(&job).await.unwrap();
        let queue = Arc::new(FakeQueue::default());
        let webhook_events = Arc::new(FakeWebhookEvents::default());
        let webhooks = Arc::new(
            crate::webhook::WebhookPipeline::new(webhook_events.clone(), schedulerd_config::WebhookConfig::default()).unwrap(),
        );
        let processor = make_processor(jobs.clone(), Arc::new(FakeDeadLetters::default()), queue.clone(), Arc::new(AlwaysSucceed))
            .with_webhooks(webhooks);

        let outcome = processor.process(job.id, WorkerId::new()).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::Completed);
        assert!(!webhook_events.saved.lock().is_empty());
    }

    #[tokio::test]
    async fn dead_lettered_job_with_webhook_url_writes_an_outbox_entry() {
        let jobs = Arc::new(FakeJobs::default());
        let mut job = Job::new("t".into(), "echo".into(), json!({}), Priority::Normal);
        job.max_retries = 0;
        job.webhook_url = Some("http://127.0.0.1:1/hook".into());
        jobs.save(&job).await.unwrap();
        let queue = Arc::new(FakeQueue::default());
        let webhook_events = Arc::new(FakeWebhookEvents::default());
        let webhooks = Arc::new(
            crate::webhook::WebhookPipeline::new(webhook_events.clone(), schedulerd_config::WebhookConfig::default()).unwrap(),
        );
        let processor = make_processor(jobs.clone(), Arc::new(FakeDeadLetters::default()), queue.clone(), Arc::new(AlwaysFail))
            .with_webhooks(webhooks);

        let outcome = processor.process(job.id, WorkerId::new()).await.unwrap();
        assert_eq!(outcome, ProcessOutcome::DeadLettered);
        assert!(!webhook_events.saved.lock().is_empty());
    }
}
