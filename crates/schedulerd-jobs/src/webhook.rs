//! Webhook Pipeline (C8) — delivers job-completion notifications.
//!
//! Every notification is first written to the `webhook_events` outbox
//! (`WebhookEventRepository`), then dispatched. A dispatch attempt's own
//! HTTP call goes through [`RetryPolicy::execute`] with a single attempt —
//! this crate's standard resilience idiom for a network call — while
//! scheduling *across* attempts (minutes apart, surviving process restarts)
//! is driven by `WebhookEvent::is_due_for_retry`/`record_failure`, since a
//! single in-process retry loop can't span an outbox sweep boundary.

use crate::metrics::WebhookMetrics;
use chrono::Utc;
use reqwest::Client;
use schedulerd_config::WebhookConfig;
use schedulerd_core::{Job, SchedulerResult, WebhookEvent};
use schedulerd_repository::WebhookEventRepository;
use schedulerd_resilience::RetryPolicy;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, instrument, warn};

/// Writes outbox entries for completed jobs and drains the retry queue.
pub struct WebhookPipeline {
    events: Arc<dyn WebhookEventRepository>,
    client: Client,
    config: WebhookConfig,
}

impl WebhookPipeline {
    /// Creates a new Webhook Pipeline.
    #[must_use]
    pub fn new(events: Arc<dyn WebhookEventRepository>, config: WebhookConfig) -> SchedulerResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| schedulerd_core::SchedulerError::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { events, client, config })
    }

    /// Writes an outbox entry for `job`'s completion and attempts immediate
    /// delivery, per §4.6 step 1. A delivery failure here is not an error —
    /// the retry loop will pick the event back up.
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    pub async fn notify(&self, job: &Job) -> SchedulerResult<()> {
        let Some(url) = job.webhook_url.clone() else { return Ok(()) };

        let payload = json!({
            "jobId": job.id,
            "jobType": job.job_type,
            "status": job.status.to_string(),
            "result": job.result,
            "error": job.error,
            "completedAt": job.completed_at,
        });

        let mut event = WebhookEvent::new(job.id, job.job_type.clone(), url, payload, self.config.max_attempts);
        let saved = self.events.save(&event).await?;
        event = saved;

        self.attempt(&mut event).await;
        self.events.update(&event).await?;
        Ok(())
    }

    /// Runs the retry-loop sweep until `shutdown` fires. Every tick claims
    /// the retry candidates the Durable Store can cheaply filter
    /// (`find_retry_candidates`) and narrows to the ones actually due with
    /// [`WebhookEvent::is_due_for_retry`].
    #[instrument(skip_all)]
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(std::time::Duration::from_millis(self.config.retry_base_delay_ms));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("webhook retry pipeline started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("webhook retry pipeline stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(error) = self.sweep_once().await {
                        error!(%error, "webhook retry sweep failed");
                    }
                }
            }
        }
    }

    /// Runs a single retry sweep. Exposed for tests; `run` calls this on
    /// every tick.
    #[instrument(skip(self))]
    pub async fn sweep_once(&self) -> SchedulerResult<u64> {
        let now = Utc::now();
        let candidates = self.events.find_retry_candidates().await?;
        let mut retried = 0u64;

        for mut event in candidates
            .into_iter()
            .filter(|e| e.is_due_for_retry(now, self.config.retry_base_delay_ms, self.config.retry_max_delay_ms))
            .take(self.config.batch_size as usize)
        {
            self.attempt(&mut event).await;
            self.events.update(&event).await?;
            retried += 1;
        }

        Ok(retried)
    }

    async fn attempt(&self, event: &mut WebhookEvent) {
        let policy = RetryPolicy::with_max_attempts(1);
        let started = std::time::Instant::now();
        let event_type = event.payload.get("status").and_then(|v| v.as_str()).unwrap_or("unknown");
        let outcome = policy
            .execute(|| async {
                let response = self
                    .client
                    .post(&event.url)
                    .header("X-Webhook-Event", format!("job.{event_type}"))
                    .header("X-Job-Id", event.job_id.to_string())
                    .json(&event.payload)
                    .send()
                    .await
                    .map_err(|e| e.to_string())?;
                let status = response.status();
                if status.is_success() {
                    Ok(status.as_u16())
                } else {
                    Err(format!("webhook endpoint returned {status}"))
                }
            })
            .await;
        WebhookMetrics::attempt(&event.job_type, started.elapsed());

        match outcome {
            Ok(status_code) => {
                if let Err(error) = event.record_success(status_code) {
                    warn!(%error, "record_success rejected a successful dispatch");
                }
                info!(webhook_event_id = %event.id, job_id = %event.job_id, "webhook delivered");
            }
            Err(message) => {
                event.record_failure(None, message);
                if event.status.is_terminal() {
                    WebhookMetrics::exhausted(&event.job_type);
                }
                warn!(
                    webhook_event_id = %event.id,
                    job_id = %event.job_id,
                    attempts = event.attempts,
                    "webhook delivery failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use schedulerd_core::{Page, PageRequest, WebhookEventId};
    use serde_json::json;
    use std::collections::HashMap;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct FakeEvents {
        rows: Mutex<HashMap<WebhookEventId, WebhookEvent>>,
    }

    #[async_trait]
    impl WebhookEventRepository for FakeEvents {
        async fn find_by_id(&self, id: WebhookEventId) -> SchedulerResult<Option<WebhookEvent>> {
            Ok(self.rows.lock().get(&id).cloned())
        }
        async fn find_all(&self, _page: PageRequest) -> SchedulerResult<Page<WebhookEvent>> {
            unimplemented!()
        }
        async fn find_retry_candidates(&self) -> SchedulerResult<Vec<WebhookEvent>> {
            Ok(self.rows.lock().values().filter(|e| !e.status.is_terminal()).cloned().collect())
        }
        async fn save(&self, event: &WebhookEvent) -> SchedulerResult<WebhookEvent> {
            self.rows.lock().insert(event.id, event.clone());
            Ok(event.clone())
        }
        async fn update(&self, event: &WebhookEvent) -> SchedulerResult<WebhookEvent> {
            self.rows.lock().insert(event.id, event.clone());
            Ok(event.clone())
        }
    }

    fn sample_job(webhook_url: String) -> Job {
        let mut job = Job::new("t".into(), "echo".into(), json!({"x": 1}), schedulerd_core::Priority::Normal);
        job.webhook_url = Some(webhook_url);
        job.mark_queued().unwrap();
        job.mark_processing(schedulerd_core::WorkerId::new()).unwrap();
        job.mark_completed(json!({"ok": true})).unwrap();
        job
    }

    #[tokio::test]
    async fn successful_delivery_marks_the_outbox_entry_succeeded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("X-Webhook-Event", "job.completed"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let events = Arc::new(FakeEvents::default());
        let pipeline = WebhookPipeline::new(events.clone(), WebhookConfig::default()).unwrap();

        let job = sample_job(format!("{}/hook", server.uri()));
        pipeline.notify(&job).await.unwrap();

        let stored = events.rows.lock().values().next().cloned().unwrap();
        assert_eq!(stored.status, schedulerd_core::WebhookStatus::Success);
        assert_eq!(stored.attempts, 1);
    }

    #[tokio::test]
    async fn failed_delivery_is_retried_by_the_sweep_once_due() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).and(path("/hook")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

        let events = Arc::new(FakeEvents::default());
        let config = WebhookConfig { retry_base_delay_ms: 0, ..WebhookConfig::default() };
        let pipeline = WebhookPipeline::new(events.clone(), config).unwrap();

        let job = sample_job(format!("{}/hook", server.uri()));
        pipeline.notify(&job).await.unwrap();

        let after_first = events.rows.lock().values().next().cloned().unwrap();
        assert_eq!(after_first.status, schedulerd_core::WebhookStatus::Retrying);
        assert_eq!(after_first.attempts, 1);

        let retried = pipeline.sweep_once().await.unwrap();
        assert_eq!(retried, 1);

        let after_sweep = events.rows.lock().values().next().cloned().unwrap();
        assert_eq!(after_sweep.attempts, 2);
    }

    #[tokio::test]
    async fn job_without_webhook_url_is_a_no_op() {
        let events = Arc::new(FakeEvents::default());
        let pipeline = WebhookPipeline::new(events.clone(), WebhookConfig::default()).unwrap();
        let mut job = Job::new("t".into(), "echo".into(), json!({}), schedulerd_core::Priority::Normal);
        job.mark_queued().unwrap();

        pipeline.notify(&job).await.unwrap();
        assert!(events.rows.lock().is_empty());
    }
}
