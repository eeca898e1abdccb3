//! Handler registry — maps `Job::job_type` to the code that executes it.

use async_trait::async_trait;
use parking_lot::RwLock;
use schedulerd_core::{Job, SchedulerError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Result of a single handler invocation.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The job completed; `Job::mark_completed` is called with this payload.
    Success(Value),
    /// A recoverable failure — eligible for the job's normal retry/backoff.
    TransientError(String),
    /// An unrecoverable failure — routed directly to the dead-letter queue,
    /// bypassing any remaining retry budget.
    PermanentError(String),
}

/// Executes the work described by a job's payload.
///
/// Implementations are registered under a `job_type` key and invoked by the
/// Job Processor (C4) once a job is claimed. Handlers do not touch the
/// Durable Store or Queue Manager directly — they receive the job, do the
/// work, and report an [`Outcome`].
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Executes the job, returning its outcome.
    async fn handle(&self, job: &Job) -> Outcome;
}

/// Concurrent map from `job_type` to its registered [`JobHandler`], built at
/// startup and shared read-only across worker slots.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<RwLock<HashMap<String, Arc<dyn JobHandler>>>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for `job_type`, replacing any existing one.
    pub fn register(&self, job_type: impl Into<String>, handler: Arc<dyn JobHandler>) {
        self.handlers.write().insert(job_type.into(), handler);
    }

    /// Looks up the handler for `job_type`.
    #[must_use]
    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.read().get(job_type).cloned()
    }

    /// Resolves the handler for a job, or a `PermanentError` outcome if none
    /// is registered — an unregistered `job_type` can never succeed on retry.
    pub fn resolve(&self, job: &Job) -> Result<Arc<dyn JobHandler>, Outcome> {
        self.get(&job.job_type).ok_or_else(|| {
            Outcome::PermanentError(format!("no handler registered for job_type '{}'", job.job_type))
        })
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry").field("job_types", &self.handlers.read().len()).finish()
    }
}

/// Adapts a plain async closure into a [`JobHandler`] — convenient for
/// registering simple handlers without a dedicated struct.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(&Job) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Outcome> + Send,
{
    async fn handle(&self, job: &Job) -> Outcome {
        (self.0)(job).await
    }
}

/// Converts an unregistered-handler lookup failure into a `SchedulerError`
/// for call sites that need a `SchedulerResult` rather than an `Outcome`.
pub fn unregistered_handler_error(job_type: &str) -> SchedulerError {
    SchedulerError::validation(format!("no handler registered for job_type '{job_type}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use schedulerd_core::Priority;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl JobHandler for Echo {
        async fn handle(&self, job: &Job) -> Outcome {
            Outcome::Success(job.payload.clone())
        }
    }

    #[tokio::test]
    async fn registers_and_resolves_by_job_type() {
        let registry = HandlerRegistry::new();
        registry.register("echo", Arc::new(Echo));

        let job = Job::new("t".into(), "echo".into(), json!({"x": 1}), Priority::Normal);
        let handler = registry.resolve(&job).ok().expect("handler should resolve");
        match handler.handle(&job).await {
            Outcome::Success(value) => assert_eq!(value, json!({"x": 1})),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn missing_handler_is_permanent() {
        let registry = HandlerRegistry::new();
        let job = Job::new("t".into(), "unknown".into(), json!({}), Priority::Normal);
        match registry.resolve(&job) {
            Err(Outcome::PermanentError(_)) => {}
            other => panic!("expected PermanentError, got {other:?}"),
        }
    }
}
