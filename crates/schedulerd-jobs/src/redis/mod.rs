//! Redis connection pool and key builder backing the Queue Manager (C3).

mod queue_manager;

pub use queue_manager::RedisQueueManager;

use deadpool_redis::{Config, Pool, Runtime};
use schedulerd_config::RedisConfig;
use schedulerd_core::SchedulerError;
use tracing::info;

/// Creates a Redis connection pool for the queue index.
pub async fn create_pool(config: &RedisConfig) -> Result<Pool, SchedulerError> {
    info!("Creating Redis connection pool for the queue index...");

    let cfg = Config::from_url(&config.url);
    let pool = cfg
        .builder()
        .map_err(|e| SchedulerError::Configuration(format!("invalid Redis config: {e}")))?
        .max_size(config.pool_size as usize)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| SchedulerError::Configuration(format!("failed to build Redis pool: {e}")))?;

    let mut conn = pool.get().await.map_err(|e| SchedulerError::Cache(e.to_string()))?;
    redis::cmd("PING").query_async::<String>(&mut *conn).await?;

    info!("Redis connection pool created successfully");
    Ok(pool)
}

/// Redis key builder for the queue index (C2).
pub struct RedisKeys {
    prefix: String,
}

impl RedisKeys {
    /// Creates a new key builder with the given prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// The `ready` index: a sorted set of job ids scored by priority-adjusted timestamp.
    pub fn ready(&self) -> String {
        format!("{}:ready", self.prefix)
    }

    /// The `delayed` index: a sorted set of `"jobId:priority"` scored by fire time.
    pub fn delayed(&self) -> String {
        format!("{}:delayed", self.prefix)
    }

    /// The `processing` index: a hash mapping job id to `{workerId, startedAt}`.
    pub fn processing(&self) -> String {
        format!("{}:processing", self.prefix)
    }

    /// The `deadletter` index: a sorted set of structured members, scored by failure time.
    pub fn deadletter(&self) -> String {
        format!("{}:deadletter", self.prefix)
    }

    /// Scheduler leader-election lock key (optional extension, §9 Open Question 2).
    pub fn scheduler_lock(&self) -> String {
        format!("{}:scheduler:lock", self.prefix)
    }
}

impl Default for RedisKeys {
    fn default() -> Self {
        Self::new("scheduler")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_shapes() {
        let keys = RedisKeys::new("test");
        assert_eq!(keys.ready(), "test:ready");
        assert_eq!(keys.delayed(), "test:delayed");
        assert_eq!(keys.processing(), "test:processing");
        assert_eq!(keys.deadletter(), "test:deadletter");
    }
}
