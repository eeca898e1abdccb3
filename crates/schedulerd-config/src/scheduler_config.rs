//! Configuration structures for the scheduler service.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration for the scheduler service.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SchedulerConfig {
    /// Application metadata.
    #[serde(default)]
    pub app: AppMetadata,

    /// Durable store (C1) configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Queue index (C2) configuration.
    #[serde(default)]
    pub redis: RedisConfig,

    /// Worker (C5) loop configuration.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Queue Manager (C3) configuration.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Schedule Executor (C6) configuration.
    #[serde(default)]
    pub scheduler_loop: SchedulerLoopConfig,

    /// Orphan Recovery (C7) configuration.
    #[serde(default)]
    pub orphan: OrphanConfig,

    /// Webhook Pipeline (C8) configuration.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Application metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppMetadata {
    /// Application name.
    #[serde(default = "default_app_name")]
    pub name: String,
    /// Application version.
    #[serde(default = "default_app_version")]
    pub version: String,
    /// Environment (development, staging, production).
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_app_name() -> String {
    "job-scheduler".to_string()
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
            environment: default_environment(),
        }
    }
}

/// Durable store (C1 / Postgres) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Minimum connection pool size.
    #[serde(default = "default_db_min_connections")]
    pub min_connections: u32,
    /// Maximum connection pool size.
    #[serde(default = "default_db_max_connections")]
    pub max_connections: u32,
    /// Connection acquisition timeout in seconds.
    #[serde(default = "default_db_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds.
    #[serde(default = "default_db_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Log every SQL statement at debug level.
    #[serde(default)]
    pub log_queries: bool,
}

fn default_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_default()
}

fn default_db_min_connections() -> u32 {
    5
}

fn default_db_max_connections() -> u32 {
    20
}

fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn default_db_idle_timeout_secs() -> u64 {
    600
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            min_connections: default_db_min_connections(),
            max_connections: default_db_max_connections(),
            connect_timeout_secs: default_db_connect_timeout_secs(),
            idle_timeout_secs: default_db_idle_timeout_secs(),
            log_queries: false,
        }
    }
}

impl DatabaseConfig {
    /// Returns the connect timeout as a Duration.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Returns the idle timeout as a Duration.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Queue index (C2 / Redis) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Connection pool size.
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: u32,
    /// Enable Redis (can be disabled for local development against a stub).
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            enabled: true,
        }
    }
}

/// Worker (C5) loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Idle sleep between dequeue attempts when the queue is empty.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Interval between worker heartbeat writes.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Interval between delayed-job promotion sweeps.
    #[serde(default = "default_promote_interval_ms")]
    pub promote_interval_ms: u64,
    /// Number of independent processing slots per worker process.
    #[serde(default = "default_worker_concurrency")]
    pub concurrency: u32,
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_promote_interval_ms() -> u64 {
    5_000
}

fn default_worker_concurrency() -> u32 {
    1
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            promote_interval_ms: default_promote_interval_ms(),
            concurrency: default_worker_concurrency(),
        }
    }
}

impl WorkerConfig {
    /// Returns the poll interval as a Duration.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns the heartbeat interval as a Duration.
    #[must_use]
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Returns the delayed-job promotion interval as a Duration.
    #[must_use]
    pub const fn promote_interval(&self) -> Duration {
        Duration::from_millis(self.promote_interval_ms)
    }
}

/// Queue Manager (C3) configuration: priority scoring and retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Priority-band offsets in milliseconds, added to the enqueue timestamp
    /// to compute the ready-index score. Keyed by `Priority::as_str()`.
    /// Treated as effectively immutable at runtime: changing it after jobs
    /// have been scored under the old offsets breaks FIFO-within-band for
    /// jobs already in the `ready` index.
    #[serde(default = "default_priority_offsets")]
    pub priority_offsets: HashMap<String, f64>,
    /// How long a dead-lettered job is retained before it is eligible for
    /// operator-driven pruning.
    #[serde(default = "default_dead_letter_retention_days")]
    pub dead_letter_retention_days: u32,
}

fn default_priority_offsets() -> HashMap<String, f64> {
    use schedulerd_core::Priority;
    Priority::all()
        .iter()
        .map(|p| (p.as_str().to_string(), p.score_offset()))
        .collect()
}

fn default_dead_letter_retention_days() -> u32 {
    30
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            priority_offsets: default_priority_offsets(),
            dead_letter_retention_days: default_dead_letter_retention_days(),
        }
    }
}

/// Schedule Executor (C6) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerLoopConfig {
    /// Interval between due-schedule sweeps.
    #[serde(default = "default_scheduler_check_interval_ms")]
    pub check_interval_ms: u64,
}

fn default_scheduler_check_interval_ms() -> u64 {
    10_000
}

impl Default for SchedulerLoopConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: default_scheduler_check_interval_ms(),
        }
    }
}

impl SchedulerLoopConfig {
    /// Returns the check interval as a Duration.
    #[must_use]
    pub const fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

/// Orphan Recovery (C7) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrphanConfig {
    /// Interval between stale-worker sweeps.
    #[serde(default = "default_orphan_check_interval_ms")]
    pub check_interval_ms: u64,
    /// A worker is considered dead once its heartbeat has aged past this.
    #[serde(default = "default_stale_threshold_ms")]
    pub stale_threshold_ms: i64,
    /// Delay before a recovered job becomes eligible to run again.
    #[serde(default = "default_recovery_delay_ms")]
    pub recovery_delay_ms: u64,
}

fn default_orphan_check_interval_ms() -> u64 {
    60_000
}

fn default_stale_threshold_ms() -> i64 {
    90_000
}

fn default_recovery_delay_ms() -> u64 {
    5_000
}

impl Default for OrphanConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: default_orphan_check_interval_ms(),
            stale_threshold_ms: default_stale_threshold_ms(),
            recovery_delay_ms: default_recovery_delay_ms(),
        }
    }
}

impl OrphanConfig {
    /// Returns the sweep interval as a Duration.
    #[must_use]
    pub const fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

/// Webhook Pipeline (C8) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Per-request HTTP timeout.
    #[serde(default = "default_webhook_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum delivery attempts before an event is marked `failed`.
    #[serde(default = "default_webhook_max_attempts")]
    pub max_attempts: u32,
    /// Base delay for the retry processor's exponential backoff.
    #[serde(default = "default_webhook_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Cap on the retry processor's exponential backoff.
    #[serde(default = "default_webhook_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    /// Maximum events claimed per retry-processor sweep.
    #[serde(default = "default_webhook_batch_size")]
    pub batch_size: u32,
}

fn default_webhook_timeout_ms() -> u64 {
    10_000
}

fn default_webhook_max_attempts() -> u32 {
    3
}

fn default_webhook_base_delay_ms() -> u64 {
    5_000
}

fn default_webhook_max_delay_ms() -> u64 {
    300_000
}

fn default_webhook_batch_size() -> u32 {
    50
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_webhook_timeout_ms(),
            max_attempts: default_webhook_max_attempts(),
            retry_base_delay_ms: default_webhook_base_delay_ms(),
            retry_max_delay_ms: default_webhook_max_delay_ms(),
            batch_size: default_webhook_batch_size(),
        }
    }
}

impl WebhookConfig {
    /// Returns the per-request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log format (json, pretty).
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Enable the OpenTelemetry tracing layer.
    #[serde(default = "default_true")]
    pub tracing_enabled: bool,

    /// Service name for distributed tracing.
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// OTLP endpoint URL (e.g., "http://localhost:4317").
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    /// Sampling ratio for traces (0.0 to 1.0).
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_service_name() -> String {
    "job-scheduler".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            tracing_enabled: true,
            service_name: default_service_name(),
            otlp_endpoint: None,
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

impl ObservabilityConfig {
    /// Converts to the telemetry crate's own config type.
    #[must_use]
    pub fn to_telemetry_config(&self) -> schedulerd_core::telemetry::TelemetryConfig {
        schedulerd_core::telemetry::TelemetryConfig {
            enabled: self.tracing_enabled && self.otlp_endpoint.is_some(),
            service_name: self.service_name.clone(),
            otlp_endpoint: self.otlp_endpoint.clone(),
            sampling_ratio: self.sampling_ratio,
            console_output: self.log_format == "pretty",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = SchedulerConfig::default();
        assert_eq!(config.worker.concurrency, 1);
        assert_eq!(config.orphan.stale_threshold_ms, 90_000);
        assert_eq!(config.webhook.max_attempts, 3);
    }

    #[test]
    fn priority_offsets_are_strictly_ascending_with_decreasing_priority() {
        use schedulerd_core::Priority;
        let offsets = default_priority_offsets();
        assert!(offsets[Priority::Critical.as_str()] < offsets[Priority::High.as_str()]);
        assert!(offsets[Priority::High.as_str()] < offsets[Priority::Normal.as_str()]);
        assert!(offsets[Priority::Normal.as_str()] < offsets[Priority::Low.as_str()]);
    }

    #[test]
    fn database_url_falls_back_to_empty_string() {
        let config = DatabaseConfig::default();
        assert!(config.url.is_empty() || config.url.starts_with("postgres"));
    }

    #[test]
    fn durations_convert_correctly() {
        let worker = WorkerConfig::default();
        assert_eq!(worker.heartbeat_interval(), Duration::from_secs(30));
    }
}
