//! Configuration validation module.
//!
//! Provides comprehensive validation for all configuration values,
//! failing fast on invalid configuration rather than at runtime.

use crate::SchedulerConfig;
use std::fmt;
use url::Url;

/// Configuration validation error variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    /// Pool size configuration is invalid (min must be <= max).
    InvalidPoolSize { min: u32, max: u32 },
    /// Pool size exceeds maximum allowed.
    PoolSizeTooLarge { value: u32, maximum: u32 },
    /// URL format is invalid.
    InvalidUrl { url_type: String, message: String },
    /// Sampling ratio must be between 0.0 and 1.0.
    InvalidSamplingRatio { value: f64 },
    /// Timeout or interval value must be positive.
    NonPositiveTimeout { name: String, value: u64 },
    /// Log level is invalid.
    InvalidLogLevel { value: String },
    /// Priority offsets are not strictly ascending from CRITICAL to LOW.
    PriorityOffsetsNotAscending,
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPoolSize { min, max } => {
                write!(
                    f,
                    "Invalid pool size: min ({}) cannot be greater than max ({})",
                    min, max
                )
            }
            Self::PoolSizeTooLarge { value, maximum } => {
                write!(f, "Pool size {} exceeds maximum allowed ({})", value, maximum)
            }
            Self::InvalidUrl { url_type, message } => {
                write!(f, "Invalid {} URL: {}", url_type, message)
            }
            Self::InvalidSamplingRatio { value } => {
                write!(f, "Invalid sampling ratio: {} (must be between 0.0 and 1.0)", value)
            }
            Self::NonPositiveTimeout { name, value } => {
                write!(f, "'{}' must be positive, got {}", name, value)
            }
            Self::InvalidLogLevel { value } => {
                write!(f, "Invalid log level: '{}' (valid: trace, debug, info, warn, error)", value)
            }
            Self::PriorityOffsetsNotAscending => {
                write!(f, "queue.priority_offsets must be strictly ascending from critical to low")
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Result of configuration validation containing all errors found.
#[derive(Debug)]
pub struct ValidationResult {
    errors: Vec<ConfigValidationError>,
}

impl ValidationResult {
    fn new() -> Self {
        Self { errors: Vec::new() }
    }

    fn add_error(&mut self, error: ConfigValidationError) {
        self.errors.push(error);
    }

    /// Returns true if validation passed (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the validation errors.
    pub fn errors(&self) -> &[ConfigValidationError] {
        &self.errors
    }

    /// Converts to Result, returning Err with all errors if any exist.
    pub fn into_result(self) -> Result<(), Vec<ConfigValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Maximum connection pool size (Postgres and Redis alike).
    const MAX_POOL_SIZE: u32 = 1000;
    /// Valid log levels.
    const VALID_LOG_LEVELS: &'static [&'static str] = &["trace", "debug", "info", "warn", "error"];

    /// Validates the entire application configuration.
    pub fn validate(config: &SchedulerConfig) -> Result<(), Vec<ConfigValidationError>> {
        let mut result = ValidationResult::new();

        Self::validate_database(&config.database, &mut result);
        Self::validate_redis(&config.redis, &mut result);
        Self::validate_worker(&config.worker, &mut result);
        Self::validate_queue(&config.queue, &mut result);
        Self::validate_scheduler_loop(&config.scheduler_loop, &mut result);
        Self::validate_orphan(&config.orphan, &mut result);
        Self::validate_webhook(&config.webhook, &mut result);
        Self::validate_observability(&config.observability, &mut result);

        result.into_result()
    }

    fn validate_database(config: &crate::DatabaseConfig, result: &mut ValidationResult) {
        if !config.url.is_empty()
            && !config.url.starts_with("postgres://")
            && !config.url.starts_with("postgresql://")
        {
            result.add_error(ConfigValidationError::InvalidUrl {
                url_type: "database".to_string(),
                message: "URL must start with postgres:// or postgresql://".to_string(),
            });
        }

        if config.min_connections > config.max_connections {
            result.add_error(ConfigValidationError::InvalidPoolSize {
                min: config.min_connections,
                max: config.max_connections,
            });
        }
        if config.max_connections > Self::MAX_POOL_SIZE {
            result.add_error(ConfigValidationError::PoolSizeTooLarge {
                value: config.max_connections,
                maximum: Self::MAX_POOL_SIZE,
            });
        }
        if config.connect_timeout_secs == 0 {
            result.add_error(ConfigValidationError::NonPositiveTimeout {
                name: "database.connect_timeout_secs".to_string(),
                value: 0,
            });
        }
        if config.idle_timeout_secs == 0 {
            result.add_error(ConfigValidationError::NonPositiveTimeout {
                name: "database.idle_timeout_secs".to_string(),
                value: 0,
            });
        }
    }

    fn validate_redis(config: &crate::RedisConfig, result: &mut ValidationResult) {
        if !config.enabled {
            return;
        }
        if !config.url.starts_with("redis://") && !config.url.starts_with("rediss://") {
            result.add_error(ConfigValidationError::InvalidUrl {
                url_type: "redis".to_string(),
                message: "URL must start with redis:// or rediss://".to_string(),
            });
        }
        if config.pool_size > Self::MAX_POOL_SIZE {
            result.add_error(ConfigValidationError::PoolSizeTooLarge {
                value: config.pool_size,
                maximum: Self::MAX_POOL_SIZE,
            });
        }
    }

    fn validate_worker(config: &crate::WorkerConfig, result: &mut ValidationResult) {
        if config.poll_interval_ms == 0 {
            result.add_error(ConfigValidationError::NonPositiveTimeout {
                name: "worker.poll_interval_ms".to_string(),
                value: 0,
            });
        }
        if config.heartbeat_interval_ms == 0 {
            result.add_error(ConfigValidationError::NonPositiveTimeout {
                name: "worker.heartbeat_interval_ms".to_string(),
                value: 0,
            });
        }
        if config.concurrency == 0 {
            result.add_error(ConfigValidationError::NonPositiveTimeout {
                name: "worker.concurrency".to_string(),
                value: 0,
            });
        }
    }

    fn validate_queue(config: &crate::QueueConfig, result: &mut ValidationResult) {
        use schedulerd_core::Priority;
        let offsets = &config.priority_offsets;
        let ordered: Option<Vec<f64>> = Priority::all()
            .iter()
            .map(|p| offsets.get(p.as_str()).copied())
            .collect();
        match ordered {
            Some(values) if values.windows(2).all(|w| w[0] < w[1]) => {}
            _ => result.add_error(ConfigValidationError::PriorityOffsetsNotAscending),
        }
    }

    fn validate_scheduler_loop(config: &crate::SchedulerLoopConfig, result: &mut ValidationResult) {
        if config.check_interval_ms == 0 {
            result.add_error(ConfigValidationError::NonPositiveTimeout {
                name: "scheduler_loop.check_interval_ms".to_string(),
                value: 0,
            });
        }
    }

    fn validate_orphan(config: &crate::OrphanConfig, result: &mut ValidationResult) {
        if config.check_interval_ms == 0 {
            result.add_error(ConfigValidationError::NonPositiveTimeout {
                name: "orphan.check_interval_ms".to_string(),
                value: 0,
            });
        }
        if config.stale_threshold_ms <= 0 {
            result.add_error(ConfigValidationError::NonPositiveTimeout {
                name: "orphan.stale_threshold_ms".to_string(),
                value: config.stale_threshold_ms.max(0) as u64,
            });
        }
    }

    fn validate_webhook(config: &crate::WebhookConfig, result: &mut ValidationResult) {
        if config.timeout_ms == 0 {
            result.add_error(ConfigValidationError::NonPositiveTimeout {
                name: "webhook.timeout_ms".to_string(),
                value: 0,
            });
        }
        if config.max_attempts == 0 {
            result.add_error(ConfigValidationError::NonPositiveTimeout {
                name: "webhook.max_attempts".to_string(),
                value: 0,
            });
        }
    }

    fn validate_observability(config: &crate::ObservabilityConfig, result: &mut ValidationResult) {
        let level = config.log_level.to_lowercase();
        if !Self::VALID_LOG_LEVELS.contains(&level.as_str()) {
            result.add_error(ConfigValidationError::InvalidLogLevel {
                value: config.log_level.clone(),
            });
        }
        if !(0.0..=1.0).contains(&config.sampling_ratio) {
            result.add_error(ConfigValidationError::InvalidSamplingRatio {
                value: config.sampling_ratio,
            });
        }
        if let Some(ref endpoint) = config.otlp_endpoint {
            if Url::parse(endpoint).is_err() {
                result.add_error(ConfigValidationError::InvalidUrl {
                    url_type: "otlp_endpoint".to_string(),
                    message: format!("Invalid URL format: {}", endpoint),
                });
            }
        }
    }
}

/// Formats validation errors for display.
pub fn format_validation_errors(errors: &[ConfigValidationError]) -> String {
    let mut output = String::from("Configuration validation failed:\n");
    for (i, error) in errors.iter().enumerate() {
        output.push_str(&format!("  {}. {}\n", i + 1, error));
    }
    output
}
