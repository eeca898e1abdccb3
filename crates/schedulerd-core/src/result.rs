//! Result type aliases for the job scheduler service.

use crate::SchedulerError;

/// A specialized `Result` type for Scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// A boxed future returning an `SchedulerResult`.
pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = SchedulerResult<T>> + Send + 'a>>;
