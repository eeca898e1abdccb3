//! Postgres (SQLx) repository implementations.

mod dead_letter_repository;
mod job_repository;
mod schedule_repository;
mod webhook_event_repository;
mod worker_repository;

pub use dead_letter_repository::PostgresDeadLetterRepository;
pub use job_repository::PostgresJobRepository;
pub use schedule_repository::PostgresScheduleRepository;
pub use webhook_event_repository::PostgresWebhookEventRepository;
pub use worker_repository::PostgresWorkerRepository;
