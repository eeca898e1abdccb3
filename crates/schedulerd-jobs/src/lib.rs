//! # Scheduler Jobs
//!
//! The queue index (C2 client), job processor (C4), worker (C5), schedule
//! executor (C6), orphan recovery (C7) and webhook pipeline (C8) of the job
//! scheduler service.
//!
//! ```text
//! ┌────────────┐   enqueue/dequeue   ┌──────────────┐
//! │  Schedule  │ ───────────────────▶│    Queue     │◀──── Worker (C5)
//! │  Executor  │                     │   Manager    │        │
//! │    (C6)    │                     │    (C3)      │        ▼
//! └────────────┘                     └──────────────┘   Job Processor (C4)
//!        │                                  ▲                 │
//!        ▼                                  │                 ├──▶ Webhook Pipeline (C8)
//!   schedulerd-repository (C1, Postgres) ◀──┴── Orphan Recovery (C7)
//! ```
//!
//! Every long-running role above is its own cooperative task group built on
//! `tokio::sync::broadcast` shutdown signals and `tokio::select!`, the same
//! idiom used throughout this crate.

pub mod handler;
pub mod health;
pub mod metrics;
pub mod orphan;
pub mod processor;
pub mod queue_manager;
pub mod redis;
pub mod scheduler;
pub mod webhook;
pub mod worker;

pub use handler::{HandlerRegistry, JobHandler, Outcome};
pub use health::readiness;
pub use orphan::OrphanRecovery;
pub use processor::JobProcessor;
pub use queue_manager::{QueueManager, QueueStats};
pub use redis::{create_pool, RedisKeys, RedisQueueManager};
pub use scheduler::ScheduleExecutor;
pub use webhook::WebhookPipeline;
pub use worker::Worker;

/// Commonly used types, re-exported for downstream binaries.
pub mod prelude {
    pub use crate::{
        HandlerRegistry, JobHandler, JobProcessor, Outcome, QueueManager, QueueStats,
        RedisQueueManager, ScheduleExecutor, Worker,
    };
    pub use schedulerd_core::{Job, JobId, JobStatus, Priority, SchedulerError, SchedulerResult};
}
