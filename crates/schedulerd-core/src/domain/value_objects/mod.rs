//! Value objects shared by the domain entities.

mod job_status;
mod priority;
mod webhook_status;
mod worker_status;

pub use job_status::JobStatus;
pub use priority::Priority;
pub use webhook_status::WebhookStatus;
pub use worker_status::WorkerStatus;
