//! Domain entities.

mod dead_letter_job;
mod job;
mod schedule;
mod webhook_event;
mod worker;

pub use dead_letter_job::DeadLetterJob;
pub use job::Job;
pub use schedule::Schedule;
pub use webhook_event::WebhookEvent;
pub use worker::Worker;
