//! # Scheduler Domain
//!
//! Domain entities and value objects for the job scheduler service.
//! This module contains the core business concepts of the application:
//! jobs, schedules, workers, dead letters, and webhook events.

pub mod entities;
pub mod value_objects;

pub use entities::*;
pub use value_objects::*;
