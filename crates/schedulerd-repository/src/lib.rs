//! # Scheduler Repository
//!
//! Durable Store (C1) access. One repository trait per domain entity, one
//! Postgres/SQLx implementation per trait — no DAO indirection layer, since
//! this service has a single backend to abstract over.
//!
//! ```text
//! Service
//!   ↓  Arc<dyn JobRepository>        (and friends — one trait per entity)
//! PostgresJobRepository              (SQLx against the Postgres durable store)
//!   ↓
//! Postgres
//! ```
//!
//! ```text
//! src/
//!   traits.rs   ← JobRepository, ScheduleRepository, WorkerRepository,
//!                 DeadLetterRepository, WebhookEventRepository
//!   row.rs      ← shared TEXT-column <-> domain enum parsing
//!   pool.rs     ← DatabasePool / DatabasePoolInterface (PgPool)
//!   postgres/   ← one file per trait implementation
//! ```

pub mod pool;
pub mod postgres;
pub mod row;
pub mod traits;

pub use pool::*;
pub use postgres::*;
pub use traits::*;
