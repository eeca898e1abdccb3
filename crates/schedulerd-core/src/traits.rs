//! Core traits shared by the repository and job-processing layers.

use crate::{Page, PageRequest, SchedulerResult};
use async_trait::async_trait;

/// Base repository trait for CRUD operations.
///
/// Defines the standard operations every Durable Store repository
/// implements, following the Repository pattern.
#[async_trait]
pub trait Repository<T, ID>: Send + Sync
where
    T: Send + Sync,
    ID: Send + Sync,
{
    /// Finds an entity by its ID.
    async fn find_by_id(&self, id: &ID) -> SchedulerResult<Option<T>>;

    /// Finds all entities with pagination.
    async fn find_all(&self, page: PageRequest) -> SchedulerResult<Page<T>>;

    /// Saves a new entity.
    async fn save(&self, entity: &T) -> SchedulerResult<T>;

    /// Updates an existing entity.
    async fn update(&self, entity: &T) -> SchedulerResult<T>;

    /// Deletes an entity by its ID.
    async fn delete(&self, id: &ID) -> SchedulerResult<bool>;

    /// Checks if an entity exists by its ID.
    async fn exists(&self, id: &ID) -> SchedulerResult<bool>;

    /// Counts all entities.
    async fn count(&self) -> SchedulerResult<u64>;
}

/// Marker trait for service-layer components.
pub trait Service: Send + Sync {}

/// Trait for entities with a unique identifier.
pub trait Entity<ID> {
    /// Returns the entity's unique identifier.
    fn id(&self) -> &ID;
}

/// Trait for health checks.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Returns the name of this health check.
    fn name(&self) -> &str;

    /// Performs the health check.
    async fn check(&self) -> HealthStatus;
}

/// Health check status — matches the three readiness states in SPEC_FULL.md §6.
#[derive(Debug, Clone)]
pub enum HealthStatus {
    /// The component is healthy.
    Healthy,
    /// The component is degraded but functional (e.g. no active worker).
    Degraded(String),
    /// The component is unhealthy (DB or KV unreachable).
    Unhealthy(String),
}

impl HealthStatus {
    /// Returns true if the status is healthy.
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// Returns true if the status is unhealthy.
    #[must_use]
    pub const fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}
