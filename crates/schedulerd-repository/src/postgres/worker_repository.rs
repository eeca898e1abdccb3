//! Postgres-backed `WorkerRepository`.

use crate::row::parse_worker_status;
use crate::{DatabasePoolInterface, WorkerRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schedulerd_core::{Page, PageRequest, SchedulerError, SchedulerResult, Worker, WorkerId};
use shaku::Component;
use sqlx::FromRow;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct WorkerRow {
    id: Uuid,
    name: String,
    hostname: String,
    pid: i64,
    status: String,
    concurrency: i32,
    active_jobs: i32,
    processed_count: i64,
    failed_count: i64,
    last_heartbeat: DateTime<Utc>,
    started_at: DateTime<Utc>,
    stopped_at: Option<DateTime<Utc>>,
}

impl TryFrom<WorkerRow> for Worker {
    type Error = SchedulerError;

    fn try_from(row: WorkerRow) -> Result<Self, Self::Error> {
        Ok(Worker {
            id: WorkerId::from(row.id),
            name: row.name,
            hostname: row.hostname,
            pid: row.pid as u32,
            status: parse_worker_status(&row.status)?,
            concurrency: row.concurrency as u32,
            active_jobs: row.active_jobs as u32,
            processed_count: row.processed_count as u64,
            failed_count: row.failed_count as u64,
            last_heartbeat: row.last_heartbeat,
            started_at: row.started_at,
            stopped_at: row.stopped_at,
        })
    }
}

/// Postgres `WorkerRepository` implementation.
#[derive(Component)]
#[shaku(interface = WorkerRepository)]
pub struct PostgresWorkerRepository {
    #[shaku(inject)]
    pool: Arc<dyn DatabasePoolInterface>,
}

impl PostgresWorkerRepository {
    #[must_use]
    pub fn new(pool: Arc<dyn DatabasePoolInterface>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkerRepository for PostgresWorkerRepository {
    async fn find_by_id(&self, id: WorkerId) -> SchedulerResult<Option<Worker>> {
        let row = sqlx::query_as::<_, WorkerRow>("SELECT * FROM workers WHERE id = $1")
            .bind(id.into_inner())
            .fetch_optional(self.pool.inner())
            .await?;
        row.map(Worker::try_from).transpose()
    }

    async fn find_all(&self, page: PageRequest) -> SchedulerResult<Page<Worker>> {
        let rows = sqlx::query_as::<_, WorkerRow>(
            "SELECT * FROM workers ORDER BY started_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pool.inner())
        .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM workers")
            .fetch_one(self.pool.inner())
            .await?;
        let workers = rows.into_iter().map(Worker::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(workers, page.page, page.size, total as u64))
    }

    async fn find_stale(&self, now: DateTime<Utc>, stale_threshold_ms: i64) -> SchedulerResult<Vec<Worker>> {
        let cutoff = now - chrono::Duration::milliseconds(stale_threshold_ms);
        let rows = sqlx::query_as::<_, WorkerRow>(
            "SELECT * FROM workers WHERE status = 'active' AND last_heartbeat < $1",
        )
        .bind(cutoff)
        .fetch_all(self.pool.inner())
        .await?;
        rows.into_iter().map(Worker::try_from).collect()
    }

    async fn save(&self, worker: &Worker) -> SchedulerResult<Worker> {
        let row = sqlx::query_as::<_, WorkerRow>(
            r#"
            INSERT INTO workers (
                id, name, hostname, pid, status, concurrency, active_jobs,
                processed_count, failed_count, last_heartbeat, started_at, stopped_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(worker.id.into_inner())
        .bind(&worker.name)
        .bind(&worker.hostname)
        .bind(worker.pid as i64)
        .bind(worker.status.to_string())
        .bind(worker.concurrency as i32)
        .bind(worker.active_jobs as i32)
        .bind(worker.processed_count as i64)
        .bind(worker.failed_count as i64)
        .bind(worker.last_heartbeat)
        .bind(worker.started_at)
        .bind(worker.stopped_at)
        .fetch_one(self.pool.inner())
        .await?;
        Worker::try_from(row)
    }

    async fn update(&self, worker: &Worker) -> SchedulerResult<Worker> {
        let row = sqlx::query_as::<_, WorkerRow>(
            r#"
            UPDATE workers SET
                status = $2, active_jobs = $3, processed_count = $4, failed_count = $5,
                last_heartbeat = $6, stopped_at = $7
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(worker.id.into_inner())
        .bind(worker.status.to_string())
        .bind(worker.active_jobs as i32)
        .bind(worker.processed_count as i64)
        .bind(worker.failed_count as i64)
        .bind(worker.last_heartbeat)
        .bind(worker.stopped_at)
        .fetch_optional(self.pool.inner())
        .await?
        .ok_or_else(|| SchedulerError::not_found("Worker", worker.id))?;
        Worker::try_from(row)
    }

    async fn count_active(&self) -> SchedulerResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM workers WHERE status != 'stopped'")
            .fetch_one(self.pool.inner())
            .await?;
        Ok(count as u64)
    }
}
