//! Postgres-backed `JobRepository`.

use crate::row::{parse_job_status, parse_priority};
use crate::{DatabasePoolInterface, JobRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schedulerd_core::{Job, JobId, JobStatus, Page, PageRequest, SchedulerError, SchedulerResult, ScheduleId, WorkerId};
use shaku::Component;
use sqlx::FromRow;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct JobRow {
    id: Uuid,
    name: String,
    job_type: String,
    payload: serde_json::Value,
    priority: String,
    scheduled_at: Option<DateTime<Utc>>,
    schedule_id: Option<Uuid>,
    max_retries: i32,
    retry_delay_ms: i64,
    retry_count: i32,
    status: String,
    worker_id: Option<Uuid>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    result: Option<serde_json::Value>,
    error: Option<String>,
    webhook_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = SchedulerError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            id: JobId::from(row.id),
            name: row.name,
            job_type: row.job_type,
            payload: row.payload,
            priority: parse_priority(&row.priority)?,
            scheduled_at: row.scheduled_at,
            schedule_id: row.schedule_id.map(ScheduleId::from),
            max_retries: row.max_retries as u32,
            retry_delay_ms: row.retry_delay_ms as u64,
            retry_count: row.retry_count as u32,
            status: parse_job_status(&row.status)?,
            worker_id: row.worker_id.map(WorkerId::from),
            started_at: row.started_at,
            completed_at: row.completed_at,
            result: row.result,
            error: row.error,
            webhook_url: row.webhook_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Postgres `JobRepository` implementation.
#[derive(Component)]
#[shaku(interface = JobRepository)]
pub struct PostgresJobRepository {
    #[shaku(inject)]
    pool: Arc<dyn DatabasePoolInterface>,
}

impl PostgresJobRepository {
    #[must_use]
    pub fn new(pool: Arc<dyn DatabasePoolInterface>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for PostgresJobRepository {
    async fn find_by_id(&self, id: JobId) -> SchedulerResult<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
            .bind(id.into_inner())
            .fetch_optional(self.pool.inner())
            .await?;
        row.map(Job::try_from).transpose()
    }

    async fn find_all(&self, page: PageRequest) -> SchedulerResult<Page<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM jobs ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pool.inner())
        .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(self.pool.inner())
            .await?;
        let jobs = rows.into_iter().map(Job::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(jobs, page.page, page.size, total as u64))
    }

    async fn find_by_status(&self, status: JobStatus, page: PageRequest) -> SchedulerResult<Page<Job>> {
        let status_str = status.to_string();
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM jobs WHERE status = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(&status_str)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pool.inner())
        .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = $1")
            .bind(&status_str)
            .fetch_one(self.pool.inner())
            .await?;
        let jobs = rows.into_iter().map(Job::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(jobs, page.page, page.size, total as u64))
    }

    async fn find_processing_by_worker_ids(&self, worker_ids: &[WorkerId]) -> SchedulerResult<Vec<Job>> {
        if worker_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = worker_ids.iter().map(|id| id.into_inner()).collect();
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM jobs WHERE status = 'processing' AND worker_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(self.pool.inner())
        .await?;
        rows.into_iter().map(Job::try_from).collect()
    }

    async fn save(&self, job: &Job) -> SchedulerResult<Job> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO jobs (
                id, name, job_type, payload, priority, scheduled_at, schedule_id,
                max_retries, retry_delay_ms, retry_count, status, worker_id,
                started_at, completed_at, result, error, webhook_url, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            RETURNING *
            "#,
        )
        .bind(job.id.into_inner())
        .bind(&job.name)
        .bind(&job.job_type)
        .bind(&job.payload)
        .bind(job.priority.as_str())
        .bind(job.scheduled_at)
        .bind(job.schedule_id.map(ScheduleId::into_inner))
        .bind(job.max_retries as i32)
        .bind(job.retry_delay_ms as i64)
        .bind(job.retry_count as i32)
        .bind(job.status.to_string())
        .bind(job.worker_id.map(WorkerId::into_inner))
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(&job.result)
        .bind(&job.error)
        .bind(&job.webhook_url)
        .bind(job.created_at)
        .bind(job.updated_at)
        .fetch_one(self.pool.inner())
        .await?;
        Job::try_from(row)
    }

    async fn update(&self, job: &Job) -> SchedulerResult<Job> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs SET
                status = $2, retry_count = $3, worker_id = $4, started_at = $5,
                completed_at = $6, result = $7, error = $8, updated_at = $9
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(job.id.into_inner())
        .bind(job.status.to_string())
        .bind(job.retry_count as i32)
        .bind(job.worker_id.map(WorkerId::into_inner))
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(&job.result)
        .bind(&job.error)
        .bind(job.updated_at)
        .fetch_optional(self.pool.inner())
        .await?
        .ok_or_else(|| SchedulerError::not_found("Job", job.id))?;
        Job::try_from(row)
    }

    async fn update_if_owned(&self, job: &Job, expected_worker_id: WorkerId) -> SchedulerResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET
                status = $2, retry_count = $3, worker_id = $4, started_at = $5,
                completed_at = $6, result = $7, error = $8, updated_at = $9
            WHERE id = $1 AND status = 'processing' AND worker_id = $10
            "#,
        )
        .bind(job.id.into_inner())
        .bind(job.status.to_string())
        .bind(job.retry_count as i32)
        .bind(job.worker_id.map(WorkerId::into_inner))
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(&job.result)
        .bind(&job.error)
        .bind(job.updated_at)
        .bind(expected_worker_id.into_inner())
        .execute(self.pool.inner())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn count_by_status(&self, status: JobStatus) -> SchedulerResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = $1")
            .bind(status.to_string())
            .fetch_one(self.pool.inner())
            .await?;
        Ok(count as u64)
    }
}
