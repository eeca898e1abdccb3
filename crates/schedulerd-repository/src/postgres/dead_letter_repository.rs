//! Postgres-backed `DeadLetterRepository`.

use crate::row::parse_priority;
use crate::{DatabasePoolInterface, DeadLetterRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schedulerd_core::{DeadLetterId, DeadLetterJob, JobId, Page, PageRequest, SchedulerResult, WorkerId};
use shaku::Component;
use sqlx::FromRow;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct DeadLetterRow {
    id: Uuid,
    original_job_id: Uuid,
    job_name: String,
    job_type: String,
    job_payload: serde_json::Value,
    job_priority: String,
    failure_reason: String,
    failure_count: i32,
    last_error: String,
    error_stack: Option<String>,
    worker_id: Option<Uuid>,
    original_created_at: DateTime<Utc>,
    failed_at: DateTime<Utc>,
}

impl TryFrom<DeadLetterRow> for DeadLetterJob {
    type Error = schedulerd_core::SchedulerError;

    fn try_from(row: DeadLetterRow) -> Result<Self, Self::Error> {
        Ok(DeadLetterJob {
            id: DeadLetterId::from(row.id),
            original_job_id: JobId::from(row.original_job_id),
            job_name: row.job_name,
            job_type: row.job_type,
            job_payload: row.job_payload,
            job_priority: parse_priority(&row.job_priority)?,
            failure_reason: row.failure_reason,
            failure_count: row.failure_count as u32,
            last_error: row.last_error,
            error_stack: row.error_stack,
            worker_id: row.worker_id.map(WorkerId::from),
            original_created_at: row.original_created_at,
            failed_at: row.failed_at,
        })
    }
}

/// Postgres `DeadLetterRepository` implementation.
#[derive(Component)]
#[shaku(interface = DeadLetterRepository)]
pub struct PostgresDeadLetterRepository {
    #[shaku(inject)]
    pool: Arc<dyn DatabasePoolInterface>,
}

impl PostgresDeadLetterRepository {
    #[must_use]
    pub fn new(pool: Arc<dyn DatabasePoolInterface>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeadLetterRepository for PostgresDeadLetterRepository {
    async fn find_by_id(&self, id: DeadLetterId) -> SchedulerResult<Option<DeadLetterJob>> {
        let row = sqlx::query_as::<_, DeadLetterRow>("SELECT * FROM dead_letter_jobs WHERE id = $1")
            .bind(id.into_inner())
            .fetch_optional(self.pool.inner())
            .await?;
        row.map(DeadLetterJob::try_from).transpose()
    }

    async fn find_all(&self, page: PageRequest) -> SchedulerResult<Page<DeadLetterJob>> {
        let rows = sqlx::query_as::<_, DeadLetterRow>(
            "SELECT * FROM dead_letter_jobs ORDER BY failed_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pool.inner())
        .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dead_letter_jobs")
            .fetch_one(self.pool.inner())
            .await?;
        let entries = rows.into_iter().map(DeadLetterJob::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(entries, page.page, page.size, total as u64))
    }

    async fn save(&self, entry: &DeadLetterJob) -> SchedulerResult<DeadLetterJob> {
        let row = sqlx::query_as::<_, DeadLetterRow>(
            r#"
            INSERT INTO dead_letter_jobs (
                id, original_job_id, job_name, job_type, job_payload, job_priority,
                failure_reason, failure_count, last_error, error_stack, worker_id,
                original_created_at, failed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(entry.id.into_inner())
        .bind(entry.original_job_id.into_inner())
        .bind(&entry.job_name)
        .bind(&entry.job_type)
        .bind(&entry.job_payload)
        .bind(entry.job_priority.as_str())
        .bind(&entry.failure_reason)
        .bind(entry.failure_count as i32)
        .bind(&entry.last_error)
        .bind(&entry.error_stack)
        .bind(entry.worker_id.map(WorkerId::into_inner))
        .bind(entry.original_created_at)
        .bind(entry.failed_at)
        .fetch_one(self.pool.inner())
        .await?;
        DeadLetterJob::try_from(row)
    }

    async fn delete(&self, id: DeadLetterId) -> SchedulerResult<bool> {
        let result = sqlx::query("DELETE FROM dead_letter_jobs WHERE id = $1")
            .bind(id.into_inner())
            .execute(self.pool.inner())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_older_than(&self, before: DateTime<Utc>) -> SchedulerResult<u64> {
        let result = sqlx::query("DELETE FROM dead_letter_jobs WHERE failed_at < $1")
            .bind(before)
            .execute(self.pool.inner())
            .await?;
        Ok(result.rows_affected())
    }
}
