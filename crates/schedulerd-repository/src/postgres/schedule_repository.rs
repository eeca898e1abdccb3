//! Postgres-backed `ScheduleRepository`.

use crate::row::parse_priority;
use crate::{DatabasePoolInterface, ScheduleRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schedulerd_core::{Page, PageRequest, Schedule, ScheduleId, SchedulerError, SchedulerResult};
use shaku::Component;
use sqlx::FromRow;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct ScheduleRow {
    id: Uuid,
    name: String,
    cron_expr: String,
    timezone: String,
    enabled: bool,
    job_type: String,
    job_payload: serde_json::Value,
    job_priority: String,
    next_run_at: Option<DateTime<Utc>>,
    last_run_at: Option<DateTime<Utc>>,
    run_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ScheduleRow> for Schedule {
    type Error = SchedulerError;

    fn try_from(row: ScheduleRow) -> Result<Self, Self::Error> {
        Ok(Schedule {
            id: ScheduleId::from(row.id),
            name: row.name,
            cron_expr: row.cron_expr,
            timezone: row.timezone,
            enabled: row.enabled,
            job_type: row.job_type,
            job_payload: row.job_payload,
            job_priority: parse_priority(&row.job_priority)?,
            next_run_at: row.next_run_at,
            last_run_at: row.last_run_at,
            run_count: row.run_count as u64,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Postgres `ScheduleRepository` implementation.
#[derive(Component)]
#[shaku(interface = ScheduleRepository)]
pub struct PostgresScheduleRepository {
    #[shaku(inject)]
    pool: Arc<dyn DatabasePoolInterface>,
}

impl PostgresScheduleRepository {
    #[must_use]
    pub fn new(pool: Arc<dyn DatabasePoolInterface>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScheduleRepository for PostgresScheduleRepository {
    async fn find_by_id(&self, id: ScheduleId) -> SchedulerResult<Option<Schedule>> {
        let row = sqlx::query_as::<_, ScheduleRow>("SELECT * FROM schedules WHERE id = $1")
            .bind(id.into_inner())
            .fetch_optional(self.pool.inner())
            .await?;
        row.map(Schedule::try_from).transpose()
    }

    async fn find_all(&self, page: PageRequest) -> SchedulerResult<Page<Schedule>> {
        let rows = sqlx::query_as::<_, ScheduleRow>(
            "SELECT * FROM schedules ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pool.inner())
        .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schedules")
            .fetch_one(self.pool.inner())
            .await?;
        let schedules = rows.into_iter().map(Schedule::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(schedules, page.page, page.size, total as u64))
    }

    async fn find_due(&self, now: DateTime<Utc>) -> SchedulerResult<Vec<Schedule>> {
        let rows = sqlx::query_as::<_, ScheduleRow>(
            "SELECT * FROM schedules WHERE enabled = true AND next_run_at <= $1 ORDER BY next_run_at ASC",
        )
        .bind(now)
        .fetch_all(self.pool.inner())
        .await?;
        rows.into_iter().map(Schedule::try_from).collect()
    }

    async fn save(&self, schedule: &Schedule) -> SchedulerResult<Schedule> {
        let row = sqlx::query_as::<_, ScheduleRow>(
            r#"
            INSERT INTO schedules (
                id, name, cron_expr, timezone, enabled, job_type, job_payload,
                job_priority, next_run_at, last_run_at, run_count, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(schedule.id.into_inner())
        .bind(&schedule.name)
        .bind(&schedule.cron_expr)
        .bind(&schedule.timezone)
        .bind(schedule.enabled)
        .bind(&schedule.job_type)
        .bind(&schedule.job_payload)
        .bind(schedule.job_priority.as_str())
        .bind(schedule.next_run_at)
        .bind(schedule.last_run_at)
        .bind(schedule.run_count as i64)
        .bind(schedule.created_at)
        .bind(schedule.updated_at)
        .fetch_one(self.pool.inner())
        .await?;
        Schedule::try_from(row)
    }

    async fn update(&self, schedule: &Schedule) -> SchedulerResult<Schedule> {
        let row = sqlx::query_as::<_, ScheduleRow>(
            r#"
            UPDATE schedules SET
                enabled = $2, next_run_at = $3, last_run_at = $4, run_count = $5, updated_at = $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(schedule.id.into_inner())
        .bind(schedule.enabled)
        .bind(schedule.next_run_at)
        .bind(schedule.last_run_at)
        .bind(schedule.run_count as i64)
        .bind(schedule.updated_at)
        .fetch_optional(self.pool.inner())
        .await?
        .ok_or_else(|| SchedulerError::not_found("Schedule", schedule.id))?;
        Schedule::try_from(row)
    }

    async fn delete(&self, id: ScheduleId) -> SchedulerResult<bool> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = $1")
            .bind(id.into_inner())
            .execute(self.pool.inner())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
