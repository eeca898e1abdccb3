//! Postgres-backed `WebhookEventRepository`.

use crate::row::parse_webhook_status;
use crate::{DatabasePoolInterface, WebhookEventRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schedulerd_core::{JobId, Page, PageRequest, SchedulerError, SchedulerResult, WebhookEvent, WebhookEventId};
use shaku::Component;
use sqlx::FromRow;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct WebhookEventRow {
    id: Uuid,
    job_id: Uuid,
    job_type: String,
    url: String,
    payload: serde_json::Value,
    status: String,
    attempts: i32,
    max_attempts: i32,
    last_status_code: Option<i32>,
    last_error: Option<String>,
    last_attempt_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<WebhookEventRow> for WebhookEvent {
    type Error = SchedulerError;

    fn try_from(row: WebhookEventRow) -> Result<Self, Self::Error> {
        Ok(WebhookEvent {
            id: WebhookEventId::from(row.id),
            job_id: JobId::from(row.job_id),
            job_type: row.job_type,
            url: row.url,
            payload: row.payload,
            status: parse_webhook_status(&row.status)?,
            attempts: row.attempts as u32,
            max_attempts: row.max_attempts as u32,
            last_status_code: row.last_status_code.map(|c| c as u16),
            last_error: row.last_error,
            last_attempt_at: row.last_attempt_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
        })
    }
}

/// Postgres `WebhookEventRepository` implementation.
#[derive(Component)]
#[shaku(interface = WebhookEventRepository)]
pub struct PostgresWebhookEventRepository {
    #[shaku(inject)]
    pool: Arc<dyn DatabasePoolInterface>,
}

impl PostgresWebhookEventRepository {
    #[must_use]
    pub fn new(pool: Arc<dyn DatabasePoolInterface>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WebhookEventRepository for PostgresWebhookEventRepository {
    async fn find_by_id(&self, id: WebhookEventId) -> SchedulerResult<Option<WebhookEvent>> {
        let row = sqlx::query_as::<_, WebhookEventRow>("SELECT * FROM webhook_events WHERE id = $1")
            .bind(id.into_inner())
            .fetch_optional(self.pool.inner())
            .await?;
        row.map(WebhookEvent::try_from).transpose()
    }

    async fn find_all(&self, page: PageRequest) -> SchedulerResult<Page<WebhookEvent>> {
        let rows = sqlx::query_as::<_, WebhookEventRow>(
            "SELECT * FROM webhook_events ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(self.pool.inner())
        .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM webhook_events")
            .fetch_one(self.pool.inner())
            .await?;
        let events = rows.into_iter().map(WebhookEvent::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(events, page.page, page.size, total as u64))
    }

    async fn find_retry_candidates(&self) -> SchedulerResult<Vec<WebhookEvent>> {
        let rows = sqlx::query_as::<_, WebhookEventRow>(
            "SELECT * FROM webhook_events WHERE status IN ('pending', 'retrying') AND attempts < max_attempts",
        )
        .fetch_all(self.pool.inner())
        .await?;
        rows.into_iter().map(WebhookEvent::try_from).collect()
    }

    async fn save(&self, event: &WebhookEvent) -> SchedulerResult<WebhookEvent> {
        let row = sqlx::query_as::<_, WebhookEventRow>(
            r#"
            INSERT INTO webhook_events (
                id, job_id, job_type, url, payload, status, attempts, max_attempts,
                last_status_code, last_error, last_attempt_at, completed_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(event.id.into_inner())
        .bind(event.job_id.into_inner())
        .bind(&event.job_type)
        .bind(&event.url)
        .bind(&event.payload)
        .bind(event.status.to_string())
        .bind(event.attempts as i32)
        .bind(event.max_attempts as i32)
        .bind(event.last_status_code.map(|c| c as i32))
        .bind(&event.last_error)
        .bind(event.last_attempt_at)
        .bind(event.completed_at)
        .bind(event.created_at)
        .fetch_one(self.pool.inner())
        .await?;
        WebhookEvent::try_from(row)
    }

    async fn update(&self, event: &WebhookEvent) -> SchedulerResult<WebhookEvent> {
        let row = sqlx::query_as::<_, WebhookEventRow>(
            r#"
            UPDATE webhook_events SET
                status = $2, attempts = $3, last_status_code = $4, last_error = $5,
                last_attempt_at = $6, completed_at = $7
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(event.id.into_inner())
        .bind(event.status.to_string())
        .bind(event.attempts as i32)
        .bind(event.last_status_code.map(|c| c as i32))
        .bind(&event.last_error)
        .bind(event.last_attempt_at)
        .bind(event.completed_at)
        .fetch_optional(self.pool.inner())
        .await?
        .ok_or_else(|| SchedulerError::not_found("WebhookEvent", event.id))?;
        WebhookEvent::try_from(row)
    }
}
