//! WebhookEvent entity — the outbox entry for one outbound notification.

use crate::{Entity, JobId, SchedulerError, WebhookEventId, WebhookStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outbox record for a single job-completion notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: WebhookEventId,
    pub job_id: JobId,
    pub job_type: String,
    pub url: String,

    /// Frozen at creation time — the exact body that gets POSTed.
    pub payload: Value,

    pub status: WebhookStatus,
    pub attempts: u32,
    pub max_attempts: u32,

    pub last_status_code: Option<u16>,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl WebhookEvent {
    /// Creates a new pending outbox entry, `max_attempts` defaulting to 3 per §4.6.
    #[must_use]
    pub fn new(job_id: JobId, job_type: String, url: String, payload: Value, max_attempts: u32) -> Self {
        Self {
            id: WebhookEventId::new(),
            job_id,
            job_type,
            url,
            payload,
            status: WebhookStatus::Pending,
            attempts: 0,
            max_attempts,
            last_status_code: None,
            last_error: None,
            last_attempt_at: None,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    /// Checks whether a next attempt is eligible given the backoff predicate from §4.6:
    /// `next_attempt_at = last_attempt_at + base_delay_ms * 2^attempts`, capped at `cap_ms`.
    #[must_use]
    pub fn is_due_for_retry(&self, now: DateTime<Utc>, base_delay_ms: u64, cap_ms: u64) -> bool {
        if self.status.is_terminal() || self.attempts >= self.max_attempts {
            return false;
        }
        let Some(last) = self.last_attempt_at else {
            return true;
        };
        let delay_ms = base_delay_ms.saturating_mul(2u64.saturating_pow(self.attempts)).min(cap_ms);
        now >= last + chrono::Duration::milliseconds(delay_ms as i64)
    }

    /// Records a successful delivery (HTTP 2xx).
    pub fn record_success(&mut self, status_code: u16) -> Result<(), SchedulerError> {
        if !(200..300).contains(&status_code) {
            return Err(SchedulerError::internal(format!(
                "record_success called with a non-2xx status code {status_code}"
            )));
        }
        let now = Utc::now();
        self.status = WebhookStatus::Success;
        self.attempts += 1;
        self.last_status_code = Some(status_code);
        self.last_error = None;
        self.last_attempt_at = Some(now);
        self.completed_at = Some(now);
        Ok(())
    }

    /// Records a failed attempt (non-2xx, timeout, or transport error), transitioning
    /// to `failed` once `attempts` reaches `max_attempts`.
    pub fn record_failure(&mut self, status_code: Option<u16>, error: String) {
        self.attempts += 1;
        self.last_status_code = status_code;
        self.last_error = Some(error);
        self.last_attempt_at = Some(Utc::now());
        self.status = if self.attempts >= self.max_attempts {
            self.completed_at = Some(Utc::now());
            WebhookStatus::Failed
        } else {
            WebhookStatus::Retrying
        };
    }
}

impl Entity<WebhookEventId> for WebhookEvent {
    fn id(&self) -> &WebhookEventId {
        &self.id
    }
}
