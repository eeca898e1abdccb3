//! Schedule entity — a recurring job template.

use crate::{Entity, Priority, ScheduleId, SchedulerError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

/// A recurring job template driven by a cron rule.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Schedule {
    pub id: ScheduleId,

    #[validate(length(min = 1, max = 255))]
    pub name: String,

    /// Five-field cron expression (minute hour dom month dow).
    #[validate(custom(function = "crate::validation::rules::valid_cron_expression"))]
    pub cron_expr: String,

    /// IANA timezone name, e.g. `"America/New_York"`.
    #[validate(length(min = 1))]
    pub timezone: String,

    pub enabled: bool,

    pub job_type: String,
    pub job_payload: Value,
    pub job_priority: Priority,

    /// Null iff `enabled = false`.
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub run_count: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    /// Creates a new enabled schedule. `next_run_at` must be computed by the
    /// caller (the Schedule Executor owns cron evaluation) and passed in.
    #[must_use]
    pub fn new(
        name: String,
        cron_expr: String,
        timezone: String,
        job_type: String,
        job_payload: Value,
        job_priority: Priority,
        next_run_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ScheduleId::new(),
            name,
            cron_expr,
            timezone,
            enabled: true,
            job_type,
            job_payload,
            job_priority,
            next_run_at: Some(next_run_at),
            last_run_at: None,
            run_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Disables the schedule, clearing its firing state per invariant (a).
    pub fn disable(&mut self) {
        self.enabled = false;
        self.next_run_at = None;
        self.updated_at = Utc::now();
    }

    /// Re-enables the schedule with a freshly computed `next_run_at`.
    pub fn enable(&mut self, next_run_at: DateTime<Utc>) {
        self.enabled = true;
        self.next_run_at = Some(next_run_at);
        self.updated_at = Utc::now();
    }

    /// Checks if the schedule is due to fire at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run_at.is_some_and(|t| t <= now)
    }

    /// Records one firing: advances `last_run_at`/`run_count` and sets the new `next_run_at`.
    ///
    /// `next_run_at` must already satisfy "strictly after `fired_at`" — the
    /// caller (the cron evaluator) is responsible for that guarantee.
    pub fn record_firing(&mut self, fired_at: DateTime<Utc>, next_run_at: DateTime<Utc>) -> Result<(), SchedulerError> {
        if next_run_at <= fired_at {
            return Err(SchedulerError::internal(
                "next_run_at must be strictly after the firing instant",
            ));
        }
        self.last_run_at = Some(fired_at);
        self.next_run_at = Some(next_run_at);
        self.run_count += 1;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Advances `next_run_at` without incrementing `run_count`, used when job
    /// creation for this firing failed (§4.4 step 3: "skip one over replay storm").
    pub fn skip_firing(&mut self, next_run_at: DateTime<Utc>) {
        self.next_run_at = Some(next_run_at);
        self.updated_at = Utc::now();
    }
}

impl Entity<ScheduleId> for Schedule {
    fn id(&self) -> &ScheduleId {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn sample() -> Schedule {
        let next = Utc::now() + Duration::minutes(1);
        Schedule::new(
            "nightly-report".into(),
            "0 9 * * *".into(),
            "UTC".into(),
            "report".into(),
            json!({}),
            Priority::Normal,
            next,
        )
    }

    #[test]
    fn disable_clears_next_run_at() {
        let mut s = sample();
        s.disable();
        assert!(!s.enabled);
        assert!(s.next_run_at.is_none());
    }

    #[test]
    fn is_due_respects_enabled_and_time() {
        let mut s = sample();
        assert!(!s.is_due(Utc::now()));
        s.next_run_at = Some(Utc::now() - Duration::seconds(1));
        assert!(s.is_due(Utc::now()));
        s.disable();
        assert!(!s.is_due(Utc::now()));
    }

    #[test]
    fn record_firing_rejects_non_advancing_next_run() {
        let mut s = sample();
        let now = Utc::now();
        assert!(s.record_firing(now, now).is_err());
        assert!(s.record_firing(now, now - Duration::seconds(1)).is_err());
    }

    #[test]
    fn record_firing_increments_run_count() {
        let mut s = sample();
        let now = Utc::now();
        s.record_firing(now, now + Duration::minutes(1)).unwrap();
        assert_eq!(s.run_count, 1);
        assert_eq!(s.last_run_at, Some(now));
    }

    #[test]
    fn skip_firing_does_not_increment_run_count() {
        let mut s = sample();
        let next = Utc::now() + Duration::minutes(5);
        s.skip_firing(next);
        assert_eq!(s.run_count, 0);
        assert_eq!(s.next_run_at, Some(next));
    }
}
