//! Redis-backed Queue Manager (C3) — realizes `ready`/`delayed`/`deadletter`
//! as sorted sets and `processing` as a hash, per SPEC_FULL.md §4.1.

use super::RedisKeys;
use crate::queue_manager::{QueueManager, QueueStats};
use async_trait::async_trait;
use chrono::Utc;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use schedulerd_core::{JobId, Priority, SchedulerError, SchedulerResult, WorkerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

/// Value stored in the `processing` hash.
#[derive(Serialize, Deserialize)]
struct ProcessingEntry {
    worker_id: WorkerId,
    started_at: i64,
}

/// Member stored in the `deadletter` sorted set.
#[derive(Serialize, Deserialize)]
struct DeadLetterMember {
    job_id: JobId,
    reason: String,
    failed_at: i64,
}

/// Member stored in the `delayed` sorted set — `"jobId:priority"`.
fn delayed_member(job_id: JobId, priority: Priority) -> String {
    format!("{job_id}:{}", priority.as_str())
}

fn parse_delayed_member(member: &str) -> Option<(JobId, Priority)> {
    let (id_part, priority_part) = member.split_once(':')?;
    let job_id = JobId::parse(id_part).ok()?;
    let priority = match priority_part {
        "critical" => Priority::Critical,
        "high" => Priority::High,
        "normal" => Priority::Normal,
        "low" => Priority::Low,
        _ => return None,
    };
    Some((job_id, priority))
}

/// Redis-backed implementation of the Queue Manager.
pub struct RedisQueueManager {
    pool: Pool,
    keys: RedisKeys,
    priority_offsets: HashMap<String, f64>,
}

impl RedisQueueManager {
    /// Creates a new Queue Manager over the given pool, key prefix, and
    /// priority-offset table (`QueueConfig::priority_offsets`).
    #[must_use]
    pub fn new(pool: Pool, key_prefix: impl Into<String>, priority_offsets: HashMap<String, f64>) -> Self {
        Self { pool, keys: RedisKeys::new(key_prefix), priority_offsets }
    }

    async fn conn(&self) -> SchedulerResult<deadpool_redis::Connection> {
        self.pool.get().await.map_err(|e| SchedulerError::Cache(e.to_string()))
    }

    fn offset(&self, priority: Priority) -> f64 {
        self.priority_offsets.get(priority.as_str()).copied().unwrap_or_else(|| priority.score_offset())
    }

    fn ready_score(&self, priority: Priority, at_ms: i64) -> f64 {
        at_ms as f64 + self.offset(priority)
    }
}

#[async_trait]
impl QueueManager for RedisQueueManager {
    #[instrument(skip(self), fields(job_id = %job_id))]
    async fn enqueue(&self, job_id: JobId, priority: Priority) -> SchedulerResult<()> {
        let mut conn = self.conn().await?;
        let score = self.ready_score(priority, Utc::now().timestamp_millis());
        let _: () = conn.zadd(self.keys.ready(), job_id.to_string(), score).await?;
        debug!(priority = %priority, "enqueued job");
        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %job_id))]
    async fn enqueue_delayed(
        &self,
        job_id: JobId,
        fire_at: chrono::DateTime<Utc>,
        priority: Priority,
    ) -> SchedulerResult<()> {
        let mut conn = self.conn().await?;
        let member = delayed_member(job_id, priority);
        let _: () = conn.zadd(self.keys.delayed(), member, fire_at.timestamp_millis() as f64).await?;
        debug!(fire_at = %fire_at, "enqueued delayed job");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn dequeue(&self) -> SchedulerResult<Option<JobId>> {
        let mut conn = self.conn().await?;
        let popped: Vec<(String, f64)> = conn.zpopmin(self.keys.ready(), 1).await?;
        let Some((member, _score)) = popped.into_iter().next() else {
            return Ok(None);
        };
        match JobId::parse(&member) {
            Ok(id) => Ok(Some(id)),
            Err(_) => {
                warn!(member = %member, "dropped malformed ready-index member");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self))]
    async fn promote_delayed(&self) -> SchedulerResult<u64> {
        let mut conn = self.conn().await?;
        let now = Utc::now().timestamp_millis();

        let due: Vec<String> = conn.zrangebyscore(self.keys.delayed(), 0i64, now).await?;
        let mut promoted = 0u64;

        for member in due {
            let Some((job_id, priority)) = parse_delayed_member(&member) else {
                warn!(member = %member, "dropped malformed delayed-index member");
                let _: i64 = conn.zrem(self.keys.delayed(), &member).await?;
                continue;
            };
            let score = self.ready_score(priority, now);
            let _: () = redis::pipe()
                .zrem(self.keys.delayed(), &member)
                .zadd(self.keys.ready(), job_id.to_string(), score)
                .query_async(&mut *conn)
                .await?;
            promoted += 1;
        }

        if promoted > 0 {
            debug!(count = promoted, "promoted delayed jobs");
        }
        Ok(promoted)
    }

    #[instrument(skip(self), fields(job_id = %job_id, worker_id = %worker_id))]
    async fn mark_processing(&self, job_id: JobId, worker_id: WorkerId) -> SchedulerResult<()> {
        let mut conn = self.conn().await?;
        let entry = ProcessingEntry { worker_id, started_at: Utc::now().timestamp_millis() };
        let value = serde_json::to_string(&entry)?;
        let _: () = conn.hset(self.keys.processing(), job_id.to_string(), value).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %job_id))]
    async fn mark_completed(&self, job_id: JobId) -> SchedulerResult<()> {
        let mut conn = self.conn().await?;
        let _: i64 = conn.hdel(self.keys.processing(), job_id.to_string()).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %job_id))]
    async fn requeue(&self, job_id: JobId, priority: Priority, delay_ms: u64) -> SchedulerResult<()> {
        let mut conn = self.conn().await?;
        let fire_at_ms = Utc::now().timestamp_millis() + delay_ms as i64;
        let member = delayed_member(job_id, priority);
        let _: () = redis::pipe()
            .hdel(self.keys.processing(), job_id.to_string())
            .zadd(self.keys.delayed(), member, fire_at_ms as f64)
            .query_async(&mut *conn)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %job_id))]
    async fn move_to_dlq(&self, job_id: JobId, reason: &str) -> SchedulerResult<()> {
        let mut conn = self.conn().await?;
        let now = Utc::now().timestamp_millis();
        let member = DeadLetterMember { job_id, reason: reason.to_string(), failed_at: now };
        let value = serde_json::to_string(&member)?;
        let _: () = redis::pipe()
            .hdel(self.keys.processing(), job_id.to_string())
            .zadd(self.keys.deadletter(), value, now as f64)
            .query_async(&mut *conn)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %job_id))]
    async fn remove_from_dlq(&self, job_id: JobId) -> SchedulerResult<()> {
        let mut conn = self.conn().await?;
        let members: Vec<String> = conn.zrange(self.keys.deadletter(), 0, -1).await?;
        let matching: Vec<String> = members
            .into_iter()
            .filter(|m| {
                serde_json::from_str::<DeadLetterMember>(m).is_ok_and(|entry| entry.job_id == job_id)
            })
            .collect();

        if matching.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for member in &matching {
            pipe.zrem(self.keys.deadletter(), member);
        }
        let _: () = pipe.query_async(&mut *conn).await.map_err(SchedulerError::from)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stats(&self) -> SchedulerResult<QueueStats> {
        let mut conn = self.conn().await?;
        let (ready, delayed, processing, deadletter): (u64, u64, u64, u64) = redis::pipe()
            .zcard(self.keys.ready())
            .zcard(self.keys.delayed())
            .hlen(self.keys.processing())
            .zcard(self.keys.deadletter())
            .query_async(&mut *conn)
            .await?;
        Ok(QueueStats { ready, delayed, processing, deadletter })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delayed_member_round_trips() {
        let id = JobId::new();
        let member = delayed_member(id, Priority::High);
        let (parsed_id, parsed_priority) = parse_delayed_member(&member).unwrap();
        assert_eq!(parsed_id, id);
        assert_eq!(parsed_priority, Priority::High);
    }

    #[test]
    fn malformed_delayed_member_is_rejected() {
        assert!(parse_delayed_member("not-a-uuid:high").is_none());
        assert!(parse_delayed_member(&format!("{}:bogus", JobId::new())).is_none());
    }
}
