mod common;

use chrono::{Duration, Utc};
use common::TestDatabase;
use schedulerd_core::{DeadLetterJob, Job, Priority};
use schedulerd_repository::{DeadLetterRepository, PostgresDeadLetterRepository};
use serde_json::json;

fn sample_entry() -> DeadLetterJob {
    let mut job = Job::new("send-email".into(), "email".into(), json!({}), Priority::High);
    job.retry_count = 3;
    job.error = Some("smtp timeout".into());
    DeadLetterJob::from_job(&job, "retries exhausted".into(), None)
}

#[tokio::test]
async fn save_and_find_by_id() {
    let db = TestDatabase::new().await;
    let repo = PostgresDeadLetterRepository::new(db.pool());

    let entry = sample_entry();
    repo.save(&entry).await.unwrap();

    let found = repo.find_by_id(entry.id).await.unwrap().unwrap();
    assert_eq!(found.job_name, "send-email");
    assert_eq!(found.failure_count, 4);
}

#[tokio::test]
async fn delete_removes_entry() {
    let db = TestDatabase::new().await;
    let repo = PostgresDeadLetterRepository::new(db.pool());

    let entry = sample_entry();
    repo.save(&entry).await.unwrap();

    assert!(repo.delete(entry.id).await.unwrap());
    assert!(repo.find_by_id(entry.id).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_older_than_applies_retention_cutoff() {
    let db = TestDatabase::new().await;
    let repo = PostgresDeadLetterRepository::new(db.pool());

    let mut old_entry = sample_entry();
    old_entry.failed_at = Utc::now() - Duration::days(40);
    repo.save(&old_entry).await.unwrap();

    let recent_entry = sample_entry();
    repo.save(&recent_entry).await.unwrap();

    let deleted = repo.delete_older_than(Utc::now() - Duration::days(30)).await.unwrap();
    assert_eq!(deleted, 1);
    assert!(repo.find_by_id(old_entry.id).await.unwrap().is_none());
    assert!(repo.find_by_id(recent_entry.id).await.unwrap().is_some());
}
