mod common;

use chrono::{Duration, Utc};
use common::TestDatabase;
use schedulerd_core::{Priority, Schedule};
use schedulerd_repository::{PostgresScheduleRepository, ScheduleRepository};
use serde_json::json;

fn sample_schedule(next_run_at: chrono::DateTime<Utc>) -> Schedule {
    Schedule::new(
        "nightly-report".into(),
        "0 9 * * *".into(),
        "UTC".into(),
        "report".into(),
        json!({}),
        Priority::Normal,
        next_run_at,
    )
}

#[tokio::test]
async fn save_and_find_by_id() {
    let db = TestDatabase::new().await;
    let repo = PostgresScheduleRepository::new(db.pool());

    let schedule = sample_schedule(Utc::now() + Duration::minutes(1));
    repo.save(&schedule).await.unwrap();

    let found = repo.find_by_id(schedule.id).await.unwrap().unwrap();
    assert_eq!(found.name, "nightly-report");
    assert!(found.enabled);
}

#[tokio::test]
async fn find_due_only_returns_enabled_past_due_schedules() {
    let db = TestDatabase::new().await;
    let repo = PostgresScheduleRepository::new(db.pool());

    let due = sample_schedule(Utc::now() - Duration::seconds(5));
    repo.save(&due).await.unwrap();

    let not_due = sample_schedule(Utc::now() + Duration::hours(1));
    repo.save(&not_due).await.unwrap();

    let mut disabled = sample_schedule(Utc::now() - Duration::seconds(5));
    disabled.disable();
    repo.save(&disabled).await.unwrap();

    let results = repo.find_due(Utc::now()).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, due.id);
}

#[tokio::test]
async fn update_persists_firing_bookkeeping() {
    let db = TestDatabase::new().await;
    let repo = PostgresScheduleRepository::new(db.pool());

    let mut schedule = sample_schedule(Utc::now() + Duration::seconds(1));
    repo.save(&schedule).await.unwrap();

    let now = Utc::now();
    schedule.record_firing(now, now + Duration::hours(1)).unwrap();
    repo.update(&schedule).await.unwrap();

    let found = repo.find_by_id(schedule.id).await.unwrap().unwrap();
    assert_eq!(found.run_count, 1);
    assert!(found.last_run_at.is_some());
}

#[tokio::test]
async fn delete_removes_schedule() {
    let db = TestDatabase::new().await;
    let repo = PostgresScheduleRepository::new(db.pool());

    let schedule = sample_schedule(Utc::now() + Duration::minutes(1));
    repo.save(&schedule).await.unwrap();

    assert!(repo.delete(schedule.id).await.unwrap());
    assert!(repo.find_by_id(schedule.id).await.unwrap().is_none());
    assert!(!repo.delete(schedule.id).await.unwrap());
}
