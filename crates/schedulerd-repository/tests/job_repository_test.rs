mod common;

use common::TestDatabase;
use schedulerd_core::{Job, JobStatus, PageRequest, Priority, WorkerId};
use schedulerd_repository::{JobRepository, PostgresJobRepository};
use serde_json::json;

fn sample_job() -> Job {
    Job::new("send-email".into(), "email".into(), json!({"to": "a@example.com"}), Priority::High)
}

#[tokio::test]
async fn save_and_find_by_id() {
    let db = TestDatabase::new().await;
    let repo = PostgresJobRepository::new(db.pool());

    let job = sample_job();
    repo.save(&job).await.unwrap();

    let found = repo.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(found.name, "send-email");
    assert_eq!(found.priority, Priority::High);
    assert_eq!(found.status, JobStatus::Pending);
}

#[tokio::test]
async fn find_by_id_missing_returns_none() {
    let db = TestDatabase::new().await;
    let repo = PostgresJobRepository::new(db.pool());

    assert!(repo.find_by_id(schedulerd_core::JobId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn update_persists_status_transition() {
    let db = TestDatabase::new().await;
    let repo = PostgresJobRepository::new(db.pool());

    let mut job = sample_job();
    repo.save(&job).await.unwrap();

    job.mark_queued().unwrap();
    job.mark_processing(WorkerId::new()).unwrap();
    repo.update(&job).await.unwrap();

    let found = repo.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(found.status, JobStatus::Processing);
    assert!(found.worker_id.is_some());
}

#[tokio::test]
async fn find_by_status_filters_correctly() {
    let db = TestDatabase::new().await;
    let repo = PostgresJobRepository::new(db.pool());

    let pending = sample_job();
    repo.save(&pending).await.unwrap();

    let mut queued = sample_job();
    queued.mark_queued().unwrap();
    repo.save(&queued).await.unwrap();

    let page = repo.find_by_status(JobStatus::Queued, PageRequest::first()).await.unwrap();
    assert_eq!(page.content.len(), 1);
    assert_eq!(page.content[0].id, queued.id);
}

#[tokio::test]
async fn find_processing_by_worker_ids_pushes_predicate_to_sql() {
    let db = TestDatabase::new().await;
    let repo = PostgresJobRepository::new(db.pool());

    let worker = WorkerId::new();
    let mut job = sample_job();
    job.mark_queued().unwrap();
    job.mark_processing(worker).unwrap();
    repo.save(&job).await.unwrap();

    let other_job = sample_job();
    repo.save(&other_job).await.unwrap();

    let found = repo.find_processing_by_worker_ids(&[worker]).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, job.id);

    let empty = repo.find_processing_by_worker_ids(&[]).await.unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn count_by_status() {
    let db = TestDatabase::new().await;
    let repo = PostgresJobRepository::new(db.pool());

    repo.save(&sample_job()).await.unwrap();
    repo.save(&sample_job()).await.unwrap();

    assert_eq!(repo.count_by_status(JobStatus::Pending).await.unwrap(), 2);
    assert_eq!(repo.count_by_status(JobStatus::Completed).await.unwrap(), 0);
}
