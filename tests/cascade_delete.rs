//! P4: deleting a Job removes every one of its PageJobs (spec.md §7), via
//! the migration's `ON DELETE CASCADE` plus a per-connection
//! `PRAGMA foreign_keys = ON`.

use ocr_job_service::application::repos::{JobStore, NewPage};
use ocr_job_service::domain::types::FileType;
use ocr_job_service::infra::db::SqliteJobStore;
use uuid::Uuid;

#[tokio::test]
async fn deleting_a_job_cascades_to_its_page_jobs() {
    let path = std::env::temp_dir().join(format!("ocr_cascade_{}.db", Uuid::new_v4()));
    let pool = SqliteJobStore::connect(path.to_str().unwrap()).await.unwrap();
    SqliteJobStore::run_migrations(&pool).await.unwrap();
    let store = SqliteJobStore::new(pool);

    let job = store
        .create_job_with_pages(
            "doc.pdf",
            FileType::Pdf,
            vec![
                NewPage {
                    page_number: 1,
                    image_data: b"page-one".to_vec(),
                },
                NewPage {
                    page_number: 2,
                    image_data: b"page-two".to_vec(),
                },
            ],
        )
        .await
        .unwrap();

    assert_eq!(store.list_page_jobs(job.id).await.unwrap().len(), 2);

    let deleted = store.delete_job(job.id).await.unwrap();
    assert!(deleted);

    assert!(store.list_page_jobs(job.id).await.unwrap().is_empty());
    assert!(matches!(store.get_job(job.id).await, Err(_)));

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn deleting_an_unknown_job_reports_false() {
    let path = std::env::temp_dir().join(format!("ocr_cascade_missing_{}.db", Uuid::new_v4()));
    let pool = SqliteJobStore::connect(path.to_str().unwrap()).await.unwrap();
    SqliteJobStore::run_migrations(&pool).await.unwrap();
    let store = SqliteJobStore::new(pool);

    let deleted = store.delete_job(Uuid::new_v4()).await.unwrap();
    assert!(!deleted);

    let _ = std::fs::remove_file(&path);
}
