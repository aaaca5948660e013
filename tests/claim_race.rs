//! P1: at most one worker ever wins a given PageJob's claim, even under
//! concurrent contention, because the claim is a single conditional UPDATE
//! against a single-connection SQLite pool (spec.md §5, SPEC_FULL.md §8).

use std::sync::Arc;

use ocr_job_service::application::repos::{JobStore, NewPage};
use ocr_job_service::domain::types::FileType;
use ocr_job_service::infra::db::SqliteJobStore;
use uuid::Uuid;

async fn file_backed_store() -> (SqliteJobStore, std::path::PathBuf) {
    let path = std::env::temp_dir().join(format!("ocr_claim_race_{}.db", Uuid::new_v4()));
    let pool = SqliteJobStore::connect(path.to_str().unwrap()).await.unwrap();
    SqliteJobStore::run_migrations(&pool).await.unwrap();
    (SqliteJobStore::new(pool), path)
}

#[tokio::test]
async fn exactly_one_worker_wins_the_claim() {
    let (store, path) = file_backed_store().await;
    let store: Arc<dyn JobStore> = Arc::new(store);

    let job = store
        .create_job_with_pages(
            "contended.png",
            FileType::Image,
            vec![NewPage {
                page_number: 1,
                image_data: b"fake-png".to_vec(),
            }],
        )
        .await
        .unwrap();
    let page_jobs = store.list_page_jobs(job.id).await.unwrap();
    let page_job_id = page_jobs[0].id;

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.claim_page_job(page_job_id, &format!("worker-{i}")).await.unwrap()
        }));
    }

    let mut wins = 0;
    for handle in handles {
        if handle.await.unwrap() {
            wins += 1;
        }
    }

    assert_eq!(wins, 1, "exactly one concurrent claim must succeed");

    let _ = std::fs::remove_file(&path);
}
