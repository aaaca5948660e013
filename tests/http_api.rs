//! Exercises the HTTP surface end to end: submit a job, poll its status,
//! fetch its result once a worker completes it, list it, then delete it
//! (spec.md §6, §8 scenarios 1-3).

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use ocr_job_service::application::backend::{OcrBackend, OcrError};
use ocr_job_service::application::ingest::IngestService;
use ocr_job_service::application::pool::WorkerPool;
use ocr_job_service::application::query::QueryService;
use ocr_job_service::application::rasterize::PassthroughRasterizer;
use ocr_job_service::infra::db::SqliteJobStore;
use ocr_job_service::infra::http::{ApiState, router};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

struct EchoBackend;

#[async_trait]
impl OcrBackend for EchoBackend {
    async fn process_image(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
        Ok("# Heading\n\nsome body text".to_string())
    }
}

async fn test_app() -> (axum::Router, std::path::PathBuf, Arc<WorkerPool>) {
    let path = std::env::temp_dir().join(format!("ocr_http_api_{}.db", Uuid::new_v4()));
    let pool = SqliteJobStore::connect(path.to_str().unwrap()).await.unwrap();
    SqliteJobStore::run_migrations(&pool).await.unwrap();
    let store: Arc<dyn ocr_job_service::application::repos::JobStore> =
        Arc::new(SqliteJobStore::new(pool));

    let ingest = Arc::new(IngestService::new(
        store.clone(),
        Arc::new(PassthroughRasterizer),
        50,
    ));
    let worker_pool = Arc::new(WorkerPool::new(store.clone(), Arc::new(EchoBackend), false));
    let query = Arc::new(QueryService::new(store, worker_pool.clone(), path.to_str().unwrap()));
    worker_pool.start(1).await;

    (router(ApiState { ingest, query }, 50 * 1024 * 1024), path, worker_pool)
}

fn multipart_body(filename: &str, bytes: &[u8]) -> (String, Body) {
    let boundary = "ocrtestboundary";
    let mut payload = Vec::new();
    payload.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    payload.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    payload.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    payload.extend_from_slice(bytes);
    payload.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (
        format!("multipart/form-data; boundary={boundary}"),
        Body::from(payload),
    )
}

#[tokio::test]
async fn submit_then_poll_status_and_result() {
    let (app, db_path, worker_pool) = test_app().await;

    let (content_type, body) = multipart_body("page.png", b"not-really-a-png");
    let request = Request::builder()
        .method("POST")
        .uri("/ocr/submit")
        .header(header::CONTENT_TYPE, content_type)
        .body(body)
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
    let job_id = body["job_id"].as_str().unwrap().to_string();
    assert_eq!(body["total_pages"], 1);

    // Give the single worker a moment to drain the one queued page.
    for _ in 0..20 {
        let request = Request::builder()
            .uri(format!("/ocr/status/{job_id}"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let body: Value =
            serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
        if body["status"] == "completed" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }

    let request = Request::builder()
        .uri(format!("/ocr/result/{job_id}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body["status"], "completed");
    assert_eq!(body["sections"][0]["heading"], "Heading");

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/ocr/jobs/{job_id}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    worker_pool.stop().await;
    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn status_for_an_unknown_job_is_not_found() {
    let (app, db_path, worker_pool) = test_app().await;

    let request = Request::builder()
        .uri(format!("/ocr/status/{}", Uuid::new_v4()))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    worker_pool.stop().await;
    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn submit_rejects_unsupported_extensions() {
    let (app, db_path, worker_pool) = test_app().await;

    let (content_type, body) = multipart_body("notes.txt", b"hello");
    let request = Request::builder()
        .method("POST")
        .uri("/ocr/submit")
        .header(header::CONTENT_TYPE, content_type)
        .body(body)
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    worker_pool.stop().await;
    let _ = std::fs::remove_file(&db_path);
}
