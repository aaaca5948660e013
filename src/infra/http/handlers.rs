//! axum handlers implementing the ingest/query/control HTTP surface.

use axum::extract::{Multipart, Path, Query, State};
use axum::response::IntoResponse;
use axum::{Json, http::StatusCode};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::pagination::DEFAULT_PAGE_SIZE;
use crate::application::query::{JobResultView, JobStatusView, Section};
use crate::domain::entities::JobRecord;
use crate::domain::types::JobStatus;

use super::state::ApiState;

#[derive(Serialize)]
pub struct JobSubmitResponse {
    pub job_id: Uuid,
    pub total_pages: i64,
    pub message: String,
}

pub async fn submit(State(state): State<ApiState>, mut multipart: Multipart) -> Result<impl IntoResponse, AppError> {
    let mut filename = None;
    let mut bytes = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::validation(format!("invalid multipart payload: {err}")))?
    {
        if field.name() == Some("file") {
            filename = field.file_name().map(|s| s.to_string());
            bytes = Some(
                field
                    .bytes()
                    .await
                    .map_err(|err| AppError::validation(format!("failed to read upload: {err}")))?,
            );
        }
    }

    let filename = filename.ok_or_else(|| AppError::validation("missing `file` field"))?;
    let bytes = bytes.ok_or_else(|| AppError::validation("missing `file` field"))?;

    let submitted = state.ingest.submit(&filename, &bytes).await?;

    Ok(Json(JobSubmitResponse {
        job_id: submitted.job_id,
        total_pages: submitted.total_pages,
        message: "job accepted".to_string(),
    }))
}

#[derive(Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub total_pages: i64,
    pub completed_pages: i64,
    pub failed_pages: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<JobStatusView> for JobStatusResponse {
    fn from(view: JobStatusView) -> Self {
        Self {
            job_id: view.job.id,
            status: view.job.status,
            total_pages: view.job.total_pages,
            completed_pages: view.completed_pages,
            failed_pages: view.failed_pages,
            created_at: view.job.created_at.format(&Rfc3339).unwrap_or_default(),
            updated_at: view.job.updated_at.format(&Rfc3339).unwrap_or_default(),
        }
    }
}

pub async fn status(
    State(state): State<ApiState>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let view = state.query.status(job_id).await?;
    Ok(Json(JobStatusResponse::from(view)))
}

#[derive(Serialize)]
pub struct PageResultResponse {
    pub page_number: i64,
    pub markdown_text: Option<String>,
    pub status: JobStatus,
}

#[derive(Serialize)]
pub struct JobResultResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub total_pages: i64,
    pub pages: Vec<PageResultResponse>,
    pub sections: Vec<Section>,
}

impl From<JobResultView> for JobResultResponse {
    fn from(view: JobResultView) -> Self {
        Self {
            job_id: view.job.id,
            status: view.job.status,
            total_pages: view.job.total_pages,
            pages: view
                .pages
                .into_iter()
                .map(|p| PageResultResponse {
                    page_number: p.page_number,
                    markdown_text: p.markdown_text,
                    status: p.status,
                })
                .collect(),
            sections: view.sections,
        }
    }
}

pub async fn result(
    State(state): State<ApiState>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let view = state.query.result(job_id).await?;
    Ok(Json(JobResultResponse::from(view)))
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<JobStatus>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobRecord>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

pub async fn list_jobs(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    let (jobs, total, params) = state.query.list(query.status, page, page_size).await?;
    Ok(Json(JobListResponse {
        jobs,
        total,
        page: params.page,
        page_size: params.page_size,
    }))
}

pub async fn delete_job(
    State(state): State<ApiState>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.query.delete(job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub worker_count: usize,
    pub active_workers: i64,
    pub queue_depth: i64,
    pub db_path: String,
}

pub async fn health(State(state): State<ApiState>) -> Result<impl IntoResponse, AppError> {
    let view = state.query.health().await?;
    Ok(Json(HealthResponse {
        status: "ok",
        worker_count: view.worker_count,
        active_workers: view.active_workers,
        queue_depth: view.queue_depth,
        db_path: view.db_path,
    }))
}
