//! The `JobStore` trait: the sole persistence boundary for the core
//! pipeline. A single implementation (`infra::db::SqliteJobStore`) backs
//! it; the trait exists so the worker loop and the HTTP handlers depend on
//! an interface rather than on `sqlx` directly.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{JobRecord, PageJobRecord};
use crate::domain::types::{FileType, JobStatus};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            other => RepoError::from_persistence(other),
        }
    }
}

/// One page of bytes submitted at ingest time, in page order.
pub struct NewPage {
    pub page_number: i64,
    pub image_data: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct JobQueryFilter {
    pub status: Option<JobStatus>,
}

#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

pub struct JobList {
    pub jobs: Vec<JobRecord>,
    pub total: i64,
}

/// Derives Job.status from the multiset of its PageJob statuses, per the
/// status-derivation rule: empty -> no update, all completed -> completed,
/// any failed with the rest terminal -> failed, any processing ->
/// processing, otherwise left queued.
pub fn derive_parent_status(children: &[JobStatus]) -> Option<JobStatus> {
    if children.is_empty() {
        return None;
    }
    if children.iter().all(|s| *s == JobStatus::Completed) {
        return Some(JobStatus::Completed);
    }
    let any_failed = children.iter().any(|s| *s == JobStatus::Failed);
    let all_terminal = children
        .iter()
        .all(|s| matches!(s, JobStatus::Completed | JobStatus::Failed));
    if any_failed && all_terminal {
        return Some(JobStatus::Failed);
    }
    if children.iter().any(|s| *s == JobStatus::Processing) {
        return Some(JobStatus::Processing);
    }
    None
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job_with_pages(
        &self,
        original_filename: &str,
        file_type: FileType,
        pages: Vec<NewPage>,
    ) -> Result<JobRecord, RepoError>;

    async fn get_job(&self, id: Uuid) -> Result<JobRecord, RepoError>;

    async fn list_page_jobs(&self, parent_id: Uuid) -> Result<Vec<PageJobRecord>, RepoError>;

    async fn list_jobs(
        &self,
        filter: &JobQueryFilter,
        page: PageRequest,
    ) -> Result<JobList, RepoError>;

    async fn delete_job(&self, id: Uuid) -> Result<bool, RepoError>;

    async fn queue_depth(&self) -> Result<i64, RepoError>;

    async fn next_queued_page(&self) -> Result<Option<PageJobRecord>, RepoError>;

    /// Conditional update: `queued -> processing`, gated on current status
    /// still being `queued`. Returns true iff this call performed the
    /// transition. This is the only coordination primitive between
    /// concurrent workers; it must be implemented as a single conditional
    /// UPDATE, never as a read followed by a write.
    async fn claim_page_job(&self, page_job_id: Uuid, worker_id: &str) -> Result<bool, RepoError>;

    async fn record_result(
        &self,
        page_job_id: Uuid,
        markdown_text: Option<&str>,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), RepoError>;

    async fn recompute_parent_status(&self, parent_id: Uuid) -> Result<(), RepoError>;

    async fn health_check(&self) -> Result<(), RepoError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_multiset_means_no_update() {
        assert_eq!(derive_parent_status(&[]), None);
    }

    #[test]
    fn all_completed_is_completed() {
        let m = [JobStatus::Completed, JobStatus::Completed];
        assert_eq!(derive_parent_status(&m), Some(JobStatus::Completed));
    }

    #[test]
    fn any_failed_with_rest_terminal_is_failed() {
        let m = [JobStatus::Completed, JobStatus::Failed];
        assert_eq!(derive_parent_status(&m), Some(JobStatus::Failed));
    }

    #[test]
    fn any_processing_is_processing_even_with_a_failure() {
        let m = [JobStatus::Failed, JobStatus::Processing];
        assert_eq!(derive_parent_status(&m), Some(JobStatus::Processing));
    }

    #[test]
    fn mix_of_queued_and_completed_is_unchanged() {
        let m = [JobStatus::Queued, JobStatus::Completed];
        assert_eq!(derive_parent_status(&m), None);
    }
}
