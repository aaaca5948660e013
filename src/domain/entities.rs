//! Domain entities mirrored from persistent storage.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{FileType, JobStatus};

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub original_filename: String,
    pub file_type: FileType,
    pub total_pages: i64,
    pub status: JobStatus,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PageJobRecord {
    pub id: Uuid,
    pub parent_job_id: Uuid,
    pub page_number: i64,
    #[serde(skip)]
    pub image_data: Vec<u8>,
    pub markdown_text: Option<String>,
    pub status: JobStatus,
    pub worker_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}
