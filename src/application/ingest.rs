//! Ingest API: validates a submitted document, rasterizes it, and creates
//! one Job plus N PageJobs atomically (spec.md §4.5).

use std::sync::Arc;

use crate::application::error::AppError;
use crate::application::rasterize::Rasterizer;
use crate::application::repos::{JobStore, NewPage};
use crate::domain::entities::JobRecord;
use crate::domain::types::FileType;

const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "tiff", "bmp", "webp"];

pub struct IngestService {
    store: Arc<dyn JobStore>,
    rasterizer: Arc<dyn Rasterizer>,
    max_file_size_bytes: u64,
}

pub struct SubmittedJob {
    pub job_id: uuid::Uuid,
    pub total_pages: i64,
}

impl IngestService {
    pub fn new(store: Arc<dyn JobStore>, rasterizer: Arc<dyn Rasterizer>, max_file_size_mb: u64) -> Self {
        Self {
            store,
            rasterizer,
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
        }
    }

    pub async fn submit(&self, filename: &str, bytes: &[u8]) -> Result<SubmittedJob, AppError> {
        let extension = file_extension(filename);
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(AppError::validation(format!(
                "Unsupported file type '.{extension}'. Allowed: {}",
                ALLOWED_EXTENSIONS
                    .iter()
                    .map(|e| format!(".{e}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        if bytes.len() as u64 > self.max_file_size_bytes {
            return Err(AppError::payload_too_large(format!(
                "File size exceeds maximum of {} MB.",
                self.max_file_size_bytes / (1024 * 1024)
            )));
        }

        let file_type = if extension == "pdf" {
            FileType::Pdf
        } else {
            FileType::Image
        };

        let pages_bytes = self
            .rasterizer
            .rasterize(bytes)
            .map_err(|err| AppError::validation(format!("Failed to process document: {err}")))?;

        let pages = pages_bytes
            .into_iter()
            .enumerate()
            .map(|(idx, image_data)| NewPage {
                page_number: idx as i64 + 1,
                image_data,
            })
            .collect::<Vec<_>>();
        let total_pages = pages.len() as i64;

        let job: JobRecord = self
            .store
            .create_job_with_pages(filename, file_type, pages)
            .await?;

        tracing::info!(job_id = %job.id, total_pages, "created job");

        Ok(SubmittedJob {
            job_id: job.id,
            total_pages,
        })
    }
}

fn file_extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}
