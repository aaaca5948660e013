//! Query/Control API: status, result (with section parsing), list, delete,
//! health (spec.md §4.6).

use std::sync::Arc;

use metrics::gauge;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::pagination::PageParams;
use crate::application::pool::WorkerPool;
use crate::application::repos::{JobQueryFilter, JobStore};
use crate::domain::entities::{JobRecord, PageJobRecord};
use crate::domain::types::JobStatus;

pub struct QueryService {
    store: Arc<dyn JobStore>,
    pool: Arc<WorkerPool>,
    db_path: String,
}

pub struct JobStatusView {
    pub job: JobRecord,
    pub completed_pages: i64,
    pub failed_pages: i64,
}

pub struct PageResult {
    pub page_number: i64,
    pub markdown_text: Option<String>,
    pub status: JobStatus,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Section {
    pub heading: String,
    pub level: u8,
    pub page: i64,
    pub content: String,
}

pub struct JobResultView {
    pub job: JobRecord,
    pub pages: Vec<PageResult>,
    pub sections: Vec<Section>,
}

pub struct HealthView {
    pub worker_count: usize,
    pub active_workers: i64,
    pub queue_depth: i64,
    pub db_path: String,
}

impl QueryService {
    pub fn new(store: Arc<dyn JobStore>, pool: Arc<WorkerPool>, db_path: impl Into<String>) -> Self {
        Self {
            store,
            pool,
            db_path: db_path.into(),
        }
    }

    pub async fn status(&self, job_id: Uuid) -> Result<JobStatusView, AppError> {
        let job = self.store.get_job(job_id).await?;
        let page_jobs = self.store.list_page_jobs(job_id).await?;
        let completed_pages = page_jobs.iter().filter(|p| p.status == JobStatus::Completed).count() as i64;
        let failed_pages = page_jobs.iter().filter(|p| p.status == JobStatus::Failed).count() as i64;
        Ok(JobStatusView {
            job,
            completed_pages,
            failed_pages,
        })
    }

    pub async fn result(&self, job_id: Uuid) -> Result<JobResultView, AppError> {
        let job = self.store.get_job(job_id).await?;
        let mut page_jobs = self.store.list_page_jobs(job_id).await?;
        page_jobs.sort_by_key(|p| p.page_number);

        let pages: Vec<PageResult> = page_jobs
            .iter()
            .map(|p| PageResult {
                page_number: p.page_number,
                markdown_text: p.markdown_text.clone(),
                status: p.status,
            })
            .collect();

        let sections = parse_sections(&pages);

        Ok(JobResultView { job, pages, sections })
    }

    pub async fn list(
        &self,
        status: Option<JobStatus>,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<JobRecord>, i64, PageParams), AppError> {
        let params = PageParams::validate(page, page_size)?;
        let filter = JobQueryFilter { status };
        let list = self
            .store
            .list_jobs(
                &filter,
                crate::application::repos::PageRequest {
                    page: params.page,
                    page_size: params.page_size,
                },
            )
            .await?;
        Ok((list.jobs, list.total, params))
    }

    pub async fn delete(&self, job_id: Uuid) -> Result<(), AppError> {
        let deleted = self.store.delete_job(job_id).await?;
        if !deleted {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    pub async fn health(&self) -> Result<HealthView, AppError> {
        let queue_depth = self.store.queue_depth().await?;
        let active_workers = self.pool.active_workers();
        gauge!("ocr_queue_depth").set(queue_depth as f64);
        gauge!("ocr_active_workers").set(active_workers as f64);
        Ok(HealthView {
            worker_count: self.pool.worker_count().await,
            active_workers,
            queue_depth,
            db_path: self.db_path.clone(),
        })
    }
}

/// Splits each page's Markdown into sections keyed on ATX headings (`#`
/// through `######` at line start). Content before the first heading on a
/// page, or a page with no headings at all, becomes a level-0
/// `(untitled)` section.
pub fn parse_sections(pages: &[PageResult]) -> Vec<Section> {
    let mut sections = Vec::new();

    for page in pages {
        let Some(text) = page.markdown_text.as_deref() else {
            continue;
        };
        if text.is_empty() {
            continue;
        }

        let headings = find_headings(text);

        if headings.is_empty() {
            let content = text.trim();
            if !content.is_empty() {
                sections.push(Section {
                    heading: "(untitled)".to_string(),
                    level: 0,
                    page: page.page_number,
                    content: content.to_string(),
                });
            }
            continue;
        }

        let pre = text[..headings[0].line_start].trim();
        if !pre.is_empty() {
            sections.push(Section {
                heading: "(untitled)".to_string(),
                level: 0,
                page: page.page_number,
                content: pre.to_string(),
            });
        }

        for (idx, heading) in headings.iter().enumerate() {
            let start = heading.content_start;
            let end = headings
                .get(idx + 1)
                .map(|next| next.line_start)
                .unwrap_or(text.len());
            let content = text[start..end].trim();
            sections.push(Section {
                heading: heading.text.clone(),
                level: heading.level,
                page: page.page_number,
                content: content.to_string(),
            });
        }
    }

    sections
}

struct Heading {
    level: u8,
    text: String,
    line_start: usize,
    content_start: usize,
}

fn find_headings(text: &str) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let trimmed_end = line.trim_end_matches(['\n', '\r']);
        let hashes = trimmed_end.chars().take_while(|c| *c == '#').count();
        if hashes >= 1
            && hashes <= 6
            && trimmed_end.as_bytes().get(hashes) == Some(&b' ')
        {
            let heading_text = trimmed_end[hashes..].trim().to_string();
            headings.push(Heading {
                level: hashes as u8,
                text: heading_text,
                line_start: offset,
                content_start: offset + line.len(),
            });
        }
        offset += line.len();
    }

    headings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: i64, markdown: &str, status: JobStatus) -> PageResult {
        PageResult {
            page_number: number,
            markdown_text: Some(markdown.to_string()),
            status,
        }
    }

    #[test]
    fn page_with_no_headings_becomes_one_untitled_section() {
        let pages = vec![page(1, "just some text", JobStatus::Completed)];
        let sections = parse_sections(&pages);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].heading, "(untitled)");
        assert_eq!(sections[0].level, 0);
        assert_eq!(sections[0].content, "just some text");
    }

    #[test]
    fn headings_split_into_sections_with_trailing_content_owned() {
        let pages = vec![page(1, "# Title\nbody one\n## Sub\nbody two", JobStatus::Completed)];
        let sections = parse_sections(&pages);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].heading, "Title");
        assert_eq!(sections[0].level, 1);
        assert_eq!(sections[0].content, "body one");
        assert_eq!(sections[1].heading, "Sub");
        assert_eq!(sections[1].level, 2);
        assert_eq!(sections[1].content, "body two");
    }

    #[test]
    fn leading_content_before_first_heading_is_untitled() {
        let pages = vec![page(1, "preamble\n# Title\nbody", JobStatus::Completed)];
        let sections = parse_sections(&pages);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].heading, "(untitled)");
        assert_eq!(sections[0].content, "preamble");
        assert_eq!(sections[1].heading, "Title");
    }

    #[test]
    fn empty_markdown_contributes_no_sections() {
        let pages = vec![PageResult {
            page_number: 1,
            markdown_text: None,
            status: JobStatus::Failed,
        }];
        assert!(parse_sections(&pages).is_empty());
    }
}
