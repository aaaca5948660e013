//! The `JobStore` implementation: every query here runs against a
//! single-connection SQLite pool, so `ClaimPageJob`'s conditional UPDATE
//! is the actual coordination primitive described in spec.md §5, not
//! merely documentation of intent.

use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use crate::application::repos::{JobList, JobQueryFilter, JobStore, NewPage, PageRequest, RepoError, derive_parent_status};
use crate::domain::entities::{JobRecord, PageJobRecord};
use crate::domain::types::{FileType, JobStatus};

use super::SqliteJobStore;

struct JobRow {
    id: String,
    original_filename: String,
    file_type: String,
    total_pages: i64,
    status: String,
    created_at: String,
    updated_at: String,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for JobRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            original_filename: row.try_get("original_filename")?,
            file_type: row.try_get("file_type")?,
            total_pages: row.try_get("total_pages")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<JobRow> for JobRecord {
    type Error = RepoError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(JobRecord {
            id: parse_uuid(&row.id)?,
            original_filename: row.original_filename,
            file_type: FileType::try_from(row.file_type.as_str())
                .map_err(RepoError::from_persistence)?,
            total_pages: row.total_pages,
            status: JobStatus::try_from(row.status.as_str()).map_err(RepoError::from_persistence)?,
            created_at: parse_dt(&row.created_at)?,
            updated_at: parse_dt(&row.updated_at)?,
        })
    }
}

struct PageJobRow {
    id: String,
    parent_job_id: String,
    page_number: i64,
    image_data: Vec<u8>,
    markdown_text: Option<String>,
    status: String,
    worker_id: Option<String>,
    error_message: Option<String>,
    created_at: String,
    updated_at: String,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for PageJobRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            parent_job_id: row.try_get("parent_job_id")?,
            page_number: row.try_get("page_number")?,
            image_data: row.try_get("image_data")?,
            markdown_text: row.try_get("markdown_text")?,
            status: row.try_get("status")?,
            worker_id: row.try_get("worker_id")?,
            error_message: row.try_get("error_message")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<PageJobRow> for PageJobRecord {
    type Error = RepoError;

    fn try_from(row: PageJobRow) -> Result<Self, Self::Error> {
        Ok(PageJobRecord {
            id: parse_uuid(&row.id)?,
            parent_job_id: parse_uuid(&row.parent_job_id)?,
            page_number: row.page_number,
            image_data: row.image_data,
            markdown_text: row.markdown_text,
            status: JobStatus::try_from(row.status.as_str()).map_err(RepoError::from_persistence)?,
            worker_id: row.worker_id,
            error_message: row.error_message,
            created_at: parse_dt(&row.created_at)?,
            updated_at: parse_dt(&row.updated_at)?,
        })
    }
}

fn parse_uuid(value: &str) -> Result<Uuid, RepoError> {
    Uuid::parse_str(value).map_err(RepoError::from_persistence)
}

fn parse_dt(value: &str) -> Result<OffsetDateTime, RepoError> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(RepoError::from_persistence)
}

fn now_str() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .expect("formatting the current time as RFC3339 cannot fail")
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn create_job_with_pages(
        &self,
        original_filename: &str,
        file_type: FileType,
        pages: Vec<NewPage>,
    ) -> Result<JobRecord, RepoError> {
        let job_id = Uuid::new_v4();
        let now = now_str();
        let total_pages = pages.len() as i64;

        let mut tx = self.pool().begin().await.map_err(RepoError::from)?;

        sqlx::query(
            "INSERT INTO jobs (id, original_filename, file_type, total_pages, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'queued', ?5, ?5)",
        )
        .bind(job_id.to_string())
        .bind(original_filename)
        .bind(file_type.as_str())
        .bind(total_pages)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(RepoError::from)?;

        for page in &pages {
            sqlx::query(
                "INSERT INTO page_jobs (id, parent_job_id, page_number, image_data, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'queued', ?5, ?5)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(job_id.to_string())
            .bind(page.page_number)
            .bind(&page.image_data)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(RepoError::from)?;
        }

        tx.commit().await.map_err(RepoError::from)?;

        Ok(JobRecord {
            id: job_id,
            original_filename: original_filename.to_string(),
            file_type,
            total_pages,
            status: JobStatus::Queued,
            created_at: parse_dt(&now)?,
            updated_at: parse_dt(&now)?,
        })
    }

    async fn get_job(&self, id: Uuid) -> Result<JobRecord, RepoError> {
        let row: JobRow = sqlx::query_as("SELECT * FROM jobs WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await
            .map_err(RepoError::from)?
            .ok_or(RepoError::NotFound)?;
        row.try_into()
    }

    async fn list_page_jobs(&self, parent_id: Uuid) -> Result<Vec<PageJobRecord>, RepoError> {
        let rows: Vec<PageJobRow> =
            sqlx::query_as("SELECT * FROM page_jobs WHERE parent_job_id = ?1 ORDER BY page_number")
                .bind(parent_id.to_string())
                .fetch_all(self.pool())
                .await
                .map_err(RepoError::from)?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_jobs(&self, filter: &JobQueryFilter, page: PageRequest) -> Result<JobList, RepoError> {
        let mut select: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM jobs WHERE 1=1");
        let mut count: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM jobs WHERE 1=1");

        if let Some(status) = filter.status {
            select.push(" AND status = ").push_bind(status.as_str());
            count.push(" AND status = ").push_bind(status.as_str());
        }

        select
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.page_size)
            .push(" OFFSET ")
            .push_bind((page.page - 1) * page.page_size);

        let rows: Vec<JobRow> = select
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(RepoError::from)?;

        let total: i64 = count
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(RepoError::from)?;

        let jobs = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(JobList { jobs, total })
    }

    async fn delete_job(&self, id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?1")
            .bind(id.to_string())
            .execute(self.pool())
            .await
            .map_err(RepoError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn queue_depth(&self) -> Result<i64, RepoError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM page_jobs WHERE status = 'queued'")
            .fetch_one(self.pool())
            .await
            .map_err(RepoError::from)?;
        Ok(count)
    }

    async fn next_queued_page(&self) -> Result<Option<PageJobRecord>, RepoError> {
        let row: Option<PageJobRow> = sqlx::query_as(
            "SELECT * FROM page_jobs WHERE status = 'queued' ORDER BY created_at LIMIT 1",
        )
        .fetch_optional(self.pool())
        .await
        .map_err(RepoError::from)?;

        row.map(TryInto::try_into).transpose()
    }

    async fn claim_page_job(&self, page_job_id: Uuid, worker_id: &str) -> Result<bool, RepoError> {
        let result = sqlx::query(
            "UPDATE page_jobs SET status = 'processing', worker_id = ?1, updated_at = ?2
             WHERE id = ?3 AND status = 'queued'",
        )
        .bind(worker_id)
        .bind(now_str())
        .bind(page_job_id.to_string())
        .execute(self.pool())
        .await
        .map_err(RepoError::from)?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_result(
        &self,
        page_job_id: Uuid,
        markdown_text: Option<&str>,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), RepoError> {
        sqlx::query(
            "UPDATE page_jobs SET markdown_text = ?1, status = ?2, error_message = ?3, updated_at = ?4
             WHERE id = ?5",
        )
        .bind(markdown_text)
        .bind(status.as_str())
        .bind(error_message)
        .bind(now_str())
        .bind(page_job_id.to_string())
        .execute(self.pool())
        .await
        .map_err(RepoError::from)?;
        Ok(())
    }

    async fn recompute_parent_status(&self, parent_id: Uuid) -> Result<(), RepoError> {
        let statuses: Vec<String> =
            sqlx::query_scalar("SELECT status FROM page_jobs WHERE parent_job_id = ?1")
                .bind(parent_id.to_string())
                .fetch_all(self.pool())
                .await
                .map_err(RepoError::from)?;

        let statuses = statuses
            .iter()
            .map(|s| JobStatus::try_from(s.as_str()).map_err(RepoError::from_persistence))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(new_status) = derive_parent_status(&statuses) {
            sqlx::query("UPDATE jobs SET status = ?1, updated_at = ?2 WHERE id = ?3")
                .bind(new_status.as_str())
                .bind(now_str())
                .bind(parent_id.to_string())
                .execute(self.pool())
                .await
                .map_err(RepoError::from)?;
        }

        Ok(())
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.health_check_raw().await.map_err(RepoError::from)
    }
}
