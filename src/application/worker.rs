//! One cooperative loop draining the page-job queue (spec.md §4.3).

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tokio::sync::watch;
use uuid::Uuid;

use crate::application::backend::OcrBackend;
use crate::application::backend::postprocess::{inline_cropped_images, rewrite_escaped_currency};
use crate::application::repos::JobStore;
use crate::domain::types::JobStatus;

const EMPTY_QUEUE_SLEEP: Duration = Duration::from_secs(1);
const LOOP_ERROR_SLEEP: Duration = Duration::from_secs(2);

/// Shared state every worker iteration touches, outside of its own
/// per-iteration database handle. `active_count` is the pool's
/// active-worker gauge; it is mutated only around a backend call, never
/// reused for anything else.
pub struct WorkerContext {
    pub store: Arc<dyn JobStore>,
    pub backend: Arc<dyn OcrBackend>,
    pub active_count: Arc<AtomicI64>,
    pub post_process: bool,
}

/// `worker-<ordinal>-<8 random hex>`, chosen once at pool start.
pub fn worker_id(ordinal: usize) -> String {
    let random_suffix = &Uuid::new_v4().simple().to_string()[..8];
    format!("worker-{ordinal}-{random_suffix}")
}

/// Runs until `stop_rx` observes the pool's stop signal. Never propagates
/// an error: every failure inside the "process" step is recorded against
/// the PageJob, and every failure opening a database handle or claiming a
/// row is logged and slept off, per spec.md §4.3 step 8.
pub async fn run(id: String, ctx: WorkerContext, mut stop_rx: watch::Receiver<bool>) {
    tracing::info!(worker_id = %id, "worker started");

    while !*stop_rx.borrow() {
        if let Err(err) = run_one_iteration(&id, &ctx).await {
            tracing::error!(worker_id = %id, error = %err, "worker loop error");
            tokio::time::sleep(LOOP_ERROR_SLEEP).await;
        }
    }

    tracing::info!(worker_id = %id, "worker stopped");
}

async fn run_one_iteration(
    id: &str,
    ctx: &WorkerContext,
) -> Result<(), crate::application::repos::RepoError> {
    let page_job = match ctx.store.next_queued_page().await? {
        Some(page_job) => page_job,
        None => {
            tokio::time::sleep(EMPTY_QUEUE_SLEEP).await;
            return Ok(());
        }
    };

    let claimed = ctx.store.claim_page_job(page_job.id, id).await?;
    if !claimed {
        // Lost the race to another worker; loop without sleeping.
        return Ok(());
    }

    tracing::info!(
        worker_id = %id,
        page_job_id = %page_job.id,
        page_number = page_job.page_number,
        "processing page job"
    );

    ctx.active_count.fetch_add(1, Ordering::SeqCst);
    let started = Instant::now();
    let outcome = ctx.backend.process_image(&page_job.image_data).await;
    histogram!("ocr_backend_call_ms").record(started.elapsed().as_millis() as f64);
    ctx.active_count.fetch_sub(1, Ordering::SeqCst);

    match outcome {
        Ok(markdown) => {
            let markdown = if ctx.post_process {
                let rewritten = rewrite_escaped_currency(&markdown);
                inline_cropped_images(&rewritten, &page_job.image_data)
            } else {
                markdown
            };
            ctx.store
                .record_result(page_job.id, Some(&markdown), JobStatus::Completed, None)
                .await?;
            counter!("ocr_pages_completed_total").increment(1);
            tracing::info!(worker_id = %id, page_job_id = %page_job.id, "completed page job");
        }
        Err(err) => {
            ctx.store
                .record_result(page_job.id, None, JobStatus::Failed, Some(&err.to_string()))
                .await?;
            counter!("ocr_pages_failed_total").increment(1);
            tracing::error!(worker_id = %id, page_job_id = %page_job.id, error = %err, "ocr failed for page job");
        }
    }

    ctx.store.recompute_parent_status(page_job.parent_job_id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_ids_follow_the_expected_shape() {
        let id = worker_id(3);
        assert!(id.starts_with("worker-3-"));
        assert_eq!(id.len(), "worker-3-".len() + 8);
    }
}
