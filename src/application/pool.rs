//! Worker pool lifecycle: start N workers, track active workers, shut
//! down cleanly (spec.md §4.4).

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::application::backend::OcrBackend;
use crate::application::repos::JobStore;
use crate::application::worker::{self, WorkerContext};

struct Handle {
    task: JoinHandle<()>,
}

pub struct WorkerPool {
    store: Arc<dyn JobStore>,
    backend: Arc<dyn OcrBackend>,
    active_count: Arc<AtomicI64>,
    post_process: bool,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    handles: Mutex<Vec<Handle>>,
}

impl WorkerPool {
    pub fn new(store: Arc<dyn JobStore>, backend: Arc<dyn OcrBackend>, post_process: bool) -> Self {
        let (stop_tx, stop_rx) = watch::channel(true);
        Self {
            store,
            backend,
            active_count: Arc::new(AtomicI64::new(0)),
            post_process,
            stop_tx,
            stop_rx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Idempotent only when already stopped: spawning onto a running pool
    /// is a no-op, matching the pool's `Start(n)` contract.
    pub async fn start(&self, num_workers: usize) {
        let mut handles = self.handles.lock().await;
        if !handles.is_empty() {
            tracing::warn!("worker pool already running; start() ignored");
            return;
        }

        let _ = self.stop_tx.send(false);

        for ordinal in 1..=num_workers {
            let id = worker::worker_id(ordinal);
            let ctx = WorkerContext {
                store: self.store.clone(),
                backend: self.backend.clone(),
                active_count: self.active_count.clone(),
                post_process: self.post_process,
            };
            let stop_rx = self.stop_rx.clone();
            let task = tokio::spawn(worker::run(id, ctx, stop_rx));
            handles.push(Handle { task });
        }

        tracing::info!(num_workers, "started ocr workers");
    }

    /// Sets the stop signal and waits for every worker to finish its
    /// current iteration. Does not abort an in-flight backend call.
    pub async fn stop(&self) {
        let _ = self.stop_tx.send(true);
        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(err) = handle.task.await {
                tracing::error!(error = %err, "worker task panicked");
            }
        }
        tracing::info!("all ocr workers stopped");
    }

    pub async fn worker_count(&self) -> usize {
        self.handles.lock().await.len()
    }

    pub fn active_workers(&self) -> i64 {
        self.active_count.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::backend::OcrError;
    use crate::application::repos::{JobList, JobQueryFilter, NewPage, PageRequest, RepoError};
    use crate::domain::entities::{JobRecord, PageJobRecord};
    use crate::domain::types::FileType;
    use async_trait::async_trait;
    use uuid::Uuid;

    struct EmptyStore;

    #[async_trait]
    impl JobStore for EmptyStore {
        async fn create_job_with_pages(
            &self,
            _original_filename: &str,
            _file_type: FileType,
            _pages: Vec<NewPage>,
        ) -> Result<JobRecord, RepoError> {
            unimplemented!()
        }
        async fn get_job(&self, _id: Uuid) -> Result<JobRecord, RepoError> {
            unimplemented!()
        }
        async fn list_page_jobs(&self, _parent_id: Uuid) -> Result<Vec<PageJobRecord>, RepoError> {
            unimplemented!()
        }
        async fn list_jobs(
            &self,
            _filter: &JobQueryFilter,
            _page: PageRequest,
        ) -> Result<JobList, RepoError> {
            unimplemented!()
        }
        async fn delete_job(&self, _id: Uuid) -> Result<bool, RepoError> {
            unimplemented!()
        }
        async fn queue_depth(&self) -> Result<i64, RepoError> {
            unimplemented!()
        }
        async fn next_queued_page(&self) -> Result<Option<PageJobRecord>, RepoError> {
            Ok(None)
        }
        async fn claim_page_job(&self, _page_job_id: Uuid, _worker_id: &str) -> Result<bool, RepoError> {
            Ok(false)
        }
        async fn record_result(
            &self,
            _page_job_id: Uuid,
            _markdown_text: Option<&str>,
            _status: crate::domain::types::JobStatus,
            _error_message: Option<&str>,
        ) -> Result<(), RepoError> {
            Ok(())
        }
        async fn recompute_parent_status(&self, _parent_id: Uuid) -> Result<(), RepoError> {
            Ok(())
        }
        async fn health_check(&self) -> Result<(), RepoError> {
            Ok(())
        }
    }

    struct DummyBackend;

    #[async_trait]
    impl OcrBackend for DummyBackend {
        async fn process_image(&self, _image_bytes: &[u8]) -> Result<String, OcrError> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn start_then_stop_reports_zero_workers() {
        let pool = WorkerPool::new(Arc::new(EmptyStore), Arc::new(DummyBackend), false);
        pool.start(2).await;
        assert_eq!(pool.worker_count().await, 2);
        pool.stop().await;
        assert_eq!(pool.worker_count().await, 0);
    }
}
