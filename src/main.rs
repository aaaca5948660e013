use std::sync::Arc;

use ocr_job_service::application::backend::OcrBackend;
use ocr_job_service::application::backend::hosted::HostedModelBackend;
use ocr_job_service::application::backend::self_hosted::SelfHostedBackend;
use ocr_job_service::application::ingest::IngestService;
use ocr_job_service::application::pool::WorkerPool;
use ocr_job_service::application::query::QueryService;
use ocr_job_service::application::rasterize::{PassthroughRasterizer, Rasterizer};
#[cfg(feature = "pdf")]
use ocr_job_service::application::rasterize::PdfiumRasterizer;
use ocr_job_service::application;
use ocr_job_service::config::{self, BackendKind};
use ocr_job_service::infra;
use ocr_job_service::infra::db::SqliteJobStore;
use ocr_job_service::infra::error::InfraError;
use ocr_job_service::infra::http::{ApiState, router};

const PDF_DPI: f32 = 150.0;

#[tokio::main]
async fn main() -> Result<(), InfraError> {
    let cli = config::parse_cli();
    let settings = config::load(&cli).map_err(|err| InfraError::configuration(err.to_string()))?;

    infra::telemetry::init(&settings.logging)?;

    let db_path = settings
        .db_path
        .to_str()
        .ok_or_else(|| InfraError::configuration("DB_PATH is not valid UTF-8"))?;
    let pool = SqliteJobStore::connect(db_path).await?;
    SqliteJobStore::run_migrations(&pool).await?;
    let store: Arc<dyn application::repos::JobStore> = Arc::new(SqliteJobStore::new(pool));

    let rasterizer: Arc<dyn Rasterizer> = build_rasterizer()?;
    let backend: Arc<dyn OcrBackend> = build_backend(&settings.backend);

    let ingest = Arc::new(IngestService::new(
        store.clone(),
        rasterizer,
        settings.max_file_size_mb,
    ));
    let worker_pool = Arc::new(WorkerPool::new(store.clone(), backend, settings.backend.post_process));
    let query = Arc::new(QueryService::new(store, worker_pool.clone(), db_path.to_string()));

    worker_pool.start(settings.num_workers as usize).await;

    let max_body_bytes = (settings.max_file_size_mb * 1024 * 1024) as usize;
    let app = router(ApiState { ingest, query }, max_body_bytes);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .map_err(InfraError::Io)?;
    tracing::info!(addr = %settings.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InfraError::Io)?;

    worker_pool.stop().await;
    Ok(())
}

fn build_rasterizer() -> Result<Arc<dyn Rasterizer>, InfraError> {
    #[cfg(feature = "pdf")]
    {
        let pdfium = PdfiumRasterizer::new(PDF_DPI)
            .map_err(|err| InfraError::configuration(format!("failed to load pdfium: {err}")))?;
        Ok(Arc::new(PdfRoutingRasterizer {
            pdf: pdfium,
            image: PassthroughRasterizer,
        }))
    }
    #[cfg(not(feature = "pdf"))]
    {
        Ok(Arc::new(PassthroughRasterizer))
    }
}

/// Routes a submission to the PDF rasterizer when it looks like a PDF
/// (`%PDF` magic bytes), otherwise treats it as an already-raster image.
#[cfg(feature = "pdf")]
struct PdfRoutingRasterizer {
    pdf: PdfiumRasterizer,
    image: PassthroughRasterizer,
}

#[cfg(feature = "pdf")]
impl Rasterizer for PdfRoutingRasterizer {
    fn rasterize(&self, bytes: &[u8]) -> Result<Vec<Vec<u8>>, application::rasterize::RasterizeError> {
        if bytes.starts_with(b"%PDF") {
            self.pdf.rasterize(bytes)
        } else {
            self.image.rasterize(bytes)
        }
    }
}

fn build_backend(settings: &config::BackendSettings) -> Arc<dyn OcrBackend> {
    match settings.kind {
        BackendKind::HuggingFace => Arc::new(HostedModelBackend::new(
            settings.hosted_model_url.clone(),
            settings.hf_token.clone(),
            settings.mode,
        )),
        BackendKind::Ollama => Arc::new(SelfHostedBackend::new(settings.ollama_url.clone(), "llava:latest")),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
