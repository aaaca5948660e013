//! The Backend Adapter: the single capability the worker depends on,
//! `ProcessImage(bytes) -> markdown`, with every concrete inference
//! provider hidden behind it.

pub mod hosted;
pub mod postprocess;
pub mod retry;
pub mod self_hosted;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    /// The adapter is missing required configuration (e.g. no endpoint
    /// URL). Fails immediately; never retried.
    #[error("backend not configured: {0}")]
    Configuration(String),

    /// A single attempt failed for a reason that may not recur (network
    /// blip, transient 5xx, timeout). Retried up to the policy's bound.
    #[error("ocr attempt failed: {0}")]
    Transient(String),

    /// All attempts were exhausted. This is the only variant the worker
    /// ever records as a PageJob failure.
    #[error("ocr processing failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

#[async_trait]
pub trait OcrBackend: Send + Sync {
    async fn process_image(&self, image_bytes: &[u8]) -> Result<String, OcrError>;
}
