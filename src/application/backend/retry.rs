//! The retry/backoff policy shared by every backend variant (spec.md
//! §4.2): up to 3 attempts, sleeping `2^attempt` seconds (1s, 2s) before
//! retries 2 and 3, with a configuration error failing immediately.

use std::future::Future;

use crate::application::backend::OcrError;

pub const MAX_ATTEMPTS: u32 = 3;

/// Drives up to `MAX_ATTEMPTS` calls to `attempt`. `attempt` is given the
/// zero-based attempt index; between attempts that are not the last, this
/// calls `on_retry` so the caller can discard a cached client handle
/// before reconnecting.
pub async fn with_retry<A, AFut, R>(mut attempt: A, mut on_retry: R) -> Result<String, OcrError>
where
    A: FnMut(u32) -> AFut,
    AFut: Future<Output = Result<String, OcrError>>,
    R: FnMut(),
{
    let mut last_error = String::new();

    for idx in 0..MAX_ATTEMPTS {
        match attempt(idx).await {
            Ok(markdown) => return Ok(markdown),
            Err(OcrError::Configuration(message)) => {
                return Err(OcrError::Configuration(message));
            }
            Err(other) => {
                last_error = other.to_string();
                tracing::warn!(
                    attempt = idx + 1,
                    max_attempts = MAX_ATTEMPTS,
                    error = %last_error,
                    "ocr attempt failed"
                );
                if idx + 1 < MAX_ATTEMPTS {
                    on_retry();
                    let backoff_secs = 2u64.pow(idx);
                    tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                }
            }
        }
    }

    Err(OcrError::Exhausted {
        attempts: MAX_ATTEMPTS,
        last_error,
    })
}
