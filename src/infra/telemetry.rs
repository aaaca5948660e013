//! Structured logging and metrics setup.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| InfraError::telemetry(format!("failed to install tracing subscriber: {err}")))
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_gauge!(
            "ocr_queue_depth",
            Unit::Count,
            "Number of page jobs currently queued."
        );
        describe_gauge!(
            "ocr_active_workers",
            Unit::Count,
            "Number of workers currently inside a backend call."
        );
        describe_counter!(
            "ocr_pages_completed_total",
            Unit::Count,
            "Total number of page jobs that completed successfully."
        );
        describe_counter!(
            "ocr_pages_failed_total",
            Unit::Count,
            "Total number of page jobs that failed after retries."
        );
        describe_histogram!(
            "ocr_backend_call_ms",
            Unit::Milliseconds,
            "Latency of a single backend ProcessImage attempt, in milliseconds."
        );
    });
}
