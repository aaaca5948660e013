//! Configuration layer: typed settings with layered precedence
//! (defaults → config file → environment → CLI flags).

mod cli;

pub use cli::CliArgs;

use std::path::PathBuf;

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::backend::hosted::OcrMode;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_DB_PATH: &str = "./ocr_jobs.db";
const DEFAULT_NUM_WORKERS: u32 = 2;
const DEFAULT_MAX_FILE_SIZE_MB: u64 = 50;

/// Fully-resolved deployment settings after precedence resolution and
/// validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub db_path: PathBuf,
    pub num_workers: u32,
    pub max_file_size_mb: u64,
    pub logging: LoggingSettings,
    pub backend: BackendSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    HuggingFace,
    Ollama,
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub kind: BackendKind,
    pub hf_token: String,
    pub hosted_model_url: String,
    pub ollama_url: String,
    pub mode: OcrMode,
    pub post_process: bool,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    bind_addr: Option<String>,
    db_path: Option<String>,
    num_workers: Option<u32>,
    max_file_size_mb: Option<u64>,
    rust_log: Option<String>,
    log_format: Option<String>,
    ocr_backend: Option<String>,
    hf_token: Option<String>,
    hosted_model_url: Option<String>,
    ollama_url: Option<String>,
    ocr_mode: Option<String>,
    ocr_post_process: Option<bool>,
}

/// Load settings using the configured precedence: an optional
/// `config/default.{toml,yaml,...}` file, then environment variables
/// (named exactly as in spec.md §6, no prefix), then CLI overrides.
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder().add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::default());

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    if let Some(bind_addr) = cli.bind_addr.clone() {
        raw.bind_addr = Some(bind_addr);
    }
    if let Some(db_path) = cli.db_path.clone() {
        raw.db_path = Some(db_path);
    }
    if let Some(num_workers) = cli.num_workers {
        raw.num_workers = Some(num_workers);
    }

    Settings::from_raw(raw)
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let level = raw
            .rust_log
            .as_deref()
            .map(|s| s.parse::<LevelFilter>())
            .transpose()
            .map_err(|_| LoadError::invalid("RUST_LOG", "not a valid tracing level"))?
            .unwrap_or(LevelFilter::INFO);

        let format = match raw.log_format.as_deref().unwrap_or("compact") {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            other => return Err(LoadError::invalid("LOG_FORMAT", format!("unknown format `{other}`"))),
        };

        let backend_kind = match raw.ocr_backend.as_deref().unwrap_or("huggingface") {
            "huggingface" => BackendKind::HuggingFace,
            "ollama" => BackendKind::Ollama,
            other => return Err(LoadError::invalid("OCR_BACKEND", format!("unknown backend `{other}`"))),
        };

        let mode = OcrMode::parse(raw.ocr_mode.as_deref().unwrap_or("auto"))
            .map_err(|reason| LoadError::invalid("OCR_MODE", reason))?;

        Ok(Settings {
            bind_addr: raw.bind_addr.unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            db_path: PathBuf::from(raw.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string())),
            num_workers: raw.num_workers.unwrap_or(DEFAULT_NUM_WORKERS),
            max_file_size_mb: raw.max_file_size_mb.unwrap_or(DEFAULT_MAX_FILE_SIZE_MB),
            logging: LoggingSettings { level, format },
            backend: BackendSettings {
                kind: backend_kind,
                hf_token: raw.hf_token.unwrap_or_default(),
                hosted_model_url: raw.hosted_model_url.unwrap_or_default(),
                ollama_url: raw.ollama_url.unwrap_or_default(),
                mode,
                post_process: raw.ocr_post_process.unwrap_or(false),
            },
        })
    }
}

/// Parses CLI arguments; exposed separately from `load` so `main.rs` can
/// call `CliArgs::parse()` directly, matching the teacher's split between
/// argument parsing and settings resolution.
pub fn parse_cli() -> CliArgs {
    CliArgs::parse()
}
