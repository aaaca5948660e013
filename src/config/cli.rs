use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command-line arguments for the OCR job service binary.
#[derive(Debug, Parser)]
#[command(name = "ocr-job-service", version, about = "Multi-worker OCR job service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "OCR_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Override the HTTP bind address.
    #[arg(long = "bind-addr", value_name = "HOST:PORT")]
    pub bind_addr: Option<String>,

    /// Override the SQLite database path.
    #[arg(long = "db-path", value_name = "PATH")]
    pub db_path: Option<String>,

    /// Override the worker pool size.
    #[arg(long = "num-workers", value_name = "N")]
    pub num_workers: Option<u32>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP API and the worker pool together (default).
    Serve,
}
