//! Errors that originate from infrastructure: the database, the network,
//! the filesystem, or process wiring.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {message}")]
    Database { message: String },

    #[error("telemetry error: {0}")]
    Telemetry(String),

    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl From<sqlx::Error> for InfraError {
    fn from(error: sqlx::Error) -> Self {
        InfraError::Database {
            message: error.to_string(),
        }
    }
}

impl InfraError {
    pub fn telemetry(message: impl Into<String>) -> Self {
        InfraError::Telemetry(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        InfraError::Configuration {
            message: message.into(),
        }
    }
}
