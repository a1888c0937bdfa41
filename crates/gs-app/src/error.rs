//! Error types for the gs-app service layer.

use std::path::PathBuf;

use crate::config::ValidationError;

/// Application error wrapping the backend crates' errors, shared by every
/// front end.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to read config file: {path}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] gs_telemetry::TelemetryError),

    #[error("Transport error: {0}")]
    Transport(#[from] gs_telemetry::TransportError),

    #[error("Control error: {0}")]
    Control(#[from] gs_controls::ControlError),

    #[error("Core error: {0}")]
    Core(#[from] gs_core::CoreError),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for gs-app operations.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_faults_are_not_config_errors() {
        let err = AppError::Worker("a worker stopped abnormally".to_string());
        assert_eq!(err.to_string(), "Worker error: a worker stopped abnormally");
        assert!(!matches!(err, AppError::Config(_)));
    }
}
