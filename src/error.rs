use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Mic access denied: {0}")]
    MicUnavailable(String),

    #[error("Motion sensing not supported")]
    MotionUnsupported,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Permission error: {0}")]
    PermissionError(String),

    #[error("No log data to export.")]
    NothingToExport,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sensor error: {0}")]
    Sensor(String),
}
