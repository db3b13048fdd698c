use http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum SyncError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Index backend rejected request ({status}): {body}")]
    BackendRejected { status: StatusCode, body: String },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Index lifecycle failed for: {}", failed.join(", "))]
    Lifecycle { failed: Vec<String> },

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self {
        SyncError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Json(e.to_string())
    }
}

impl SyncError {
    /// Per-item and per-batch failures that a sync cycle absorbs and counts.
    /// Everything else is structural and must reach the caller of the
    /// initialization routine.
    pub fn is_recoverable(&self) -> bool {
        match self {
            SyncError::Transport(_) => true,
            SyncError::BackendRejected { .. } => true,
            SyncError::InvalidDocument(_) => true,
            SyncError::MissingField(_) => true,
            SyncError::Json(_) => true,
            SyncError::Lifecycle { .. } => false,
            SyncError::Io(_) => false,
            SyncError::Config(_) => false,
        }
    }

    pub fn backend_status(&self) -> Option<StatusCode> {
        match self {
            SyncError::BackendRejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}
