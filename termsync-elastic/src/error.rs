use http::StatusCode;
use termsync::SyncError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ElasticError {
    #[error("HTTP request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("Failed to parse response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl From<ElasticError> for SyncError {
    fn from(e: ElasticError) -> Self {
        match e {
            ElasticError::Request { .. } => SyncError::Transport(e.to_string()),
            ElasticError::Status { status, body, .. } => {
                SyncError::BackendRejected { status, body }
            }
            ElasticError::Decode { .. } => SyncError::Json(e.to_string()),
            ElasticError::Config(msg) => SyncError::Config(msg),
        }
    }
}
