//! Index-backend collaborator interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Refresh behaviour requested from a bulk write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Refresh {
    /// Return as soon as the operations are accepted.
    #[default]
    None,
    /// Block until the written documents are visible to search.
    WaitFor,
}

impl Refresh {
    pub fn from_wait(wait_for_refresh: bool) -> Self {
        if wait_for_refresh {
            Refresh::WaitFor
        } else {
            Refresh::None
        }
    }

    /// Query-string value, `None` when the parameter must be omitted.
    pub fn as_param(&self) -> Option<&'static str> {
        match self {
            Refresh::None => None,
            Refresh::WaitFor => Some("wait_for"),
        }
    }
}

/// Per-item outcome of one bulk request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl BulkSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Transport to the search backend.
///
/// Implementations map "does not exist" answers (HTTP 404 on existence and
/// `_source` lookups) to `false`/`None`, and every other non-success answer to
/// [`crate::SyncError::BackendRejected`].
#[async_trait]
pub trait IndexBackend: Send + Sync {
    async fn index_exists(&self, index: &str) -> Result<bool>;

    async fn create_index(&self, index: &str, settings: &serde_json::Value) -> Result<()>;

    async fn put_mapping(
        &self,
        index: &str,
        doc_type: Option<&str>,
        mapping: &serde_json::Value,
    ) -> Result<()>;

    /// Returns `false` when there was nothing to delete.
    async fn delete_index(&self, index: &str) -> Result<bool>;

    /// Submit one newline-delimited bulk payload.
    async fn bulk(&self, payload: String, refresh: Refresh) -> Result<BulkSummary>;

    /// Returns the number of deleted documents.
    async fn delete_by_query(&self, index: &str, query: &serde_json::Value) -> Result<u64>;

    async fn get_source(
        &self,
        index: &str,
        doc_type: Option<&str>,
        doc_id: &str,
    ) -> Result<Option<serde_json::Value>>;

    async fn search(&self, index: &str, query: &serde_json::Value) -> Result<serde_json::Value>;
}
