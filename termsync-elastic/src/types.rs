use serde::Deserialize;
use std::collections::HashMap;
use termsync::BulkSummary;

/// Body of a `POST /_bulk` answer.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub errors: bool,
    /// One single-key object per submitted action: `{"index": {...}}`.
    #[serde(default)]
    pub items: Vec<HashMap<String, BulkItemResult>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkItemResult {
    #[serde(rename = "_index", default)]
    pub index: Option<String>,
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    pub status: u16,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl BulkItemResult {
    /// Deleting an already-absent document is the state we wanted.
    pub fn is_ok(&self, action: &str) -> bool {
        (200..300).contains(&self.status) || (action == "delete" && self.status == 404)
    }
}

impl BulkResponse {
    pub fn failures(&self) -> impl Iterator<Item = (&str, &BulkItemResult)> {
        self.items
            .iter()
            .flat_map(|item| item.iter())
            .filter(|(action, result)| !result.is_ok(action))
            .map(|(action, result)| (action.as_str(), result))
    }

    pub fn summary(&self) -> BulkSummary {
        let total = self.items.len();
        let failed = self.failures().count();
        BulkSummary {
            succeeded: total.saturating_sub(failed),
            failed,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteByQueryResponse {
    #[serde(default)]
    pub deleted: u64,
    #[serde(default)]
    pub failures: Vec<serde_json::Value>,
}
