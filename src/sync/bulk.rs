//! Typed builder for the newline-delimited bulk wire format.
//!
//! Operations are accumulated as records and serialized once:
//!
//! ```text
//! {"index":{"_index":"concepts","_type":"concept","_id":"<graph>/<concept>"}}
//! {...document...}
//! {"delete":{"_index":"concepts","_type":"concept","_id":"<graph>/<concept>"}}
//! ```

use serde::Serialize;

use crate::error::Result;
use crate::types::{DocumentId, IndexEntity, IndexTarget};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionMeta {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_type", skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(rename = "_id")]
    pub id: DocumentId,
}

impl ActionMeta {
    fn new(target: &IndexTarget, id: DocumentId) -> Self {
        Self {
            index: target.index.clone(),
            doc_type: target.doc_type.clone(),
            id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BulkAction {
    Index {
        meta: ActionMeta,
        source: serde_json::Value,
    },
    Delete {
        meta: ActionMeta,
    },
}

#[derive(Serialize)]
enum ActionLine<'a> {
    #[serde(rename = "index")]
    Index(&'a ActionMeta),
    #[serde(rename = "delete")]
    Delete(&'a ActionMeta),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkRequest {
    actions: Vec<BulkAction>,
    upserts: usize,
    deletes: usize,
}

impl BulkRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index (create-or-replace) a rendered entity under its deterministic id.
    pub fn upsert(&mut self, target: &IndexTarget, entity: &IndexEntity) -> &mut Self {
        self.upsert_document(target, entity.document_id(), entity.render())
    }

    pub fn upsert_document(
        &mut self,
        target: &IndexTarget,
        id: DocumentId,
        source: serde_json::Value,
    ) -> &mut Self {
        self.actions.push(BulkAction::Index {
            meta: ActionMeta::new(target, id),
            source,
        });
        self.upserts += 1;
        self
    }

    pub fn delete(&mut self, target: &IndexTarget, id: DocumentId) -> &mut Self {
        self.actions.push(BulkAction::Delete {
            meta: ActionMeta::new(target, id),
        });
        self.deletes += 1;
        self
    }

    pub fn actions(&self) -> &[BulkAction] {
        &self.actions
    }

    pub fn upsert_count(&self) -> usize {
        self.upserts
    }

    pub fn delete_count(&self) -> usize {
        self.deletes
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// An empty request must never be sent.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Serialize every action, each line terminated by `\n`.
    pub fn to_ndjson(&self) -> Result<String> {
        let mut out = String::new();
        for action in &self.actions {
            match action {
                BulkAction::Index { meta, source } => {
                    out.push_str(&serde_json::to_string(&ActionLine::Index(meta))?);
                    out.push('\n');
                    out.push_str(&serde_json::to_string(source)?);
                    out.push('\n');
                }
                BulkAction::Delete { meta } => {
                    out.push_str(&serde_json::to_string(&ActionLine::Delete(meta))?);
                    out.push('\n');
                }
            }
        }
        Ok(out)
    }

    /// Wire payload, or `None` when there is nothing to send.
    pub fn into_payload(self) -> Result<Option<String>> {
        if self.is_empty() {
            return Ok(None);
        }
        self.to_ndjson().map(Some)
    }
}

/// Upserts followed by deletes, all against one target; `None` is a no-op.
pub fn build_bulk_payload(
    target: &IndexTarget,
    upserts: &[IndexEntity],
    deletes: &[DocumentId],
) -> Result<Option<String>> {
    let mut request = BulkRequest::new();
    for entity in upserts {
        request.upsert(target, entity);
    }
    for id in deletes {
        request.delete(target, id.clone());
    }
    request.into_payload()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{document_id, Concept};
    use uuid::Uuid;

    fn target() -> IndexTarget {
        IndexTarget::new("concepts", Some("concept".to_string()))
    }

    fn concept(n: u128) -> IndexEntity {
        Concept::new(Uuid::from_u128(1), Uuid::from_u128(n)).into()
    }

    #[test]
    fn test_empty_payload_is_noop() {
        assert!(build_bulk_payload(&target(), &[], &[]).unwrap().is_none());
        assert!(BulkRequest::new().is_empty());
    }

    #[test]
    fn test_upsert_is_two_lines_delete_is_one() {
        let del_id = document_id(Uuid::from_u128(1), Uuid::from_u128(9));
        let payload = build_bulk_payload(&target(), &[concept(2)], &[del_id.clone()])
            .unwrap()
            .unwrap();

        let lines: Vec<&str> = payload.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(payload.ends_with('\n'));

        let header: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(header["index"]["_index"], "concepts");
        assert_eq!(header["index"]["_type"], "concept");
        assert_eq!(
            header["index"]["_id"],
            document_id(Uuid::from_u128(1), Uuid::from_u128(2))
        );

        let body: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(body["id"], serde_json::json!(Uuid::from_u128(2)));

        let delete: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(delete["delete"]["_id"], del_id);
    }

    #[test]
    fn test_action_header_key_order() {
        let mut request = BulkRequest::new();
        request.delete(&target(), "g/c".to_string());
        assert_eq!(
            request.to_ndjson().unwrap(),
            "{\"delete\":{\"_index\":\"concepts\",\"_type\":\"concept\",\"_id\":\"g/c\"}}\n"
        );
    }

    #[test]
    fn test_typeless_target_omits_type() {
        let typeless = IndexTarget::new("concepts", None);
        let mut request = BulkRequest::new();
        request.delete(&typeless, "g/c".to_string());
        let payload = request.to_ndjson().unwrap();
        assert!(!payload.contains("_type"));
    }

    #[test]
    fn test_counts_track_action_kinds() {
        let mut request = BulkRequest::new();
        request
            .upsert(&target(), &concept(2))
            .upsert(&target(), &concept(3))
            .delete(&target(), "g/x".to_string());
        assert_eq!(request.upsert_count(), 2);
        assert_eq!(request.delete_count(), 1);
        assert_eq!(request.len(), 3);
        assert!(matches!(request.actions()[2], BulkAction::Delete { .. }));
    }

    #[test]
    fn test_repeated_upsert_reuses_document_id() {
        let payload = build_bulk_payload(&target(), &[concept(2), concept(2)], &[])
            .unwrap()
            .unwrap();
        let ids: Vec<String> = payload
            .lines()
            .step_by(2)
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap())
            .map(|v| v["index"]["_id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], ids[1]);
    }
}
