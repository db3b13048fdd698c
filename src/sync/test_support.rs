//! In-memory collaborators for driver and resolver tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::backend::{BulkSummary, IndexBackend, Refresh};
use crate::error::{Result, SyncError};
use crate::store::ContentStore;
use crate::types::{Collection, Concept, ConceptId, GraphId, GraphMeta, Vocabulary};

#[derive(Default)]
struct GraphData {
    concepts: BTreeMap<ConceptId, Concept>,
    vocabulary: Option<Vocabulary>,
    collections: Vec<Collection>,
}

#[derive(Default)]
pub struct MemoryStore {
    graphs: Mutex<BTreeMap<GraphId, GraphData>>,
    calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn put_concept(&self, concept: Concept) {
        let mut graphs = self.graphs.lock().unwrap();
        graphs
            .entry(concept.graph_id)
            .or_default()
            .concepts
            .insert(concept.id, concept);
    }

    pub fn remove_concept(&self, graph_id: GraphId, id: ConceptId) -> Option<Concept> {
        let mut graphs = self.graphs.lock().unwrap();
        let removed = graphs.get_mut(&graph_id)?.concepts.remove(&id);
        // Drop the dangling edges on the surviving neighbours as the store would.
        if let Some(data) = graphs.get_mut(&graph_id) {
            for concept in data.concepts.values_mut() {
                concept.broader_ids.remove(&id);
                concept.narrower_ids.remove(&id);
            }
        }
        removed
    }

    pub fn put_vocabulary(&self, vocabulary: Vocabulary) {
        let graph_id = vocabulary.graph_id;
        let mut graphs = self.graphs.lock().unwrap();
        graphs.entry(graph_id).or_default().vocabulary = Some(vocabulary);
    }

    pub fn put_collection(&self, collection: Collection) {
        let mut graphs = self.graphs.lock().unwrap();
        graphs
            .entry(collection.graph_id)
            .or_default()
            .collections
            .push(collection);
    }

    pub fn remove_graph(&self, graph_id: GraphId) {
        self.graphs.lock().unwrap().remove(&graph_id);
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn get_graph(&self, graph_id: GraphId) -> Result<Option<GraphMeta>> {
        self.touch();
        let graphs = self.graphs.lock().unwrap();
        Ok(graphs.get(&graph_id).map(|_| GraphMeta {
            id: graph_id,
            code: None,
        }))
    }

    async fn get_all_concepts_for_graph(&self, graph_id: GraphId) -> Result<Vec<Concept>> {
        self.touch();
        let graphs = self.graphs.lock().unwrap();
        Ok(graphs
            .get(&graph_id)
            .map(|g| g.concepts.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_concepts(&self, graph_id: GraphId, ids: &[ConceptId]) -> Result<Vec<Concept>> {
        self.touch();
        let graphs = self.graphs.lock().unwrap();
        let Some(graph) = graphs.get(&graph_id) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| graph.concepts.get(id).cloned())
            .collect())
    }

    async fn get_vocabulary_node(&self, graph_id: GraphId) -> Result<Option<Vocabulary>> {
        self.touch();
        let graphs = self.graphs.lock().unwrap();
        Ok(graphs.get(&graph_id).and_then(|g| g.vocabulary.clone()))
    }

    async fn list_all_graph_ids(&self) -> Result<Vec<GraphId>> {
        self.touch();
        Ok(self.graphs.lock().unwrap().keys().copied().collect())
    }

    async fn list_all_vocabulary_graph_ids(&self) -> Result<Vec<GraphId>> {
        self.touch();
        let graphs = self.graphs.lock().unwrap();
        Ok(graphs
            .iter()
            .filter(|(_, g)| g.vocabulary.is_some())
            .map(|(id, _)| *id)
            .collect())
    }

    async fn get_all_collections_for_graph(&self, graph_id: GraphId) -> Result<Vec<Collection>> {
        self.touch();
        let graphs = self.graphs.lock().unwrap();
        Ok(graphs
            .get(&graph_id)
            .map(|g| g.collections.clone())
            .unwrap_or_default())
    }
}

/// Backend that applies bulk payloads to an in-memory document map and
/// records every request it receives.
#[derive(Default)]
pub struct RecordingBackend {
    indices: Mutex<HashMap<String, BTreeMap<String, serde_json::Value>>>,
    requests: Mutex<Vec<String>>,
    payloads: Mutex<Vec<String>>,
    refreshes: Mutex<Vec<Refresh>>,
    fail_create: Mutex<HashSet<String>>,
    fail_bulk_calls: Mutex<HashSet<usize>>,
    bulk_calls: AtomicUsize,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(self, index: &str) -> Self {
        self.indices
            .lock()
            .unwrap()
            .insert(index.to_string(), BTreeMap::new());
        self
    }

    pub fn fail_create_for(&self, index: &str) {
        self.fail_create.lock().unwrap().insert(index.to_string());
    }

    /// Fail the n-th bulk request (0-based) with a transport error.
    pub fn fail_bulk_call(&self, n: usize) {
        self.fail_bulk_calls.lock().unwrap().insert(n);
    }

    pub fn seed_document(&self, index: &str, id: &str, source: serde_json::Value) {
        self.indices
            .lock()
            .unwrap()
            .entry(index.to_string())
            .or_default()
            .insert(id.to_string(), source);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }

    pub fn refreshes(&self) -> Vec<Refresh> {
        self.refreshes.lock().unwrap().clone()
    }

    pub fn document(&self, index: &str, id: &str) -> Option<serde_json::Value> {
        self.indices.lock().unwrap().get(index)?.get(id).cloned()
    }

    pub fn document_ids(&self, index: &str) -> Vec<String> {
        self.indices
            .lock()
            .unwrap()
            .get(index)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_index(&self, index: &str) -> bool {
        self.indices.lock().unwrap().contains_key(index)
    }

    fn record(&self, request: String) {
        self.requests.lock().unwrap().push(request);
    }
}

fn lookup<'a>(doc: &'a serde_json::Value, dotted: &str) -> Option<&'a serde_json::Value> {
    dotted.split('.').try_fold(doc, |node, key| node.get(key))
}

fn query_matches(doc: &serde_json::Value, query: &serde_json::Value) -> bool {
    if query.get("match_all").is_some() {
        return true;
    }
    if let Some(serde_json::Value::Object(m)) = query.get("match") {
        return m.iter().all(|(field, value)| lookup(doc, field) == Some(value));
    }
    if let Some(serde_json::Value::Object(m)) = query.get("terms") {
        return m.iter().all(|(field, values)| {
            let Some(wanted) = values.as_array() else {
                return false;
            };
            lookup(doc, field).is_some_and(|v| wanted.contains(v))
        });
    }
    if let Some(should) = query
        .get("bool")
        .and_then(|b| b.get("should"))
        .and_then(|s| s.as_array())
    {
        return should.iter().any(|q| query_matches(doc, q));
    }
    false
}

#[async_trait]
impl IndexBackend for RecordingBackend {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        self.record(format!("HEAD /{}", index));
        Ok(self.has_index(index))
    }

    async fn create_index(&self, index: &str, _settings: &serde_json::Value) -> Result<()> {
        self.record(format!("PUT /{}", index));
        if self.fail_create.lock().unwrap().contains(index) {
            return Err(SyncError::BackendRejected {
                status: http::StatusCode::BAD_REQUEST,
                body: "resource_already_exists_exception".to_string(),
            });
        }
        self.indices
            .lock()
            .unwrap()
            .insert(index.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn put_mapping(
        &self,
        index: &str,
        doc_type: Option<&str>,
        _mapping: &serde_json::Value,
    ) -> Result<()> {
        self.record(format!("PUT /{}/_mapping/{}", index, doc_type.unwrap_or("")));
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<bool> {
        self.record(format!("DELETE /{}", index));
        Ok(self.indices.lock().unwrap().remove(index).is_some())
    }

    async fn bulk(&self, payload: String, refresh: Refresh) -> Result<BulkSummary> {
        let call = self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        self.record("POST /_bulk".to_string());
        self.payloads.lock().unwrap().push(payload.clone());
        self.refreshes.lock().unwrap().push(refresh);
        if self.fail_bulk_calls.lock().unwrap().contains(&call) {
            return Err(SyncError::Transport("connection reset".to_string()));
        }

        let mut summary = BulkSummary::default();
        let mut indices = self.indices.lock().unwrap();
        let mut lines = payload.lines();
        while let Some(line) = lines.next() {
            let action: serde_json::Value = serde_json::from_str(line)?;
            if let Some(meta) = action.get("index") {
                let source: serde_json::Value =
                    serde_json::from_str(lines.next().unwrap_or("null"))?;
                let index = meta["_index"].as_str().unwrap_or_default().to_string();
                let id = meta["_id"].as_str().unwrap_or_default().to_string();
                indices.entry(index).or_default().insert(id, source);
            } else if let Some(meta) = action.get("delete") {
                let index = meta["_index"].as_str().unwrap_or_default();
                let id = meta["_id"].as_str().unwrap_or_default();
                if let Some(docs) = indices.get_mut(index) {
                    docs.remove(id);
                }
            }
            summary.succeeded += 1;
        }
        Ok(summary)
    }

    async fn delete_by_query(&self, index: &str, query: &serde_json::Value) -> Result<u64> {
        self.record(format!("POST /{}/_delete_by_query", index));
        let inner = query.get("query").unwrap_or(query);
        let mut indices = self.indices.lock().unwrap();
        let Some(docs) = indices.get_mut(index) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|_, doc| !query_matches(doc, inner));
        Ok((before - docs.len()) as u64)
    }

    async fn get_source(
        &self,
        index: &str,
        _doc_type: Option<&str>,
        doc_id: &str,
    ) -> Result<Option<serde_json::Value>> {
        self.record(format!("GET /{}/{}/_source", index, doc_id));
        Ok(self.document(index, doc_id))
    }

    async fn search(&self, index: &str, query: &serde_json::Value) -> Result<serde_json::Value> {
        self.record(format!("POST /{}/_search", index));
        let inner = query.get("query").unwrap_or(query);
        let indices = self.indices.lock().unwrap();
        let hits: Vec<serde_json::Value> = indices
            .get(index)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, doc)| query_matches(doc, inner))
                    .map(|(id, doc)| serde_json::json!({ "_id": id, "_source": doc }))
                    .collect()
            })
            .unwrap_or_default();
        Ok(serde_json::json!({
            "hits": { "total": hits.len(), "hits": hits }
        }))
    }
}
