use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use termsync::{Collection, Concept, ConceptId, ContentStore, GraphId, GraphMeta, Vocabulary};
use uuid::Uuid;

/// Install a test subscriber once; honours `RUST_LOG`.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[allow(dead_code)]
pub fn id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

#[derive(Default)]
struct Graph {
    concepts: BTreeMap<ConceptId, Concept>,
    vocabulary: Option<Vocabulary>,
    collections: Vec<Collection>,
}

/// Content store fixture backed by plain maps.
#[derive(Default)]
pub struct FixtureStore {
    graphs: Mutex<BTreeMap<GraphId, Graph>>,
}

#[allow(dead_code)]
impl FixtureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_concept(&self, concept: Concept) {
        self.graphs
            .lock()
            .unwrap()
            .entry(concept.graph_id)
            .or_default()
            .concepts
            .insert(concept.id, concept);
    }

    pub fn remove_concept(&self, graph_id: GraphId, concept_id: ConceptId) {
        let mut graphs = self.graphs.lock().unwrap();
        if let Some(graph) = graphs.get_mut(&graph_id) {
            graph.concepts.remove(&concept_id);
            for concept in graph.concepts.values_mut() {
                concept.broader_ids.remove(&concept_id);
                concept.narrower_ids.remove(&concept_id);
            }
        }
    }

    pub fn put_vocabulary(&self, vocabulary: Vocabulary) {
        let graph_id = vocabulary.graph_id;
        self.graphs
            .lock()
            .unwrap()
            .entry(graph_id)
            .or_default()
            .vocabulary = Some(vocabulary);
    }
}

#[async_trait]
impl ContentStore for FixtureStore {
    async fn get_graph(&self, graph_id: GraphId) -> termsync::Result<Option<GraphMeta>> {
        let graphs = self.graphs.lock().unwrap();
        Ok(graphs.get(&graph_id).map(|_| GraphMeta {
            id: graph_id,
            code: None,
        }))
    }

    async fn get_all_concepts_for_graph(
        &self,
        graph_id: GraphId,
    ) -> termsync::Result<Vec<Concept>> {
        let graphs = self.graphs.lock().unwrap();
        Ok(graphs
            .get(&graph_id)
            .map(|g| g.concepts.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_concepts(
        &self,
        graph_id: GraphId,
        ids: &[ConceptId],
    ) -> termsync::Result<Vec<Concept>> {
        let graphs = self.graphs.lock().unwrap();
        Ok(graphs
            .get(&graph_id)
            .map(|g| ids.iter().filter_map(|id| g.concepts.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    async fn get_vocabulary_node(&self, graph_id: GraphId) -> termsync::Result<Option<Vocabulary>> {
        let graphs = self.graphs.lock().unwrap();
        Ok(graphs.get(&graph_id).and_then(|g| g.vocabulary.clone()))
    }

    async fn list_all_graph_ids(&self) -> termsync::Result<Vec<GraphId>> {
        Ok(self.graphs.lock().unwrap().keys().copied().collect())
    }

    async fn list_all_vocabulary_graph_ids(&self) -> termsync::Result<Vec<GraphId>> {
        let graphs = self.graphs.lock().unwrap();
        Ok(graphs
            .iter()
            .filter(|(_, g)| g.vocabulary.is_some())
            .map(|(id, _)| *id)
            .collect())
    }

    async fn get_all_collections_for_graph(
        &self,
        graph_id: GraphId,
    ) -> termsync::Result<Vec<Collection>> {
        let graphs = self.graphs.lock().unwrap();
        Ok(graphs
            .get(&graph_id)
            .map(|g| g.collections.clone())
            .unwrap_or_default())
    }
}
