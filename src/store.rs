//! Content-store collaborator interface.
//!
//! The engine never owns graph data. Every decision is recomputed from live
//! reads against an implementation of [`ContentStore`].

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Collection, Concept, ConceptId, GraphId, GraphMeta, Vocabulary};

/// Read-side view of the terminology repository.
///
/// Absence is an explicit `Option`/empty result, never an error: a graph that
/// was deleted between the event and the read is a normal outcome.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Metadata of one graph, `None` if it does not exist.
    async fn get_graph(&self, graph_id: GraphId) -> Result<Option<GraphMeta>>;

    /// Every concept currently stored in the graph.
    async fn get_all_concepts_for_graph(&self, graph_id: GraphId) -> Result<Vec<Concept>>;

    /// Current representations of the given concepts. Ids that no longer exist
    /// are simply missing from the result.
    async fn get_concepts(&self, graph_id: GraphId, ids: &[ConceptId]) -> Result<Vec<Concept>>;

    /// The graph's vocabulary node, `None` if the graph has none.
    async fn get_vocabulary_node(&self, graph_id: GraphId) -> Result<Option<Vocabulary>>;

    async fn list_all_graph_ids(&self) -> Result<Vec<GraphId>>;

    /// Graphs that carry a vocabulary node (a subset of all graphs).
    async fn list_all_vocabulary_graph_ids(&self) -> Result<Vec<GraphId>>;

    /// Collections of a graph. Stores without collections keep the default.
    async fn get_all_collections_for_graph(&self, _graph_id: GraphId) -> Result<Vec<Collection>> {
        Ok(Vec::new())
    }
}
