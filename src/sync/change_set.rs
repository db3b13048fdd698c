use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::types::{ConceptId, GraphId};

/// Which content-store operation produced a [`ChangeSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncEvent {
    Update,
    Delete,
}

/// Ids touched by one content mutation, scoped to a single graph.
///
/// Built by whatever detects the mutation and consumed once by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    pub graph_id: GraphId,
    #[serde(default)]
    pub vocabulary_ids: BTreeSet<Uuid>,
    #[serde(default)]
    pub concept_ids: BTreeSet<ConceptId>,
    /// A vocabulary-level node itself was touched.
    #[serde(default)]
    pub has_vocabulary: bool,
}

impl ChangeSet {
    pub fn new(graph_id: GraphId) -> Self {
        Self {
            graph_id,
            vocabulary_ids: BTreeSet::new(),
            concept_ids: BTreeSet::new(),
            has_vocabulary: false,
        }
    }

    pub fn with_concepts(mut self, ids: impl IntoIterator<Item = ConceptId>) -> Self {
        self.concept_ids.extend(ids);
        self
    }

    pub fn with_vocabularies(mut self, ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.vocabulary_ids.extend(ids);
        self
    }

    pub fn with_vocabulary_node(mut self) -> Self {
        self.has_vocabulary = true;
        self
    }

    /// Nothing to do: no ids on either track and no vocabulary node.
    pub fn is_empty(&self) -> bool {
        !self.has_vocabulary && self.vocabulary_ids.is_empty() && self.concept_ids.is_empty()
    }
}
