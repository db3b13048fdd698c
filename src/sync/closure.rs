//! One-hop closure over broader/narrower edges.
//!
//! Adding or removing an edge changes the denormalized relation fields of the
//! concept on the other end, so that neighbour's document has to be rebuilt
//! even though its own attributes did not change. Only one hop is followed:
//! a change that reshapes relations further out is expected to cross the
//! full-reindex threshold instead.

use std::collections::{BTreeSet, HashSet};

use crate::backend::IndexBackend;
use crate::error::Result;
use crate::store::ContentStore;
use crate::types::{document_id, Concept, ConceptId, GraphId, IndexTarget};

/// Union of broader and narrower ids over every snapshot.
pub fn neighbor_ids<'a>(snapshots: impl IntoIterator<Item = &'a Concept>) -> BTreeSet<ConceptId> {
    snapshots
        .into_iter()
        .flat_map(|concept| concept.related_ids().copied())
        .collect()
}

/// Seed ids plus the neighbours they pull in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Closure {
    pub seeds: BTreeSet<ConceptId>,
    /// Neighbours that are not seeds themselves.
    pub neighbors: BTreeSet<ConceptId>,
}

impl Closure {
    pub fn expand<'a>(
        seeds: impl IntoIterator<Item = ConceptId>,
        snapshots: impl IntoIterator<Item = &'a Concept>,
    ) -> Self {
        let seeds: BTreeSet<ConceptId> = seeds.into_iter().collect();
        let neighbors = neighbor_ids(snapshots)
            .into_iter()
            .filter(|id| !seeds.contains(id))
            .collect();
        Self { seeds, neighbors }
    }

    pub fn all(&self) -> BTreeSet<ConceptId> {
        self.seeds.union(&self.neighbors).copied().collect()
    }

    pub fn contains(&self, id: &ConceptId) -> bool {
        self.seeds.contains(id) || self.neighbors.contains(id)
    }

    pub fn len(&self) -> usize {
        self.seeds.len() + self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty() && self.neighbors.is_empty()
    }
}

/// A resolved closure together with the current representations of every
/// member that still exists in the content store.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    pub closure: Closure,
    pub current: Vec<Concept>,
}

/// Resolves closures against live reads: the content store for the
/// post-mutation state and the concept index for the pre-mutation state.
pub struct ClosureResolver<'a> {
    store: &'a dyn ContentStore,
    backend: &'a dyn IndexBackend,
    target: &'a IndexTarget,
}

impl<'a> ClosureResolver<'a> {
    pub fn new(
        store: &'a dyn ContentStore,
        backend: &'a dyn IndexBackend,
        target: &'a IndexTarget,
    ) -> Self {
        Self {
            store,
            backend,
            target,
        }
    }

    /// Concepts as they are currently indexed. Ids without a document, or
    /// with a document that no longer parses, are skipped.
    pub async fn indexed_snapshot(
        &self,
        graph_id: GraphId,
        ids: &BTreeSet<ConceptId>,
    ) -> Result<Vec<Concept>> {
        let mut snapshot = Vec::with_capacity(ids.len());
        for id in ids {
            let doc_id = document_id(graph_id, *id);
            let source = self
                .backend
                .get_source(&self.target.index, self.target.doc_type.as_deref(), &doc_id)
                .await?;
            let Some(source) = source else {
                continue;
            };
            match Concept::from_document(&source) {
                Ok(concept) => snapshot.push(concept),
                Err(e) => {
                    tracing::warn!("[CLOSURE {}] skipping unreadable snapshot: {}", doc_id, e);
                }
            }
        }
        Ok(snapshot)
    }

    /// Update path: seeds plus every neighbour they have before or after the
    /// mutation.
    pub async fn expand(
        &self,
        graph_id: GraphId,
        ids: &BTreeSet<ConceptId>,
    ) -> Result<Expansion> {
        if ids.is_empty() {
            return Ok(Expansion::default());
        }

        let seed_list: Vec<ConceptId> = ids.iter().copied().collect();
        let after = self.store.get_concepts(graph_id, &seed_list).await?;
        let before = self.indexed_snapshot(graph_id, ids).await?;

        let closure = Closure::expand(ids.iter().copied(), before.iter().chain(after.iter()));
        tracing::debug!(
            "[CLOSURE {}] {} seed(s) expanded by {} neighbour(s)",
            graph_id,
            closure.seeds.len(),
            closure.neighbors.len()
        );

        let mut current = after;
        if !closure.neighbors.is_empty() {
            let neighbor_list: Vec<ConceptId> = closure.neighbors.iter().copied().collect();
            current.extend(self.store.get_concepts(graph_id, &neighbor_list).await?);
        }

        Ok(Expansion {
            current: dedup_by_id(current),
            closure,
        })
    }

    /// Delete path: the removed ids are never re-fetched; only their
    /// surviving neighbours, as recorded in `prior`, are.
    pub async fn expand_deleted(
        &self,
        graph_id: GraphId,
        deleted: &BTreeSet<ConceptId>,
        prior: &[Concept],
    ) -> Result<Expansion> {
        let closure = Closure::expand(deleted.iter().copied(), prior.iter());
        if closure.neighbors.is_empty() {
            return Ok(Expansion {
                closure,
                current: Vec::new(),
            });
        }

        let neighbor_list: Vec<ConceptId> = closure.neighbors.iter().copied().collect();
        let current = self.store.get_concepts(graph_id, &neighbor_list).await?;
        Ok(Expansion {
            current: dedup_by_id(current),
            closure,
        })
    }
}

fn dedup_by_id(concepts: Vec<Concept>) -> Vec<Concept> {
    let mut seen = HashSet::new();
    concepts
        .into_iter()
        .filter(|c| seen.insert(c.id))
        .collect()
}
