//! Full-vs-targeted classification of a change set.
//!
//! The thresholds only trade network round trips against a full scan; any
//! value produces a correct index.

use std::collections::BTreeSet;
use uuid::Uuid;

use super::change_set::{ChangeSet, SyncEvent};
use crate::config::{SyncConfig, DEFAULT_REINDEX_THRESHOLD};
use crate::types::ConceptId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VocabularyAction {
    None,
    /// Re-derive the listing entries of the named vocabularies only.
    Targeted(BTreeSet<Uuid>),
    /// Rebuild every vocabulary listing entry.
    FullReindex,
    /// The vocabulary was deleted: drop its listing entries.
    Remove(BTreeSet<Uuid>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConceptAction {
    None,
    /// Upsert these concepts plus their one-hop neighbours.
    TargetedUpdate(BTreeSet<ConceptId>),
    /// Delete these concepts and refresh their surviving neighbours.
    TargetedDelete(BTreeSet<ConceptId>),
    /// Re-derive every concept of the graph. `removed` ids (delete events
    /// over the threshold) are deleted in the same pass.
    FullGraphReindex { removed: BTreeSet<ConceptId> },
    /// The whole graph is gone: drop all of its documents.
    PurgeGraph,
}

/// Independent decisions for the two tracks of one sync cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    pub vocabulary: VocabularyAction,
    pub concepts: ConceptAction,
}

impl SyncPlan {
    pub fn is_noop(&self) -> bool {
        self.vocabulary == VocabularyAction::None && self.concepts == ConceptAction::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReindexPolicy {
    pub vocabulary_threshold: usize,
    pub concept_threshold: usize,
}

impl Default for ReindexPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_REINDEX_THRESHOLD)
    }
}

impl ReindexPolicy {
    pub fn new(threshold: usize) -> Self {
        Self {
            vocabulary_threshold: threshold,
            concept_threshold: threshold,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            vocabulary_threshold: config.vocabulary_reindex_threshold,
            concept_threshold: config.concept_reindex_threshold,
        }
    }

    pub fn classify(&self, change: &ChangeSet, event: SyncEvent) -> SyncPlan {
        SyncPlan {
            vocabulary: self.classify_vocabularies(change, event),
            concepts: self.classify_concepts(change, event),
        }
    }

    fn classify_vocabularies(&self, change: &ChangeSet, event: SyncEvent) -> VocabularyAction {
        if change.has_vocabulary {
            return match event {
                SyncEvent::Update => VocabularyAction::FullReindex,
                SyncEvent::Delete => VocabularyAction::Remove(change.vocabulary_ids.clone()),
            };
        }
        if change.vocabulary_ids.len() > self.vocabulary_threshold {
            VocabularyAction::FullReindex
        } else if !change.vocabulary_ids.is_empty() {
            VocabularyAction::Targeted(change.vocabulary_ids.clone())
        } else {
            VocabularyAction::None
        }
    }

    fn classify_concepts(&self, change: &ChangeSet, event: SyncEvent) -> ConceptAction {
        let over_threshold = change.concept_ids.len() > self.concept_threshold;
        match event {
            // Concept documents denormalize only the (immutable) graph id, so a
            // vocabulary-node edit never invalidates them.
            SyncEvent::Update => {
                if over_threshold {
                    ConceptAction::FullGraphReindex {
                        removed: BTreeSet::new(),
                    }
                } else if change.concept_ids.is_empty() {
                    ConceptAction::None
                } else {
                    ConceptAction::TargetedUpdate(change.concept_ids.clone())
                }
            }
            SyncEvent::Delete => {
                if change.has_vocabulary {
                    ConceptAction::PurgeGraph
                } else if over_threshold {
                    ConceptAction::FullGraphReindex {
                        removed: change.concept_ids.clone(),
                    }
                } else if change.concept_ids.is_empty() {
                    ConceptAction::None
                } else {
                    ConceptAction::TargetedDelete(change.concept_ids.clone())
                }
            }
        }
    }
}
