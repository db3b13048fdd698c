//! Keeps a search index consistent with a terminology content store.
//!
//! Change notifications ([`ChangeSet`]) are classified into targeted or
//! full-reindex work per track, expanded over one hop of broader/narrower
//! relations, and written to an [`IndexBackend`] as bulk requests by the
//! [`SyncDriver`].

pub mod backend;
pub mod config;
pub mod error;
pub mod store;
pub mod sync;
pub mod types;

pub use backend::{BulkSummary, IndexBackend, Refresh};
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use store::ContentStore;
pub use sync::{ChangeSet, SyncDriver, SyncEvent, SyncReport};
pub use types::{
    document_id, Collection, Concept, ConceptId, DocumentId, EntityKind, GraphId, GraphMeta,
    IndexEntity, IndexTarget, Vocabulary,
};
