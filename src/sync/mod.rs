pub mod bulk;
pub mod change_set;
pub mod closure;
pub mod driver;
pub mod lifecycle;
pub mod policy;

#[cfg(test)]
pub(crate) mod test_support;

pub use bulk::{build_bulk_payload, BulkAction, BulkRequest};
pub use change_set::{ChangeSet, SyncEvent};
pub use closure::{Closure, ClosureResolver, Expansion};
pub use driver::{SyncDriver, SyncReport};
pub use lifecycle::{IndexLifecycle, IndexOutcome, IndexState, LifecycleReport};
pub use policy::{ConceptAction, ReindexPolicy, SyncPlan, VocabularyAction};
