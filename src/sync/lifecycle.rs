//! Startup management of the configured indices.
//!
//! Each managed index is driven `Absent -> Created -> Ready` on its own; one
//! index failing does not stop the others from being attempted, but the
//! aggregate result fails and no full reindex may follow it.

use serde::Serialize;

use crate::backend::IndexBackend;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexState {
    Absent,
    /// The index exists but no mapping has been applied in this run.
    Created,
    /// Exists with its mapping in place; safe to write to.
    Ready,
}

#[derive(Debug, Clone)]
pub struct IndexOutcome {
    pub index: String,
    pub state: IndexState,
    /// The index did not exist before this run.
    pub created: bool,
    pub error: Option<SyncError>,
}

impl IndexOutcome {
    pub fn is_ready(&self) -> bool {
        self.state == IndexState::Ready && self.error.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LifecycleReport {
    pub outcomes: Vec<IndexOutcome>,
}

impl LifecycleReport {
    pub fn all_ready(&self) -> bool {
        self.outcomes.iter().all(IndexOutcome::is_ready)
    }

    pub fn any_created(&self) -> bool {
        self.outcomes.iter().any(|o| o.created)
    }

    pub fn failed(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_ready())
            .map(|o| o.index.clone())
            .collect()
    }
}

pub struct IndexLifecycle<'a> {
    backend: &'a dyn IndexBackend,
    config: &'a SyncConfig,
}

impl<'a> IndexLifecycle<'a> {
    pub fn new(backend: &'a dyn IndexBackend, config: &'a SyncConfig) -> Self {
        Self { backend, config }
    }

    pub async fn index_exists(&self, index: &str) -> Result<bool> {
        self.backend.index_exists(index).await
    }

    /// Create the index if it is missing. Returns `true` when it was created.
    pub async fn ensure_index(&self, index: &str, settings: &serde_json::Value) -> Result<bool> {
        if self.backend.index_exists(index).await? {
            tracing::debug!("[LIFECYCLE {}] already exists", index);
            return Ok(false);
        }
        self.backend.create_index(index, settings).await?;
        tracing::info!("[LIFECYCLE {}] created", index);
        Ok(true)
    }

    pub async fn ensure_mapping(&self, index: &str, mapping: &serde_json::Value) -> Result<()> {
        let doc_type = self.config.mapping_type_for(index);
        self.backend.put_mapping(index, doc_type, mapping).await?;
        tracing::info!(
            "[LIFECYCLE {}] mapping applied (type={})",
            index,
            doc_type.unwrap_or("-")
        );
        Ok(())
    }

    pub async fn drop_index(&self, index: &str) -> Result<bool> {
        let existed = self.backend.delete_index(index).await?;
        if existed {
            tracing::info!("[LIFECYCLE {}] deleted", index);
        }
        Ok(existed)
    }

    async fn prepare(
        &self,
        index: &str,
        reset: bool,
        settings: &serde_json::Value,
        mapping: &serde_json::Value,
        state: &mut IndexState,
    ) -> Result<bool> {
        if reset {
            self.drop_index(index).await?;
            *state = IndexState::Absent;
        }
        if !self.ensure_index(index, settings).await? {
            // Existing indices keep the mapping they were created with.
            *state = IndexState::Ready;
            return Ok(false);
        }
        *state = IndexState::Created;
        self.ensure_mapping(index, mapping).await?;
        *state = IndexState::Ready;
        Ok(true)
    }

    /// Drive every configured index to `Ready`, dropping them first when
    /// `reset` is set. Fails with [`SyncError::Lifecycle`] naming every index
    /// that did not make it.
    pub async fn initialize_all(&self, reset: bool) -> Result<LifecycleReport> {
        self.config.validate()?;
        let settings = self.config.index_settings()?;
        let mapping = self.config.index_mapping()?;

        let mut report = LifecycleReport::default();
        for index in &self.config.index_names {
            let mut state = IndexState::Absent;
            let result = self
                .prepare(index, reset, &settings, &mapping, &mut state)
                .await;
            let outcome = match result {
                Ok(created) => IndexOutcome {
                    index: index.clone(),
                    state,
                    created,
                    error: None,
                },
                Err(e) => {
                    tracing::error!("[LIFECYCLE {}] failed in state {:?}: {}", index, state, e);
                    IndexOutcome {
                        index: index.clone(),
                        state,
                        created: state != IndexState::Absent,
                        error: Some(e),
                    }
                }
            };
            report.outcomes.push(outcome);
        }

        let failed = report.failed();
        if !failed.is_empty() {
            return Err(SyncError::Lifecycle { failed });
        }
        Ok(report)
    }
}
