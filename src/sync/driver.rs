//! Per-cycle synchronization driver.
//!
//! Every entry point classifies first, then takes either the targeted path
//! (expand, fetch, build, write) or the full-scan path (enumerate, fetch,
//! build in batches, write). Nothing is cached between cycles; each cycle
//! re-reads the content store and the index.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use super::bulk::BulkRequest;
use super::change_set::{ChangeSet, SyncEvent};
use super::closure::ClosureResolver;
use super::lifecycle::IndexLifecycle;
use super::policy::{ConceptAction, ReindexPolicy, VocabularyAction};
use crate::backend::{IndexBackend, Refresh};
use crate::config::SyncConfig;
use crate::error::Result;
use crate::store::ContentStore;
use crate::types::{
    document_id, Concept, ConceptId, DocumentId, EntityKind, GraphId, IndexEntity, IndexTarget,
};

/// Outcome counters of one driver call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub upserted: usize,
    pub deleted: usize,
    /// Bulk requests that failed as a whole.
    pub failed_batches: usize,
    /// Individual operations the backend rejected inside an accepted request.
    pub rejected: usize,
    /// Entities named by the change that could not be read back.
    pub skipped: usize,
}

impl SyncReport {
    pub fn merge(&mut self, other: SyncReport) {
        self.upserted += other.upserted;
        self.deleted += other.deleted;
        self.failed_batches += other.failed_batches;
        self.rejected += other.rejected;
        self.skipped += other.skipped;
    }

    pub fn is_clean(&self) -> bool {
        self.failed_batches == 0 && self.rejected == 0
    }
}

pub struct SyncDriver<S, B> {
    store: Arc<S>,
    backend: Arc<B>,
    config: Arc<SyncConfig>,
    policy: ReindexPolicy,
}

impl<S, B> Clone for SyncDriver<S, B> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            backend: Arc::clone(&self.backend),
            config: Arc::clone(&self.config),
            policy: self.policy,
        }
    }
}

impl<S, B> SyncDriver<S, B>
where
    S: ContentStore + 'static,
    B: IndexBackend + 'static,
{
    pub fn new(store: Arc<S>, backend: Arc<B>, config: SyncConfig) -> Self {
        let policy = ReindexPolicy::from_config(&config);
        Self {
            store,
            backend,
            config: Arc::new(config),
            policy,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn policy(&self) -> ReindexPolicy {
        self.policy
    }

    /// Startup: bring every managed index to `Ready`, then run a full
    /// reindex when at least one of them had to be created.
    pub async fn initialize(&self) -> Result<SyncReport> {
        let lifecycle = IndexLifecycle::new(self.backend.as_ref(), &self.config);
        let state = lifecycle
            .initialize_all(self.config.delete_index_on_restart)
            .await?;

        if !state.any_created() {
            tracing::info!("[SYNC] indices already present, skipping initial reindex");
            return Ok(SyncReport::default());
        }
        tracing::info!("[SYNC] fresh index detected, running initial full reindex");
        self.full_reindex().await
    }

    /// Drop every document from the managed indices and rebuild them.
    pub async fn reindex(&self) -> Result<SyncReport> {
        let match_all = serde_json::json!({ "query": { "match_all": {} } });
        let mut report = SyncReport::default();
        for index in &self.config.index_names {
            let removed = self.backend.delete_by_query(index, &match_all).await?;
            tracing::info!("[SYNC] cleared {} document(s) from {}", removed, index);
            report.deleted += removed as usize;
        }
        report.merge(self.full_reindex().await?);
        Ok(report)
    }

    /// Forward a raw query body to the backend.
    pub async fn free_search(
        &self,
        index: &str,
        query: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.backend.search(index, query).await
    }

    pub async fn after_update(&self, change: &ChangeSet) -> Result<SyncReport> {
        let plan = self.policy.classify(change, SyncEvent::Update);
        if plan.is_noop() {
            tracing::debug!("[SYNC {}] empty update, nothing to do", change.graph_id);
            return Ok(SyncReport::default());
        }
        tracing::debug!("[SYNC {}] update plan: {:?}", change.graph_id, plan);

        let vocabularies = self.apply_vocabulary(change.graph_id, &plan.vocabulary).await;
        let concepts = self.apply_concepts(change.graph_id, &plan.concepts, None).await;
        combine(change.graph_id, vocabularies, concepts)
    }

    /// Delete path with the pre-deletion snapshot read from the concept index.
    pub async fn after_delete(&self, change: &ChangeSet) -> Result<SyncReport> {
        self.handle_delete(change, None).await
    }

    /// Delete path with a caller-supplied pre-deletion snapshot of the removed
    /// concepts.
    pub async fn after_delete_with_snapshot(
        &self,
        change: &ChangeSet,
        prior: &[Concept],
    ) -> Result<SyncReport> {
        self.handle_delete(change, Some(prior)).await
    }

    async fn handle_delete(
        &self,
        change: &ChangeSet,
        prior: Option<&[Concept]>,
    ) -> Result<SyncReport> {
        let plan = self.policy.classify(change, SyncEvent::Delete);
        if plan.is_noop() {
            tracing::debug!("[SYNC {}] empty delete, nothing to do", change.graph_id);
            return Ok(SyncReport::default());
        }
        tracing::debug!("[SYNC {}] delete plan: {:?}", change.graph_id, plan);

        let vocabularies = self.apply_vocabulary(change.graph_id, &plan.vocabulary).await;
        let concepts = self.apply_concepts(change.graph_id, &plan.concepts, prior).await;
        combine(change.graph_id, vocabularies, concepts)
    }

    async fn apply_vocabulary(
        &self,
        graph_id: GraphId,
        action: &VocabularyAction,
    ) -> Result<SyncReport> {
        match action {
            VocabularyAction::None => Ok(SyncReport::default()),
            VocabularyAction::Targeted(ids) => self.refresh_vocabulary(graph_id, ids).await,
            VocabularyAction::FullReindex => self.reindex_vocabularies().await,
            VocabularyAction::Remove(ids) => self.remove_vocabulary(graph_id, ids).await,
        }
    }

    async fn apply_concepts(
        &self,
        graph_id: GraphId,
        action: &ConceptAction,
        prior: Option<&[Concept]>,
    ) -> Result<SyncReport> {
        match action {
            ConceptAction::None => Ok(SyncReport::default()),
            ConceptAction::TargetedUpdate(ids) => self.update_concepts(graph_id, ids).await,
            ConceptAction::TargetedDelete(ids) => self.delete_concepts(graph_id, ids, prior).await,
            // Event-driven writes are visible before the call returns.
            ConceptAction::FullGraphReindex { removed } => {
                let deletes = removed.iter().map(|id| document_id(graph_id, *id)).collect();
                self.reindex_graph_with_deletes(graph_id, deletes, true).await
            }
            ConceptAction::PurgeGraph => self.purge_graph(graph_id).await,
        }
    }

    /// The content store keys vocabulary nodes by graph, so a targeted
    /// refresh re-reads that one node.
    async fn refresh_vocabulary(
        &self,
        graph_id: GraphId,
        ids: &BTreeSet<Uuid>,
    ) -> Result<SyncReport> {
        let target = self.config.target_for(EntityKind::Vocabulary);
        let Some(vocabulary) = self.store.get_vocabulary_node(graph_id).await? else {
            tracing::warn!(
                "[SYNC {}] vocabulary node missing, {} listing entr(ies) not refreshed",
                graph_id,
                ids.len()
            );
            return Ok(SyncReport {
                skipped: ids.len(),
                ..Default::default()
            });
        };

        let mut request = BulkRequest::new();
        request.upsert(&target, &IndexEntity::from(vocabulary));
        self.write(request, Refresh::WaitFor).await
    }

    async fn remove_vocabulary(
        &self,
        graph_id: GraphId,
        ids: &BTreeSet<Uuid>,
    ) -> Result<SyncReport> {
        let query = serde_json::json!({
            "query": {
                "bool": {
                    "should": [
                        { "terms": { "id": ids.iter().map(Uuid::to_string).collect::<Vec<_>>() } },
                        { "match": { "type.graph.id": graph_id.to_string() } }
                    ]
                }
            }
        });
        let removed = self
            .backend
            .delete_by_query(&self.config.vocabulary_index, &query)
            .await?;
        tracing::info!(
            "[SYNC {}] removed {} vocabulary document(s)",
            graph_id,
            removed
        );
        Ok(SyncReport {
            deleted: removed as usize,
            ..Default::default()
        })
    }

    async fn update_concepts(
        &self,
        graph_id: GraphId,
        ids: &BTreeSet<ConceptId>,
    ) -> Result<SyncReport> {
        let target = self.config.concept_target();
        let resolver = ClosureResolver::new(self.store.as_ref(), self.backend.as_ref(), &target);
        let expansion = resolver.expand(graph_id, ids).await?;

        let found: BTreeSet<ConceptId> = expansion.current.iter().map(|c| c.id).collect();
        let missing = expansion.closure.seeds.difference(&found).count();
        if missing > 0 {
            tracing::warn!(
                "[SYNC {}] {} updated concept(s) no longer in the store, skipped",
                graph_id,
                missing
            );
        }

        let mut request = BulkRequest::new();
        for concept in expansion.current {
            request.upsert(&target, &IndexEntity::from(concept));
        }
        let mut report = self.write(request, Refresh::WaitFor).await?;
        report.skipped += missing;
        tracing::info!(
            "[SYNC {}] targeted update: {} seed(s), {} neighbour(s), {} upserted",
            graph_id,
            expansion.closure.seeds.len(),
            expansion.closure.neighbors.len(),
            report.upserted
        );
        Ok(report)
    }

    async fn delete_concepts(
        &self,
        graph_id: GraphId,
        ids: &BTreeSet<ConceptId>,
        prior: Option<&[Concept]>,
    ) -> Result<SyncReport> {
        let target = self.config.concept_target();
        let resolver = ClosureResolver::new(self.store.as_ref(), self.backend.as_ref(), &target);
        let snapshot = match prior {
            Some(prior) => prior.to_vec(),
            None => resolver.indexed_snapshot(graph_id, ids).await?,
        };
        let expansion = resolver.expand_deleted(graph_id, ids, &snapshot).await?;

        let mut request = BulkRequest::new();
        for concept in expansion.current {
            request.upsert(&target, &IndexEntity::from(concept));
        }
        for id in ids {
            request.delete(&target, document_id(graph_id, *id));
        }
        let report = self.write(request, Refresh::WaitFor).await?;
        tracing::info!(
            "[SYNC {}] targeted delete: {} removed, {} neighbour(s) refreshed",
            graph_id,
            report.deleted,
            report.upserted
        );
        Ok(report)
    }

    async fn purge_graph(&self, graph_id: GraphId) -> Result<SyncReport> {
        let query = serde_json::json!({
            "query": { "match": { "vocabulary.id": graph_id.to_string() } }
        });
        let removed = self
            .backend
            .delete_by_query(&self.config.concept_index, &query)
            .await?;
        tracing::info!("[SYNC {}] graph deleted, purged {} document(s)", graph_id, removed);
        Ok(SyncReport {
            deleted: removed as usize,
            ..Default::default()
        })
    }

    /// Rebuild the vocabulary listing from every graph that has a vocabulary node.
    pub async fn reindex_vocabularies(&self) -> Result<SyncReport> {
        let graph_ids = self.store.list_all_vocabulary_graph_ids().await?;
        let mut report = SyncReport::default();
        let mut entities = Vec::with_capacity(graph_ids.len());
        for graph_id in graph_ids {
            match self.store.get_vocabulary_node(graph_id).await {
                Ok(Some(vocabulary)) => entities.push(IndexEntity::from(vocabulary)),
                Ok(None) => {
                    tracing::warn!("[SYNC {}] vocabulary node disappeared, skipped", graph_id);
                    report.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!("[SYNC {}] vocabulary node unreadable: {}", graph_id, e);
                    report.skipped += 1;
                }
            }
        }

        let target = self.config.target_for(EntityKind::Vocabulary);
        report.merge(
            self.write_batches(&target, entities, Vec::new(), Refresh::None)
                .await,
        );
        tracing::info!(
            "[SYNC] vocabulary reindex: {} upserted, {} failed batch(es)",
            report.upserted,
            report.failed_batches
        );
        Ok(report)
    }

    /// Re-derive every concept and collection document of one graph.
    pub async fn reindex_graph(
        &self,
        graph_id: GraphId,
        wait_for_refresh: bool,
    ) -> Result<SyncReport> {
        self.reindex_graph_with_deletes(graph_id, Vec::new(), wait_for_refresh)
            .await
    }

    async fn reindex_graph_with_deletes(
        &self,
        graph_id: GraphId,
        deletes: Vec<DocumentId>,
        wait_for_refresh: bool,
    ) -> Result<SyncReport> {
        let target = self.config.concept_target();
        let refresh = Refresh::from_wait(wait_for_refresh);

        if self.store.get_graph(graph_id).await?.is_none() {
            tracing::warn!("[SYNC {}] graph not found, nothing to reindex", graph_id);
            return Ok(self
                .write_batches(&target, Vec::new(), deletes, refresh)
                .await);
        }

        let concepts = self.store.get_all_concepts_for_graph(graph_id).await?;
        let collections = self.store.get_all_collections_for_graph(graph_id).await?;
        let mut entities: Vec<IndexEntity> = Vec::with_capacity(concepts.len() + collections.len());
        entities.extend(concepts.into_iter().map(IndexEntity::from));
        entities.extend(collections.into_iter().map(IndexEntity::from));

        let report = self.write_batches(&target, entities, deletes, refresh).await;
        tracing::info!(
            "[SYNC {}] graph reindex: {} upserted, {} deleted, {} failed batch(es)",
            graph_id,
            report.upserted,
            report.deleted,
            report.failed_batches
        );
        Ok(report)
    }

    /// Vocabulary listing plus every graph, graphs processed concurrently up
    /// to `reindex_concurrency` at a time.
    pub async fn full_reindex(&self) -> Result<SyncReport> {
        let mut report = self.reindex_vocabularies().await?;
        let graph_ids = self.store.list_all_graph_ids().await?;
        tracing::info!("[SYNC] full reindex of {} graph(s)", graph_ids.len());

        let semaphore = Arc::new(Semaphore::new(self.config.reindex_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for graph_id in graph_ids {
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let driver = self.clone();
            tasks.spawn(async move {
                let _permit = permit;
                (graph_id, driver.reindex_graph(graph_id, false).await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(graph_report))) => report.merge(graph_report),
                Ok((graph_id, Err(e))) => {
                    tracing::warn!("[SYNC {}] graph reindex failed: {}", graph_id, e);
                    report.failed_batches += 1;
                }
                Err(e) => {
                    tracing::error!("[SYNC] graph reindex task panicked: {}", e);
                    report.failed_batches += 1;
                }
            }
        }

        tracing::info!(
            "[SYNC] full reindex done: {} upserted, {} failed batch(es), {} skipped",
            report.upserted,
            report.failed_batches,
            report.skipped
        );
        Ok(report)
    }

    /// Submit one request. Empty requests never reach the backend.
    async fn write(&self, request: BulkRequest, refresh: Refresh) -> Result<SyncReport> {
        let upserts = request.upsert_count();
        let deletes = request.delete_count();
        let Some(payload) = request.into_payload()? else {
            return Ok(SyncReport::default());
        };

        let summary = self.backend.bulk(payload, refresh).await?;
        if summary.has_failures() {
            tracing::warn!(
                "[BULK] {} of {} operation(s) rejected ({} upserts, {} deletes)",
                summary.failed,
                upserts + deletes,
                upserts,
                deletes
            );
        }
        Ok(SyncReport {
            upserted: upserts,
            deleted: deletes,
            rejected: summary.failed,
            ..Default::default()
        })
    }

    /// Write in sequential batches of `bulk_batch_size`. A failed batch is
    /// logged and counted; the remaining batches still run.
    async fn write_batches(
        &self,
        target: &IndexTarget,
        entities: Vec<IndexEntity>,
        deletes: Vec<DocumentId>,
        refresh: Refresh,
    ) -> SyncReport {
        let batch_size = self.config.bulk_batch_size.max(1);
        let mut report = SyncReport::default();

        let mut requests = Vec::new();
        for chunk in entities.chunks(batch_size) {
            let mut request = BulkRequest::new();
            for entity in chunk {
                request.upsert(target, entity);
            }
            requests.push(request);
        }
        for chunk in deletes.chunks(batch_size) {
            let mut request = BulkRequest::new();
            for id in chunk {
                request.delete(target, id.clone());
            }
            requests.push(request);
        }

        let total = requests.len();
        for (n, request) in requests.into_iter().enumerate() {
            let upserts = request.upsert_count();
            let deletes = request.delete_count();
            match self.write(request, refresh).await {
                Ok(batch) => report.merge(batch),
                Err(e) => {
                    tracing::warn!(
                        "[BULK] batch {}/{} on {} failed ({} upserts, {} deletes): {}",
                        n + 1,
                        total,
                        target.index,
                        upserts,
                        deletes,
                        e
                    );
                    report.failed_batches += 1;
                }
            }
        }
        report
    }
}

/// Both tracks always run; the first error wins after the other finished.
fn combine(
    graph_id: GraphId,
    vocabularies: Result<SyncReport>,
    concepts: Result<SyncReport>,
) -> Result<SyncReport> {
    match (vocabularies, concepts) {
        (Ok(mut report), Ok(other)) => {
            report.merge(other);
            Ok(report)
        }
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
        (Err(e), Err(other)) => {
            tracing::warn!("[SYNC {}] concept track also failed: {}", graph_id, other);
            Err(e)
        }
    }
}
