//! The consistency engine: a facade over the document store that keeps each
//! graph's derived state in agreement with the evidence corpus.
//!
//! [CagService] owns nothing but collaborators: a store implementing the
//! [crate::store::DocStore] contract, a [ComponentCache], the configured
//! parameter defaults, and an optional event sender. Requests for different
//! graphs share no mutable state and run fully in parallel.

pub mod composition;
pub mod lifecycle;
pub mod recalculate;
pub mod rename;
pub mod staleness;
pub mod upsert;


use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    cache::ComponentCache,
    commands::CurationBatch,
    config::{EngineDefaults, ServiceConfig},
    error::CagError,
    event::CagEvent,
    properties::{CagEdge, CagModel, CagNode, Component, Oid},
    query::{Filter, FindOptions},
    store::{DocStore, EvidenceSource},
};

use composition::EdgeComposition;

pub use composition::{edge_is_ambiguous, resolve_edge};
pub use lifecycle::GraphFields;
pub use recalculate::RecalculationSummary;
pub use rename::ConceptChange;
pub use upsert::upsert_components;

/// A graph and its components, denormalized for display: metadata, nodes,
/// and edges with their derived evidence fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphComponents {
    pub graph: CagModel,
    pub nodes: Vec<CagNode>,
    pub edges: Vec<CagEdge>,
}

/// The engine facade. Generic over the store so unit tests run against
/// [crate::store::MemStore] and deployments against
/// [crate::db::SqliteStore].
pub struct CagService<S> {
    store: S,
    cache: ComponentCache,
    defaults: EngineDefaults,
    events: Option<UnboundedSender<CagEvent>>,
}

impl<S> CagService<S>
where
    S: DocStore + EvidenceSource,
{
    pub fn new(store: S, config: &ServiceConfig) -> Self {
        CagService {
            store,
            cache: ComponentCache::new(config.cache_capacity),
            defaults: config.defaults.clone(),
            events: None,
        }
    }

    /// Attach a subscriber for post-mutation notifications.
    pub fn with_events(mut self, events: UnboundedSender<CagEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &ComponentCache {
        &self.cache
    }

    fn emit(&self, event: CagEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Graph metadata plus nodes and edges, read through the cache.
    pub async fn components(&self, model_id: &Oid) -> Result<Arc<GraphComponents>, CagError> {
        if let Some(hit) = self.cache.get(model_id) {
            return Ok(hit);
        }
        let graph: CagModel = self
            .store
            .find_one(&Filter::id(model_id))
            .await?
            .ok_or_else(|| CagError::NotFound(format!("graph {model_id}")))?;
        let nodes: Vec<CagNode> = self
            .store
            .find(&Filter::model(model_id), &FindOptions::default())
            .await?;
        let edges: Vec<CagEdge> = self
            .store
            .find(&Filter::model(model_id), &FindOptions::default())
            .await?;
        let components = Arc::new(GraphComponents {
            graph,
            nodes,
            edges,
        });
        self.cache.put(model_id.clone(), components.clone());
        Ok(components)
    }

    /// Bulk-write nodes, edges or groups into a graph. Records without ids
    /// are created, the rest updated; see [upsert::upsert_components].
    pub async fn upsert<R: Component>(
        &self,
        model_id: &Oid,
        mut records: Vec<R>,
    ) -> Result<Vec<Oid>, CagError> {
        for record in &mut records {
            record.set_model_id(model_id.clone());
        }
        let written = upsert::upsert_components(&self.store, records).await?;
        self.cache.invalidate(model_id);
        self.emit(CagEvent::ComponentsChanged(model_id.clone()));
        Ok(written)
    }

    /// One edge's composition, resolved from the live corpus without
    /// running a full recalculation.
    pub async fn resolve_edge(&self, edge: &CagEdge) -> Result<EdgeComposition, CagError> {
        composition::resolve_edge(&self.store, edge).await
    }

    /// Converge a graph's derived state with the corpus and clear its stale
    /// flag.
    ///
    /// There is no per-graph mutual exclusion: a corpus edit racing this
    /// run can leave the graph stale-flagged or slightly behind. The
    /// resolution is to run recalculation again; it is idempotent and
    /// always converges on a quiet corpus.
    pub async fn recalculate(&self, model_id: &Oid) -> Result<RecalculationSummary, CagError> {
        let summary = recalculate::recalculate(&self.store, model_id).await?;
        if summary.graph_updated {
            self.cache.invalidate(model_id);
        }
        self.emit(CagEvent::Recalculated {
            model_id: model_id.clone(),
            edges_updated: summary.edges_updated,
            is_ambiguous: summary.is_ambiguous,
        });
        Ok(summary)
    }

    /// Flag graphs whose edges reference any of the edited statements.
    pub async fn check_stale_graphs(
        &self,
        project_id: &Oid,
        statement_ids: &[Oid],
    ) -> Result<Vec<Oid>, CagError> {
        let flagged = staleness::flag_stale(&self.store, project_id, statement_ids).await?;
        for model_id in &flagged {
            self.cache.invalidate(model_id);
        }
        if !flagged.is_empty() {
            self.emit(CagEvent::GraphsFlaggedStale(flagged.clone()));
        }
        Ok(flagged)
    }

    /// Typed entry point for corpus curation batches.
    pub async fn flag_stale_after(&self, batch: &CurationBatch) -> Result<Vec<Oid>, CagError> {
        tracing::debug!("[curation] {}", batch);
        if !batch.op.affects_composition() {
            return Ok(Vec::new());
        }
        self.check_stale_graphs(&batch.project_id, &batch.statement_ids)
            .await
    }

    /// Whether a concept already names a node in the graph. The rename
    /// precondition, exposed for callers that validate before prompting.
    pub async fn concept_in_use(&self, model_id: &Oid, concept: &str) -> Result<bool, CagError> {
        let count = self
            .store
            .count::<CagNode>(&Filter::model(model_id).eq("concept", concept))
            .await?;
        Ok(count > 0)
    }

    /// Rename a node concept and cascade through edges and scenarios.
    pub async fn change_concept(
        &self,
        model_id: &Oid,
        node_id: &Oid,
        new_concept: &str,
    ) -> Result<ConceptChange, CagError> {
        let change = rename::change_concept(&self.store, model_id, node_id, new_concept).await?;
        self.cache.invalidate(model_id);
        self.emit(CagEvent::ConceptRenamed {
            model_id: model_id.clone(),
            from: change.old_concept.clone(),
            to: change.new_concept.clone(),
        });
        Ok(change)
    }

    /// Create a graph with merged default parameters and initial components.
    pub async fn create_graph(
        &self,
        fields: GraphFields,
        nodes: Vec<CagNode>,
        edges: Vec<CagEdge>,
    ) -> Result<Oid, CagError> {
        let model_id =
            lifecycle::create_graph(&self.store, &self.defaults, fields, nodes, edges).await?;
        self.emit(CagEvent::GraphCreated(model_id.clone()));
        Ok(model_id)
    }

    /// Delete a graph and best-effort sweep every dependent resource.
    pub async fn delete_graph(&self, model_id: &Oid) -> Result<bool, CagError> {
        let deleted = lifecycle::delete_graph(&self.store, model_id).await?;
        self.cache.invalidate(model_id);
        if deleted {
            self.emit(CagEvent::GraphDeleted(model_id.clone()));
        }
        Ok(deleted)
    }
}
