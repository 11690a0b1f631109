//! Graph lifecycle: creation with default parameters and cascading delete.

use crate::{
    config::EngineDefaults,
    engine::upsert::upsert_components,
    error::CagError,
    properties::{
        now_millis, CagEdge, CagModel, CagNode, ModelParameter, NodeGroup, Oid, Record, Scenario,
        ScenarioResult, SensitivityResult, TimeRange,
    },
    query::Filter,
    store::DocStore,
};

/// Caller-supplied fields for a new graph. Anything left unset falls back to
/// the configured [EngineDefaults].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphFields {
    pub project_id: Oid,
    pub name: String,
    pub geography: Vec<String>,
    pub time_scale: Option<String>,
    pub projection_start: Option<i64>,
    pub history_range: Option<TimeRange>,
}

/// Allocate a graph with merged parameters, then upsert its initial nodes
/// and edges through the same path later edits take.
pub async fn create_graph<S: DocStore>(
    store: &S,
    defaults: &EngineDefaults,
    fields: GraphFields,
    nodes: Vec<CagNode>,
    edges: Vec<CagEdge>,
) -> Result<Oid, CagError> {
    let now = now_millis();
    let model_id = Oid::generate();
    let graph = CagModel {
        id: model_id.clone(),
        project_id: fields.project_id,
        name: fields.name,
        parameter: ModelParameter {
            engine: defaults.engine.clone(),
            time_scale: fields
                .time_scale
                .unwrap_or_else(|| defaults.time_scale.clone()),
            geography: fields.geography,
            projection_start: fields.projection_start.unwrap_or(now),
            num_steps: defaults.num_steps,
            history_range: fields.history_range,
        },
        created_at: now,
        modified_at: now,
        ..Default::default()
    };
    store
        .insert(vec![graph])
        .await?
        .into_result(CagModel::COLLECTION)?;

    let nodes: Vec<CagNode> = nodes
        .into_iter()
        .map(|mut n| {
            n.model_id = model_id.clone();
            n
        })
        .collect();
    if !nodes.is_empty() {
        upsert_components(store, nodes).await?;
    }
    let edges: Vec<CagEdge> = edges
        .into_iter()
        .map(|mut e| {
            e.model_id = model_id.clone();
            e
        })
        .collect();
    if !edges.is_empty() {
        upsert_components(store, edges).await?;
    }

    tracing::info!("[lifecycle] created graph {}", model_id);
    Ok(model_id)
}

async fn cleanup<R: Record, S: DocStore>(store: &S, model_id: &Oid) {
    match store.remove::<R>(&Filter::model(model_id)).await {
        Ok(deleted) => {
            tracing::debug!(
                "[lifecycle] removed {} {} for graph {}",
                deleted,
                R::COLLECTION,
                model_id
            );
        }
        Err(e) => {
            tracing::warn!(
                "[lifecycle] cleanup of {} for graph {} failed: {}",
                R::COLLECTION,
                model_id,
                e
            );
        }
    }
}

/// Remove the graph document, then sweep every dependent collection.
///
/// Dependent removals are sequential, independent and best-effort: the
/// delete counts as successful once the root document is gone, even if a
/// cleanup step is still catching up on a later retry.
pub async fn delete_graph<S: DocStore>(store: &S, model_id: &Oid) -> Result<bool, CagError> {
    let deleted = store.remove::<CagModel>(&Filter::id(model_id)).await?;
    if deleted == 0 {
        tracing::debug!("[lifecycle] graph {} already absent", model_id);
    }
    cleanup::<CagNode, _>(store, model_id).await;
    cleanup::<CagEdge, _>(store, model_id).await;
    cleanup::<NodeGroup, _>(store, model_id).await;
    cleanup::<Scenario, _>(store, model_id).await;
    cleanup::<ScenarioResult, _>(store, model_id).await;
    cleanup::<SensitivityResult, _>(store, model_id).await;
    if deleted > 0 {
        tracing::info!("[lifecycle] deleted graph {}", model_id);
    }
    Ok(deleted > 0)
}
