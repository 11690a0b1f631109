//! Staleness detection: mapping a batch of edited statements to the graphs
//! whose derived state they invalidate.

use std::collections::BTreeSet;

use crate::{
    error::CagError,
    properties::{now_millis, CagEdge, CagModel, Oid, Record},
    query::{oid_values, Filter, FindOptions},
    store::DocStore,
};

/// Flag every non-stale graph in the project whose edges reference any of
/// the edited statements, and return their ids.
///
/// Graphs already marked stale are not re-queried: "stale" absorbs further
/// staleness until a recalculation clears it, which keeps this detector
/// idempotent under repeated corpus edits. The edge lookup is a
/// set-intersection query over `reference_ids`, so cost scales with the
/// number of touched statements rather than the corpus.
pub async fn flag_stale<S: DocStore>(
    store: &S,
    project_id: &Oid,
    statement_ids: &[Oid],
) -> Result<Vec<Oid>, CagError> {
    if statement_ids.is_empty() {
        return Ok(Vec::new());
    }
    let fresh: Vec<CagModel> = store
        .find(
            &Filter::new()
                .eq("project_id", project_id.as_str())
                .eq("is_stale", false),
            &FindOptions::default(),
        )
        .await?;
    if fresh.is_empty() {
        return Ok(Vec::new());
    }

    let model_ids: Vec<Oid> = fresh.iter().map(|g| g.id.clone()).collect();
    let touched_edges: Vec<CagEdge> = store
        .find(
            &Filter::new()
                .is_in("model_id", oid_values(&model_ids))
                .any("reference_ids", oid_values(statement_ids)),
            &FindOptions::default(),
        )
        .await?;
    let touched: BTreeSet<Oid> = touched_edges.into_iter().map(|e| e.model_id).collect();
    if touched.is_empty() {
        return Ok(Vec::new());
    }

    let now = now_millis();
    let mut flagged: Vec<CagModel> = fresh
        .into_iter()
        .filter(|g| touched.contains(&g.id))
        .collect();
    for graph in &mut flagged {
        graph.is_stale = true;
        graph.touch(now);
    }
    let ids: Vec<Oid> = flagged.iter().map(|g| g.id.clone()).collect();
    store
        .update(flagged)
        .await?
        .into_result(CagModel::COLLECTION)?;
    tracing::info!(
        "[staleness] {} graphs flagged stale in project {} after {} statement edits",
        ids.len(),
        project_id,
        statement_ids.len()
    );
    Ok(ids)
}
