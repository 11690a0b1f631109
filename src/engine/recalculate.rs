//! Recalculation: converging a graph's derived edge state with the current
//! corpus after arbitrary statement edits.

use std::collections::{BTreeMap, BTreeSet};

use futures::future::try_join_all;

use crate::{
    engine::composition::{edge_is_ambiguous, EdgeComposition},
    error::CagError,
    properties::{now_millis, CagEdge, CagModel, CagNode, EngineStatus, Oid, Record},
    query::{Filter, FindOptions},
    store::{DocStore, EvidenceSource},
};

/// What one recalculation run actually wrote.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecalculationSummary {
    pub edges_updated: usize,
    pub graph_updated: bool,
    pub is_ambiguous: bool,
}

/// Bring one graph's edges back into agreement with the corpus and clear its
/// stale flag.
///
/// Per edge, the still-valid backing set is the intersection of "statement
/// still exists and is not discarded" with "statement grounding still
/// matches both endpoint component sets"; statements that were discarded,
/// re-grounded away, or deleted simply drop out. Edges whose recomputed
/// composition equals their stored state are not written, so a second run
/// with no intervening corpus edits writes nothing.
///
/// All per-edge validity queries are issued concurrently and awaited before
/// the first write: the graph's stale flag must never clear on the basis of
/// a subset of edges.
pub async fn recalculate<S: DocStore + EvidenceSource>(
    store: &S,
    model_id: &Oid,
) -> Result<RecalculationSummary, CagError> {
    let mut graph: CagModel = store
        .find_one(&Filter::id(model_id))
        .await?
        .ok_or_else(|| CagError::NotFound(format!("graph {model_id}")))?;
    let nodes: Vec<CagNode> = store
        .find(&Filter::model(model_id), &FindOptions::default())
        .await?;
    let edges: Vec<CagEdge> = store
        .find(&Filter::model(model_id), &FindOptions::default())
        .await?;

    let groundings: BTreeMap<&str, BTreeSet<String>> = nodes
        .iter()
        .map(|n| (n.concept.as_str(), n.grounding()))
        .collect();

    // An edge endpoint that resolves to no node violates the concept
    // invariant; such edges are left untouched rather than shrunk to
    // nothing on bad data.
    let mut resolvable = Vec::with_capacity(edges.len());
    for edge in &edges {
        match (
            groundings.get(edge.source.as_str()),
            groundings.get(edge.target.as_str()),
        ) {
            (Some(source), Some(target)) => resolvable.push((edge, source, target)),
            _ => tracing::warn!(
                "[recalculate] graph {}: edge {} endpoint unresolved ({} -> {})",
                model_id,
                edge.id,
                edge.source,
                edge.target
            ),
        }
    }

    let lookups = resolvable
        .iter()
        .map(|(edge, source, target)| store.matching_evidence(source, target, &edge.reference_ids));
    let evidence = try_join_all(lookups).await?;

    let now = now_millis();
    let mut changed: Vec<CagEdge> = Vec::new();
    let mut graph_ambiguous = false;
    for ((edge, _, _), statements) in resolvable.iter().zip(evidence) {
        let valid: BTreeSet<&Oid> = statements.iter().map(|s| &s.id).collect();
        let reference_ids: Vec<Oid> = edge
            .reference_ids
            .iter()
            .filter(|id| valid.contains(id))
            .cloned()
            .collect();
        let composition = EdgeComposition::resolve(&statements, edge.user_polarity);
        graph_ambiguous |= edge_is_ambiguous(&composition, edge.user_polarity);

        if reference_ids.len() != edge.reference_ids.len() || !composition.matches_edge(edge) {
            let mut next = (*edge).clone();
            next.reference_ids = reference_ids;
            composition.apply_to(&mut next);
            next.touch(now);
            changed.push(next);
        }
    }

    let edges_updated = changed.len();
    if edges_updated > 0 {
        store
            .update(changed)
            .await?
            .into_result(CagEdge::COLLECTION)?;
    }

    // The graph document is written only when something moved: an edge
    // changed, ambiguity flipped, or a stale flag needs clearing. Any
    // structural movement also de-registers the graph from the projection
    // engine, which must re-sync before its experiments are meaningful.
    let graph_updated =
        edges_updated > 0 || graph.is_ambiguous != graph_ambiguous || graph.is_stale;
    if graph_updated {
        graph.is_stale = false;
        graph.status = EngineStatus::NotRegistered;
        graph.engine_status = EngineStatus::NotRegistered;
        graph.is_ambiguous = graph_ambiguous;
        graph.touch(now);
        store
            .update(vec![graph])
            .await?
            .into_result(CagModel::COLLECTION)?;
    }

    tracing::info!(
        "[recalculate] graph {}: {} of {} edges updated, ambiguous={}",
        model_id,
        edges_updated,
        edges.len(),
        graph_ambiguous
    );
    Ok(RecalculationSummary {
        edges_updated,
        graph_updated,
        is_ambiguous: graph_ambiguous,
    })
}
