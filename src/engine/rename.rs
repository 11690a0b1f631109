//! Concept rename cascade: rewriting a node's concept through every edge
//! endpoint and scenario constraint that referenced it.

use std::collections::BTreeMap;

use crate::{
    error::CagError,
    properties::{now_millis, CagEdge, CagNode, Oid, Record, Scenario},
    query::{Filter, FindOptions},
    store::DocStore,
};

/// Result of a completed cascade.
#[derive(Clone, Debug, PartialEq)]
pub struct ConceptChange {
    pub old_concept: String,
    pub new_concept: String,
}

/// Rename a node's concept and rewrite every dependent reference, as one
/// best-effort sequential unit.
///
/// Write order is node, then edges, then scenarios, each as its own bulk
/// call. The store offers no multi-document transaction, so a failure
/// partway leaves the graph transiently inconsistent; callers retry or
/// alert rather than expect a rollback.
///
/// Concept uniqueness within the graph is re-checked here before any write:
/// a cascade that would produce two nodes with the same concept fails with
/// [CagError::DuplicateConcept] and touches nothing.
pub async fn change_concept<S: DocStore>(
    store: &S,
    model_id: &Oid,
    node_id: &Oid,
    new_concept: &str,
) -> Result<ConceptChange, CagError> {
    let mut node: CagNode = store
        .find_one(&Filter::id(node_id))
        .await?
        .ok_or_else(|| CagError::NotFound(format!("node {node_id}")))?;
    if node.model_id != *model_id {
        return Err(CagError::NotFound(format!(
            "node {node_id} in graph {model_id}"
        )));
    }
    let old_concept = node.concept.clone();
    if old_concept == new_concept {
        return Ok(ConceptChange {
            old_concept,
            new_concept: new_concept.to_string(),
        });
    }

    let clashes = store
        .count::<CagNode>(&Filter::model(model_id).eq("concept", new_concept))
        .await?;
    if clashes > 0 {
        return Err(CagError::DuplicateConcept {
            model_id: model_id.to_string(),
            concept: new_concept.to_string(),
        });
    }

    // The clause language has no cross-field OR; source and target matches
    // are two finds merged by id.
    let sourced: Vec<CagEdge> = store
        .find(
            &Filter::model(model_id).eq("source", old_concept.as_str()),
            &FindOptions::default(),
        )
        .await?;
    let targeted: Vec<CagEdge> = store
        .find(
            &Filter::model(model_id).eq("target", old_concept.as_str()),
            &FindOptions::default(),
        )
        .await?;
    let mut edges: BTreeMap<Oid, CagEdge> = BTreeMap::new();
    for edge in sourced.into_iter().chain(targeted) {
        edges.insert(edge.id.clone(), edge);
    }

    let scenarios: Vec<Scenario> = store
        .find(&Filter::model(model_id), &FindOptions::default())
        .await?;

    let now = now_millis();
    for edge in edges.values_mut() {
        if edge.source == old_concept {
            edge.source = new_concept.to_string();
        }
        if edge.target == old_concept {
            edge.target = new_concept.to_string();
        }
        edge.touch(now);
    }
    let mut rewritten_scenarios = Vec::new();
    for mut scenario in scenarios {
        let mut rewritten = false;
        for constraint in &mut scenario.parameter.constraints {
            if constraint.concept == old_concept {
                constraint.concept = new_concept.to_string();
                rewritten = true;
            }
        }
        if rewritten {
            scenario.touch(now);
            rewritten_scenarios.push(scenario);
        }
    }

    node.concept = new_concept.to_string();
    node.label = new_concept.to_string();
    node.touch(now);

    let edge_count = edges.len();
    let scenario_count = rewritten_scenarios.len();
    store
        .update(vec![node])
        .await?
        .into_result(CagNode::COLLECTION)?;
    if !edges.is_empty() {
        store
            .update(edges.into_values().collect())
            .await?
            .into_result(CagEdge::COLLECTION)?;
    }
    if !rewritten_scenarios.is_empty() {
        store
            .update(rewritten_scenarios)
            .await?
            .into_result(Scenario::COLLECTION)?;
    }

    tracing::info!(
        "[rename] graph {}: '{}' -> '{}' across {} edges, {} scenarios",
        model_id,
        old_concept,
        new_concept,
        edge_count,
        scenario_count
    );
    Ok(ConceptChange {
        old_concept,
        new_concept: new_concept.to_string(),
    })
}
