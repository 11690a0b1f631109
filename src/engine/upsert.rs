//! Bulk component upsert: id assignment and create/update batch routing.

use crate::{
    error::CagError,
    properties::{now_millis, Oid, Record},
    store::DocStore,
};

/// Split records on id presence, stamp both batches, and write each in one
/// bulk call. Records without an id are assigned a fresh one and inserted;
/// the rest are updated in place.
///
/// Create and update are independent units of failure: a failing batch
/// surfaces as an error naming its first failing item, and the other batch
/// is still attempted. Nothing is rolled back.
pub async fn upsert_components<S: DocStore, R: Record>(
    store: &S,
    records: Vec<R>,
) -> Result<Vec<Oid>, CagError> {
    let now = now_millis();
    let mut creates = Vec::new();
    let mut updates = Vec::new();
    for mut record in records {
        record.touch(now);
        if record.id().is_nil() {
            record.set_id(Oid::generate());
            creates.push(record);
        } else {
            updates.push(record);
        }
    }
    tracing::debug!(
        "[upsert] {}: {} creates, {} updates",
        R::COLLECTION,
        creates.len(),
        updates.len()
    );

    let mut written = Vec::with_capacity(creates.len() + updates.len());
    let mut first_failure: Option<CagError> = None;
    if !creates.is_empty() {
        match store.insert(creates).await?.into_result(R::COLLECTION) {
            Ok(mut ids) => written.append(&mut ids),
            Err(e) => first_failure = Some(e),
        }
    }
    if !updates.is_empty() {
        match store.update(updates).await?.into_result(R::COLLECTION) {
            Ok(mut ids) => written.append(&mut ids),
            Err(e) => {
                if first_failure.is_none() {
                    first_failure = Some(e);
                }
            }
        }
    }
    match first_failure {
        Some(e) => Err(e),
        None => Ok(written),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        properties::CagNode,
        query::{Filter, FindOptions},
        store::MemStore,
    };

    #[tokio::test]
    async fn assigns_ids_and_routes_batches() {
        let store = MemStore::new();
        let model_id = Oid::from("m1");

        // Seed one node so it can ride the update batch.
        let mut existing = CagNode::new(model_id.clone(), "wm/concept/rainfall");
        existing.set_id(Oid::from("n1"));
        store
            .insert(vec![existing.clone()])
            .await
            .unwrap()
            .into_result(CagNode::COLLECTION)
            .unwrap();

        existing.label = "Rainfall".to_string();
        let fresh = CagNode::new(model_id.clone(), "wm/concept/flooding");
        let written = upsert_components(&store, vec![existing, fresh]).await.unwrap();
        assert_eq!(written.len(), 2);

        let nodes: Vec<CagNode> = store
            .find(&Filter::model(&model_id), &FindOptions::default())
            .await
            .unwrap();
        assert_eq!(nodes.len(), 2);
        for node in &nodes {
            assert!(!node.id().is_nil());
            assert!(node.modified_at > 0);
        }
        let relabeled = nodes.iter().find(|n| n.id == Oid::from("n1")).unwrap();
        assert_eq!(relabeled.label, "Rainfall");
    }

    #[tokio::test]
    async fn update_batch_failure_names_first_item() {
        let store = MemStore::new();
        let mut ghost = CagNode::new(Oid::from("m1"), "wm/concept/heat");
        ghost.set_id(Oid::from("missing"));
        let err = upsert_components(&store, vec![ghost]).await.unwrap_err();
        match err {
            CagError::BulkWrite { collection, item, .. } => {
                assert_eq!(collection, CagNode::COLLECTION);
                assert_eq!(item, "missing");
            }
            other => panic!("expected BulkWrite, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn batches_are_independent_failure_units() {
        let store = MemStore::new();
        let model_id = Oid::from("m1");
        let fresh = CagNode::new(model_id.clone(), "wm/concept/flooding");
        let mut ghost = CagNode::new(model_id.clone(), "wm/concept/heat");
        ghost.set_id(Oid::from("missing"));

        // The update batch fails, but the create batch was already applied
        // and stays applied.
        let result = upsert_components(&store, vec![fresh, ghost]).await;
        assert!(result.is_err());
        let created: Vec<CagNode> = store
            .find(
                &Filter::model(&model_id).eq("concept", "wm/concept/flooding"),
                &FindOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(created.len(), 1);
    }
}
