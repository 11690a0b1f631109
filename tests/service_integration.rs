//! End-to-end exercise of the engine over the sqlite adapter: create a
//! graph, converge it against a live corpus, curate statements, rename a
//! concept, and tear everything down.

mod common;

use aetia_core::{
    config::ServiceConfig,
    engine::{CagService, GraphFields},
    error::CagError,
    properties::{
        CagEdge, CagModel, CagNode, CurationState, Oid, Polarity, Record, Scenario,
        ScenarioResult, SensitivityResult, Statement,
    },
    query::{Filter, FindOptions},
    store::DocStore,
};

use common::{edge, node, scratch_store, statement};

#[test_log::test(tokio::test)]
async fn full_graph_lifecycle_against_sqlite() {
    let (_guard, store) = scratch_store().await;

    // The corpus pipeline has already extracted three statements.
    store
        .insert(vec![
            statement(
                "s1",
                "p1",
                "wm/rain",
                Polarity::Positive,
                "wm/flood",
                Polarity::Positive,
                0.9,
            ),
            statement(
                "s2",
                "p1",
                "wm/rain",
                Polarity::Positive,
                "wm/flood",
                Polarity::Positive,
                0.7,
            ),
            statement(
                "s3",
                "p1",
                "wm/flood",
                Polarity::Positive,
                "wm/crops",
                Polarity::Negative,
                0.6,
            ),
        ])
        .await
        .unwrap()
        .into_result(Statement::COLLECTION)
        .unwrap();

    let service = CagService::new(store, &ServiceConfig::default());
    let model_id = service
        .create_graph(
            GraphFields {
                project_id: Oid::from("p1"),
                name: "flood impact".to_string(),
                geography: vec!["Oromia".to_string()],
                time_scale: Some("year".to_string()),
                ..Default::default()
            },
            vec![node("wm/rain"), node("wm/flood"), node("wm/crops")],
            vec![
                edge("wm/rain", "wm/flood", &["s1", "s2"]),
                edge("wm/flood", "wm/crops", &["s3"]),
            ],
        )
        .await
        .unwrap();

    let components = service.components(&model_id).await.unwrap();
    assert_eq!(components.graph.parameter.time_scale, "year");
    assert_eq!(components.graph.parameter.num_steps, 12);
    assert_eq!(components.nodes.len(), 3);
    assert_eq!(components.edges.len(), 2);

    // First convergence fills in the derived fields.
    let summary = service.recalculate(&model_id).await.unwrap();
    assert_eq!(summary.edges_updated, 2);
    let components = service.components(&model_id).await.unwrap();
    let rain_flood = components
        .edges
        .iter()
        .find(|e| e.source == "wm/rain")
        .unwrap();
    assert_eq!((rain_flood.same, rain_flood.opposite), (2, 0));
    assert_eq!(rain_flood.polarity, Polarity::Positive);
    assert!((rain_flood.belief_score - 0.8).abs() < 1e-12);
    let flood_crops = components
        .edges
        .iter()
        .find(|e| e.source == "wm/flood")
        .unwrap();
    assert_eq!(flood_crops.polarity, Polarity::Negative);

    // Idempotence holds across the sql adapter too.
    let summary = service.recalculate(&model_id).await.unwrap();
    assert_eq!(summary.edges_updated, 0);
    assert!(!summary.graph_updated);

    // An analyst discards s1.
    let mut s1: Statement = service
        .store()
        .find_one(&Filter::id(&Oid::from("s1")))
        .await
        .unwrap()
        .unwrap();
    s1.state = CurationState::Discarded;
    service
        .store()
        .update(vec![s1])
        .await
        .unwrap()
        .into_result(Statement::COLLECTION)
        .unwrap();

    let flagged = service
        .check_stale_graphs(&Oid::from("p1"), &[Oid::from("s1")])
        .await
        .unwrap();
    assert_eq!(flagged, vec![model_id.clone()]);
    let components = service.components(&model_id).await.unwrap();
    assert!(components.graph.is_stale);

    let summary = service.recalculate(&model_id).await.unwrap();
    assert_eq!(summary.edges_updated, 1);
    let components = service.components(&model_id).await.unwrap();
    assert!(!components.graph.is_stale);
    let rain_flood = components
        .edges
        .iter()
        .find(|e| e.source == "wm/rain")
        .unwrap();
    assert_eq!(rain_flood.reference_ids, vec![Oid::from("s2")]);
    assert_eq!((rain_flood.same, rain_flood.opposite), (1, 0));

    // Rename cascades through edges (no scenarios reference wm/flood yet).
    let flood_node = components
        .nodes
        .iter()
        .find(|n| n.concept == "wm/flood")
        .map(|n| n.id.clone())
        .unwrap();
    let renamed = service
        .change_concept(&model_id, &flood_node, "wm/flooding")
        .await
        .unwrap();
    assert_eq!(renamed.old_concept, "wm/flood");
    let components = service.components(&model_id).await.unwrap();
    assert!(components
        .edges
        .iter()
        .all(|e| e.source != "wm/flood" && e.target != "wm/flood"));
    assert_eq!(
        components
            .edges
            .iter()
            .filter(|e| e.source == "wm/flooding" || e.target == "wm/flooding")
            .count(),
        2
    );

    // The rename moved concepts, not groundings: recalculation still
    // resolves the same evidence.
    let summary = service.recalculate(&model_id).await.unwrap();
    assert_eq!(summary.edges_updated, 0);

    // Tear down; every dependent collection empties.
    assert!(service.delete_graph(&model_id).await.unwrap());
    let store = service.store();
    assert!(store
        .find_one::<CagModel>(&Filter::id(&model_id))
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        store.count::<CagNode>(&Filter::model(&model_id)).await.unwrap(),
        0
    );
    assert_eq!(
        store.count::<CagEdge>(&Filter::model(&model_id)).await.unwrap(),
        0
    );
    assert_eq!(
        store.count::<Scenario>(&Filter::model(&model_id)).await.unwrap(),
        0
    );
    assert_eq!(
        store
            .count::<ScenarioResult>(&Filter::model(&model_id))
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        store
            .count::<SensitivityResult>(&Filter::model(&model_id))
            .await
            .unwrap(),
        0
    );

    // Statements belong to the corpus and survive graph deletion.
    let survivors: Vec<Statement> = store
        .find(&Filter::new().eq("project_id", "p1"), &FindOptions::default())
        .await
        .unwrap();
    assert_eq!(survivors.len(), 3);
}

#[test_log::test(tokio::test)]
async fn missing_graph_surfaces_not_found() {
    let (_guard, store) = scratch_store().await;
    let service = CagService::new(store, &ServiceConfig::default());
    let err = service.recalculate(&Oid::from("nope")).await.unwrap_err();
    assert!(matches!(err, CagError::NotFound(_)));
    let err = service.components(&Oid::from("nope")).await.unwrap_err();
    assert_eq!(err.status_code().as_u16(), 404);
}
