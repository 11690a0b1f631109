//! Performance benchmarks for the hot paths of a recalculation run:
//! - Edge composition over growing evidence sets
//! - Filter evaluation against JSON documents
//! - A full convergence pass over an in-memory store
//!
//! Run with: cargo bench

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use aetia_core::{
    engine::{composition::EdgeComposition, recalculate::recalculate},
    properties::{
        CagEdge, CagModel, CagNode, Grounding, Oid, Polarity, Record, Statement, StatementFactor,
    },
    query::Filter,
    store::{DocStore, MemStore},
};

fn factor(concept: &str, polarity: Polarity) -> StatementFactor {
    StatementFactor {
        concept: concept.to_string(),
        polarity,
        candidates: vec![Grounding {
            name: concept.to_string(),
            score: 0.8,
        }],
    }
}

fn statements(n: usize) -> Vec<Statement> {
    (0..n)
        .map(|i| Statement {
            id: Oid::from(format!("s{i}").as_str()),
            project_id: Oid::from("p1"),
            subj: factor("wm/rain", Polarity::Positive),
            obj: factor(
                "wm/flood",
                if i % 3 == 0 {
                    Polarity::Negative
                } else {
                    Polarity::Positive
                },
            ),
            belief: (i % 10) as f64 / 10.0,
            ..Default::default()
        })
        .collect()
}

fn bench_composition(c: &mut Criterion) {
    let mut group = c.benchmark_group("edge_composition");
    for size in [4usize, 64, 1024] {
        let evidence = statements(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &evidence, |b, evidence| {
            b.iter(|| EdgeComposition::resolve(evidence, None));
        });
    }
    group.finish();
}

fn bench_filter_matching(c: &mut Criterion) {
    let doc = serde_json::to_value(&statements(1)[0]).unwrap();
    let filter = Filter::new()
        .eq("project_id", "p1")
        .eq("subj.concept", "wm/rain")
        .any(
            "subj.candidates",
            vec![serde_json::json!({"name": "wm/rain", "score": 0.8})],
        );
    c.bench_function("filter_matches", |b| {
        b.iter(|| filter.matches(&doc));
    });
}

fn bench_recalculate(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = MemStore::new();
    let model_id = Oid::from("m1");

    rt.block_on(async {
        store
            .insert(vec![CagModel {
                id: model_id.clone(),
                project_id: Oid::from("p1"),
                is_stale: true,
                ..Default::default()
            }])
            .await
            .unwrap();
        let mut src = CagNode::new(model_id.clone(), "wm/rain");
        src.set_id(Oid::from("n1"));
        let mut tgt = CagNode::new(model_id.clone(), "wm/flood");
        tgt.set_id(Oid::from("n2"));
        store.insert(vec![src, tgt]).await.unwrap();

        let evidence = statements(256);
        let mut edge = CagEdge::new(model_id.clone(), "wm/rain", "wm/flood");
        edge.set_id(Oid::from("e1"));
        edge.reference_ids = evidence.iter().map(|s| s.id.clone()).collect();
        store.insert(vec![edge]).await.unwrap();
        store.insert(evidence).await.unwrap();
    });

    c.bench_function("recalculate_converged_graph", |b| {
        b.to_async(&rt)
            .iter(|| async { recalculate(&store, &model_id).await.unwrap() });
    });
}

criterion_group!(
    benches,
    bench_composition,
    bench_filter_matching,
    bench_recalculate
);
criterion_main!(benches);
