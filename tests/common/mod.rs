//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use aetia_core::{
    db::SqliteStore,
    properties::{
        CagEdge, CagNode, CurationState, Grounding, Oid, Polarity, Statement, StatementFactor,
    },
};
use tempfile::TempDir;

/// A scratch sqlite store in a temp directory. The directory guard must
/// outlive the store.
#[allow(dead_code)]
pub async fn scratch_store() -> (TempDir, SqliteStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SqliteStore::connect(&dir.path().join("cag_store.db"))
        .await
        .expect("store connects");
    (dir, store)
}

#[allow(dead_code)]
pub fn factor(concept: &str, polarity: Polarity) -> StatementFactor {
    StatementFactor {
        concept: concept.to_string(),
        polarity,
        candidates: vec![Grounding {
            name: concept.to_string(),
            score: 0.8,
        }],
    }
}

#[allow(dead_code)]
pub fn statement(
    id: &str,
    project: &str,
    subj: &str,
    s_pol: Polarity,
    obj: &str,
    o_pol: Polarity,
    belief: f64,
) -> Statement {
    Statement {
        id: Oid::from(id),
        project_id: Oid::from(project),
        subj: factor(subj, s_pol),
        obj: factor(obj, o_pol),
        belief,
        state: CurationState::Raw,
        modified_at: 0,
    }
}

#[allow(dead_code)]
pub fn node(concept: &str) -> CagNode {
    CagNode::new(Oid::nil(), concept)
}

#[allow(dead_code)]
pub fn edge(source: &str, target: &str, refs: &[&str]) -> CagEdge {
    let mut e = CagEdge::new(Oid::nil(), source, target);
    e.reference_ids = refs.iter().map(|r| Oid::from(*r)).collect();
    e
}
