use serde::{Deserialize, Serialize};

use crate::properties::Oid;

/// Notification emitted after a mutating engine operation has been applied
/// to the store, so out-of-process caches and UIs can follow graph state
/// incrementally instead of polling.
///
/// Events describe what already happened; they are not commands and carry no
/// delivery guarantee. A missing subscriber is not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CagEvent {
    /// Nodes, edges or groups were written through the bulk upsert path.
    ComponentsChanged(Oid),
    /// A node concept was renamed and the cascade completed.
    ConceptRenamed {
        model_id: Oid,
        from: String,
        to: String,
    },
    GraphCreated(Oid),
    GraphDeleted(Oid),
    /// Corpus edits invalidated the derived state of these graphs.
    GraphsFlaggedStale(Vec<Oid>),
    /// Recalculation converged; the graph's stale flag is clear.
    Recalculated {
        model_id: Oid,
        edges_updated: usize,
        is_ambiguous: bool,
    },
}
