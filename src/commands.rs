use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::properties::{Oid, Polarity};

/// A corpus curation edit, as reported by the statement-editing pipeline.
///
/// The statement store applies these edits itself; this engine only needs to
/// know that the named statements changed so it can flag dependent graphs
/// stale. Modeling the edit as a closed sum (rather than a string update
/// type) makes the dispatch in [crate::engine::CagService::flag_stale_after]
/// exhaustive: a new curation kind fails to compile until it is handled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum CurationOp {
    /// Statements removed from the evidence pool.
    Discard,
    /// Statements confirmed correct by an analyst.
    Vet,
    /// Subject/object swapped.
    Reverse,
    /// Subject and/or object re-grounded to different concepts.
    Reground {
        subj: Option<String>,
        obj: Option<String>,
    },
    /// Subject and/or object polarity corrected.
    Repolarize {
        subj: Option<Polarity>,
        obj: Option<Polarity>,
    },
}

impl CurationOp {
    /// Whether this edit can invalidate derived edge state. Every current
    /// kind touches at least one composition input: discard removes
    /// evidence, vetting adjusts its belief contribution, reversal and
    /// re-grounding move the grounding intersection, and repolarization
    /// changes the sign counts. The match is exhaustive so a new curation
    /// kind must decide for itself before it compiles.
    pub fn affects_composition(&self) -> bool {
        match self {
            CurationOp::Discard => true,
            CurationOp::Vet => true,
            CurationOp::Reverse => true,
            CurationOp::Reground { .. } => true,
            CurationOp::Repolarize { .. } => true,
        }
    }
}

impl Display for CurationOp {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            CurationOp::Discard => write!(f, "discard"),
            CurationOp::Vet => write!(f, "vet"),
            CurationOp::Reverse => write!(f, "reverse"),
            CurationOp::Reground { subj, obj } => write!(
                f,
                "reground(subj: {}, obj: {})",
                subj.as_deref().unwrap_or("-"),
                obj.as_deref().unwrap_or("-")
            ),
            CurationOp::Repolarize { subj, obj } => write!(
                f,
                "repolarize(subj: {}, obj: {})",
                subj.map(|p| p.to_string()).unwrap_or_else(|| "-".into()),
                obj.map(|p| p.to_string()).unwrap_or_else(|| "-".into())
            ),
        }
    }
}

/// One batch of curation edits scoped to a project corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurationBatch {
    pub project_id: Oid,
    pub op: CurationOp,
    pub statement_ids: Vec<Oid>,
}

impl Display for CurationBatch {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} x{} in project {}",
            self.op,
            self.statement_ids.len(),
            self.project_id
        )
    }
}
