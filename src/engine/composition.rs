//! Edge composition: deriving an edge's aggregate evidence fields from its
//! backing statements.

use crate::{
    error::CagError,
    properties::{CagEdge, Polarity, Statement},
    store::EvidenceSource,
};

/// The derived fields of one edge: evidence counts by sign, mean belief, and
/// the aggregate polarity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EdgeComposition {
    pub same: u32,
    pub opposite: u32,
    pub unknown: u32,
    pub belief_score: f64,
    pub polarity: Polarity,
}

impl EdgeComposition {
    /// Accumulate a statement set into counts, mean belief, and polarity.
    ///
    /// An empty set is a defined state, not an error: counts are zero,
    /// belief defaults to 1, and polarity falls back to the user override or
    /// unknown. An edge can reach this state through corpus churn without
    /// losing its place in the graph topology.
    pub fn resolve(statements: &[Statement], user_polarity: Option<Polarity>) -> Self {
        if statements.is_empty() {
            return EdgeComposition {
                same: 0,
                opposite: 0,
                unknown: 0,
                belief_score: 1.0,
                polarity: user_polarity.unwrap_or_default(),
            };
        }
        let mut same = 0u32;
        let mut opposite = 0u32;
        let mut unknown = 0u32;
        let mut belief_sum = 0f64;
        for statement in statements {
            match statement.statement_polarity() {
                Polarity::Positive => same += 1,
                Polarity::Negative => opposite += 1,
                Polarity::Unknown => unknown += 1,
            }
            belief_sum += statement.belief;
        }
        // Tie-break: unanimous nonzero evidence wins, anything else
        // (conflict, or nothing but unknowns) resolves to unknown.
        let polarity = user_polarity.unwrap_or_else(|| {
            if same > 0 && opposite == 0 {
                Polarity::Positive
            } else if opposite > 0 && same == 0 {
                Polarity::Negative
            } else {
                Polarity::Unknown
            }
        });
        EdgeComposition {
            same,
            opposite,
            unknown,
            belief_score: belief_sum / statements.len() as f64,
            polarity,
        }
    }

    /// Evidence disagrees on sign: a +1/-1 mixture, or unknowns mixed with
    /// signed statements. All-unknown or empty evidence is not mixed.
    pub fn mixed_evidence(&self) -> bool {
        (self.same > 0 && self.opposite > 0)
            || (self.unknown > 0 && (self.same > 0 || self.opposite > 0))
    }

    /// Whether an edge's stored derived fields already agree with this
    /// composition. Belief scores are compared exactly: both sides derive
    /// from the same statement beliefs by the same arithmetic.
    pub fn matches_edge(&self, edge: &CagEdge) -> bool {
        edge.same == self.same
            && edge.opposite == self.opposite
            && edge.unknown == self.unknown
            && edge.belief_score == self.belief_score
            && edge.polarity == self.polarity
    }

    pub fn apply_to(&self, edge: &mut CagEdge) {
        edge.same = self.same;
        edge.opposite = self.opposite;
        edge.unknown = self.unknown;
        edge.belief_score = self.belief_score;
        edge.polarity = self.polarity;
    }
}

/// An edge with no explicit override is ambiguous when its evidence is
/// mixed. A user override silences ambiguity even over split evidence.
pub fn edge_is_ambiguous(composition: &EdgeComposition, user_polarity: Option<Polarity>) -> bool {
    user_polarity.is_none() && composition.mixed_evidence()
}

/// Resolve one edge's composition from the statements its `reference_ids`
/// name. Ids that no longer resolve to a statement degrade silently to a
/// smaller evidence set.
pub async fn resolve_edge<S: EvidenceSource>(
    store: &S,
    edge: &CagEdge,
) -> Result<EdgeComposition, CagError> {
    if edge.reference_ids.is_empty() {
        return Ok(EdgeComposition::resolve(&[], edge.user_polarity));
    }
    let statements = store.statements_by_id(&edge.reference_ids).await?;
    if statements.len() != edge.reference_ids.len() {
        tracing::debug!(
            "[resolve_edge] edge {}: {} of {} referenced statements resolve",
            edge.id,
            statements.len(),
            edge.reference_ids.len()
        );
    }
    Ok(EdgeComposition::resolve(&statements, edge.user_polarity))
}
