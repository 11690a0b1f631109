/// [crate::properties] contains the basic building blocks for assembling and
/// manipulating causal analysis graphs (CAGs) and the corpus statements that
/// back their edges.
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter},
    time::{SystemTime, UNIX_EPOCH},
};

pub use uuid::Uuid;

use crate::error::CagError;

/// Milliseconds since the Unix epoch. All record modification stamps use this
/// resolution so they can be compared against corpus-side timestamps.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Object ID
///
/// A string-typed record identifier. Records generated by this engine carry a
/// UUIDv7 in simple encoding, which keeps ids lexically time-ordered within
/// the generating process. Records owned by the corpus (statements) keep
/// whatever id the extraction pipeline assigned, so the inner representation
/// stays an opaque string rather than a parsed [Uuid].
///
/// A nil (empty) Oid marks a record that has not been persisted yet; the bulk
/// upsert path routes such records to its "create" batch.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Oid(String);

impl Oid {
    pub fn generate() -> Self {
        Oid(Uuid::now_v7().simple().to_string())
    }

    /// An empty Oid, used when staging records for creation.
    pub fn nil() -> Self {
        Oid(String::new())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Oid {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Oid {
    fn from(s: &str) -> Self {
        Oid(s.to_string())
    }
}

impl From<String> for Oid {
    fn from(s: String) -> Self {
        Oid(s)
    }
}

/// Sign of a causal assertion, or of an edge's aggregate evidence.
///
/// Serialized as the integers -1/0/1 to stay compatible with the corpus
/// documents produced by the extraction pipeline.
#[derive(
    Clone, Copy, Debug, Default, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord,
)]
#[serde(into = "i8", try_from = "i8")]
pub enum Polarity {
    Negative,
    #[default]
    Unknown,
    Positive,
}

impl Polarity {
    /// Product of two factor polarities. Unknown is absorbing: a statement
    /// whose subject or object sign is unresolved asserts no net sign.
    pub fn combine(self, other: Polarity) -> Polarity {
        match (self, other) {
            (Polarity::Unknown, _) | (_, Polarity::Unknown) => Polarity::Unknown,
            (a, b) if a == b => Polarity::Positive,
            _ => Polarity::Negative,
        }
    }

    pub fn as_i8(self) -> i8 {
        match self {
            Polarity::Negative => -1,
            Polarity::Unknown => 0,
            Polarity::Positive => 1,
        }
    }
}

impl From<Polarity> for i8 {
    fn from(p: Polarity) -> i8 {
        p.as_i8()
    }
}

impl TryFrom<i8> for Polarity {
    type Error = CagError;

    fn try_from(v: i8) -> Result<Self, Self::Error> {
        match v {
            -1 => Ok(Polarity::Negative),
            0 => Ok(Polarity::Unknown),
            1 => Ok(Polarity::Positive),
            other => Err(CagError::Serialization(format!(
                "polarity must be -1, 0 or 1, got {other}"
            ))),
        }
    }
}

impl Display for Polarity {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_i8())
    }
}

/// Registration state of a graph with the external projection engine.
#[derive(
    Clone, Copy, Debug, Default, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineStatus {
    #[default]
    NotRegistered,
    Training,
    Ready,
}

/// Analyst curation state of a corpus statement. Discarded statements never
/// count as backing evidence.
#[derive(
    Clone, Copy, Debug, Default, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CurationState {
    #[default]
    Raw,
    Vetted,
    Discarded,
}

/// A record persisted in the document store. Implementors name their
/// collection and expose the id and modification stamp the store contract
/// needs; this is what gives every entity the same find/insert/update/remove
/// shape without a string-keyed resource registry.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    const COLLECTION: &'static str;

    fn id(&self) -> &Oid;

    fn set_id(&mut self, id: Oid);

    /// Stamp the record's modification time.
    fn touch(&mut self, now: i64);
}

/// A record owned by a graph. Everything implementing this is cascade-
/// deleted with its graph and keyed by `model_id` in the store.
pub trait Component: Record {
    fn model_id(&self) -> &Oid;

    fn set_model_id(&mut self, model_id: Oid);
}

macro_rules! impl_component {
    ($($ty:ty),+) => {
        $(impl Component for $ty {
            fn model_id(&self) -> &Oid {
                &self.model_id
            }

            fn set_model_id(&mut self, model_id: Oid) {
                self.model_id = model_id;
            }
        })+
    };
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

/// Projection parameters of a graph: which external engine runs experiments
/// over it, and over what window.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelParameter {
    pub engine: String,
    pub time_scale: String,
    #[serde(default)]
    pub geography: Vec<String>,
    pub projection_start: i64,
    pub num_steps: u32,
    #[serde(default)]
    pub history_range: Option<TimeRange>,
}

/// The root aggregate: one causal analysis graph.
///
/// `is_stale` and `is_ambiguous` are derived caches. They are only ever
/// written by the staleness detector and the recalculation engine; nothing
/// else may touch them.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CagModel {
    pub id: Oid,
    pub project_id: Oid,
    pub name: String,
    pub status: EngineStatus,
    pub engine_status: EngineStatus,
    pub is_stale: bool,
    pub is_ambiguous: bool,
    pub parameter: ModelParameter,
    pub created_at: i64,
    pub modified_at: i64,
}

impl Record for CagModel {
    const COLLECTION: &'static str = "graphs";

    fn id(&self) -> &Oid {
        &self.id
    }

    fn set_id(&mut self, id: Oid) {
        self.id = id;
    }

    fn touch(&mut self, now: i64) {
        self.modified_at = now;
    }
}

/// A concept node. `concept` is unique within a graph; `components` is the
/// set of compositional-ontology concepts the flattened concept groups
/// together, used to test whether a statement still belongs to an edge.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CagNode {
    pub id: Oid,
    pub model_id: Oid,
    pub concept: String,
    pub label: String,
    #[serde(default)]
    pub components: BTreeSet<String>,
    pub modified_at: i64,
}

impl CagNode {
    /// A fresh node grounded, absent anything finer, to its own concept.
    pub fn new(model_id: Oid, concept: impl Into<String>) -> Self {
        let concept = concept.into();
        CagNode {
            id: Oid::nil(),
            model_id,
            label: concept.clone(),
            components: BTreeSet::from([concept.clone()]),
            concept,
            modified_at: 0,
        }
    }

    /// The grounding set used for evidence matching. Nodes written by older
    /// clients may carry an empty `components`; those ground to the concept
    /// itself so the intersection test stays well-defined.
    pub fn grounding(&self) -> BTreeSet<String> {
        if self.components.is_empty() {
            BTreeSet::from([self.concept.clone()])
        } else {
            self.components.clone()
        }
    }
}

impl Record for CagNode {
    const COLLECTION: &'static str = "nodes";

    fn id(&self) -> &Oid {
        &self.id
    }

    fn set_id(&mut self, id: Oid) {
        self.id = id;
    }

    fn touch(&mut self, now: i64) {
        self.modified_at = now;
    }
}

/// A directed causal assertion between two node concepts, together with the
/// derived composition of its backing evidence.
///
/// `same`/`opposite`/`unknown`, `belief_score` and `polarity` are caches over
/// the statements named by `reference_ids`; the recalculation engine is
/// solely responsible for refreshing them. If `user_polarity` is set,
/// `polarity` always equals it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CagEdge {
    pub id: Oid,
    pub model_id: Oid,
    pub source: String,
    pub target: String,
    /// Backing statement ids, in analyst assertion order.
    #[serde(default)]
    pub reference_ids: Vec<Oid>,
    pub same: u32,
    pub opposite: u32,
    pub unknown: u32,
    pub belief_score: f64,
    pub polarity: Polarity,
    #[serde(default)]
    pub user_polarity: Option<Polarity>,
    pub modified_at: i64,
}

impl Default for CagEdge {
    fn default() -> Self {
        CagEdge {
            id: Oid::nil(),
            model_id: Oid::nil(),
            source: String::new(),
            target: String::new(),
            reference_ids: Vec::new(),
            same: 0,
            opposite: 0,
            unknown: 0,
            belief_score: 1.0,
            polarity: Polarity::Unknown,
            user_polarity: None,
            modified_at: 0,
        }
    }
}

impl CagEdge {
    pub fn new(model_id: Oid, source: impl Into<String>, target: impl Into<String>) -> Self {
        CagEdge {
            model_id,
            source: source.into(),
            target: target.into(),
            ..Default::default()
        }
    }
}

impl Record for CagEdge {
    const COLLECTION: &'static str = "edges";

    fn id(&self) -> &Oid {
        &self.id
    }

    fn set_id(&mut self, id: Oid) {
        self.id = id;
    }

    fn touch(&mut self, now: i64) {
        self.modified_at = now;
    }
}

/// Pure visual/semantic containment of nodes or other groups. No derived
/// state.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeGroup {
    pub id: Oid,
    pub model_id: Oid,
    pub label: String,
    #[serde(default)]
    pub children: Vec<Oid>,
    pub modified_at: i64,
}

impl Record for NodeGroup {
    const COLLECTION: &'static str = "node_groups";

    fn id(&self) -> &Oid {
        &self.id
    }

    fn set_id(&mut self, id: Oid) {
        self.id = id;
    }

    fn touch(&mut self, now: i64) {
        self.modified_at = now;
    }
}

/// One clamped time series applied to a concept during a what-if run.
/// The `concept` must name a live [CagNode::concept] in the same graph; the
/// rename cascade keeps this true.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Constraint {
    pub concept: String,
    #[serde(default)]
    pub values: Vec<ConstraintStep>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ConstraintStep {
    pub step: u32,
    pub value: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ScenarioParameter {
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

/// A saved what-if experiment over a graph.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub id: Oid,
    pub model_id: Oid,
    pub name: String,
    pub is_baseline: bool,
    pub parameter: ScenarioParameter,
    pub modified_at: i64,
}

impl Record for Scenario {
    const COLLECTION: &'static str = "scenarios";

    fn id(&self) -> &Oid {
        &self.id
    }

    fn set_id(&mut self, id: Oid) {
        self.id = id;
    }

    fn touch(&mut self, now: i64) {
        self.modified_at = now;
    }
}

/// Projection output of one scenario run. Opaque to this engine; tracked only
/// so graph deletion can cascade to it.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ScenarioResult {
    pub id: Oid,
    pub model_id: Oid,
    pub scenario_id: Oid,
    #[serde(default)]
    pub result: serde_json::Value,
    pub modified_at: i64,
}

impl Record for ScenarioResult {
    const COLLECTION: &'static str = "scenario_results";

    fn id(&self) -> &Oid {
        &self.id
    }

    fn set_id(&mut self, id: Oid) {
        self.id = id;
    }

    fn touch(&mut self, now: i64) {
        self.modified_at = now;
    }
}

/// Sensitivity analysis output for a graph. Opaque, cascade-deleted with it.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SensitivityResult {
    pub id: Oid,
    pub model_id: Oid,
    #[serde(default)]
    pub result: serde_json::Value,
    pub modified_at: i64,
}

impl Record for SensitivityResult {
    const COLLECTION: &'static str = "sensitivity_results";

    fn id(&self) -> &Oid {
        &self.id
    }

    fn set_id(&mut self, id: Oid) {
        self.id = id;
    }

    fn touch(&mut self, now: i64) {
        self.modified_at = now;
    }
}

impl_component!(
    CagNode,
    CagEdge,
    NodeGroup,
    Scenario,
    ScenarioResult,
    SensitivityResult
);

/// Alternative grounding of a statement factor, with its score from the
/// grounding pipeline.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Grounding {
    pub name: String,
    pub score: f64,
}

/// Subject or object of a statement.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct StatementFactor {
    pub concept: String,
    pub polarity: Polarity,
    #[serde(default)]
    pub candidates: Vec<Grounding>,
}

impl StatementFactor {
    /// Whether this factor's grounding intersects a node's component set.
    /// The chosen concept counts alongside the candidate groundings.
    pub fn grounded_in(&self, components: &BTreeSet<String>) -> bool {
        components.contains(&self.concept)
            || self.candidates.iter().any(|c| components.contains(&c.name))
    }
}

/// A machine-extracted causal assertion. Owned by the corpus: this engine
/// reads statements but never writes them.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Statement {
    pub id: Oid,
    pub project_id: Oid,
    pub subj: StatementFactor,
    pub obj: StatementFactor,
    pub belief: f64,
    pub state: CurationState,
    pub modified_at: i64,
}

impl Statement {
    /// The asserted sign of the causal relation: the product of the factor
    /// polarities, with unknown absorbing.
    pub fn statement_polarity(&self) -> Polarity {
        self.subj.polarity.combine(self.obj.polarity)
    }
}

impl Record for Statement {
    const COLLECTION: &'static str = "statements";

    fn id(&self) -> &Oid {
        &self.id
    }

    fn set_id(&mut self, id: Oid) {
        self.id = id;
    }

    fn touch(&mut self, now: i64) {
        self.modified_at = now;
    }
}
