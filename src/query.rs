//! Filter language for the document store contract.
//!
//! Every store operation takes a [Filter]: a conjunction of field clauses.
//! Clauses are equality constraints or, for statement search and staleness
//! detection, set-membership constraints over scalar or array fields. The
//! same clause list evaluates directly against in-memory JSON documents
//! ([Filter::matches]) and compiles to SQL in the sqlite adapter.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::properties::Oid;

/// One conjunct of a [Filter].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Clause {
    /// `field == value`
    Eq { field: String, value: Value },
    /// Scalar field membership: `field IN values` (or NOT IN when negated).
    In {
        field: String,
        values: Vec<Value>,
        negate: bool,
    },
    /// Array field intersection: the document's array field shares at least
    /// one element with `values` (or none, when negated).
    Any {
        field: String,
        values: Vec<Value>,
        negate: bool,
    },
}

impl Clause {
    pub fn field(&self) -> &str {
        match self {
            Clause::Eq { field, .. } => field,
            Clause::In { field, .. } => field,
            Clause::Any { field, .. } => field,
        }
    }

    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Clause::Eq { field, value } => field_value(doc, field) == Some(value),
            Clause::In {
                field,
                values,
                negate,
            } => {
                let hit = field_value(doc, field).is_some_and(|v| values.contains(v));
                hit != *negate
            }
            Clause::Any {
                field,
                values,
                negate,
            } => {
                let hit = match field_value(doc, field) {
                    Some(Value::Array(elems)) => elems.iter().any(|e| values.contains(e)),
                    _ => false,
                };
                hit != *negate
            }
        }
    }
}

/// Resolve a dotted field path ("subj.concept") against a JSON document.
fn field_value<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// A conjunction of [Clause]s. An empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn new() -> Self {
        Filter::default()
    }

    /// Filter on a record's own id.
    pub fn id(id: &Oid) -> Self {
        Filter::new().eq("id", id.as_str())
    }

    /// Filter on the owning graph id, the key every dependent component
    /// record carries.
    pub fn model(model_id: &Oid) -> Self {
        Filter::new().eq("model_id", model_id.as_str())
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push(Clause::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn is_in(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.clauses.push(Clause::In {
            field: field.into(),
            values,
            negate: false,
        });
        self
    }

    pub fn not_in(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.clauses.push(Clause::In {
            field: field.into(),
            values,
            negate: true,
        });
        self
    }

    pub fn any(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.clauses.push(Clause::Any {
            field: field.into(),
            values,
            negate: false,
        });
        self
    }

    pub fn none(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.clauses.push(Clause::Any {
            field: field.into(),
            values,
            negate: true,
        });
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.clauses.iter().all(|c| c.matches(doc))
    }
}

/// Id list as clause values.
pub fn oid_values(ids: &[Oid]) -> Vec<Value> {
    ids.iter().map(|id| Value::from(id.as_str())).collect()
}

/// Options applied after filtering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindOptions {
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn limit(n: usize) -> Self {
        FindOptions { limit: Some(n) }
    }
}
