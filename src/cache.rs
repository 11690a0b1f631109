//! Read-through cache of denormalized graph components.
//!
//! One explicit component with its own lifecycle: callers construct it, the
//! service consults it on [crate::engine::CagService::components] and
//! invalidates it on every mutating operation, and dropping it tears it
//! down. Nothing here is ambient or global.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::Arc,
};

use parking_lot::RwLock;

use crate::{engine::GraphComponents, properties::Oid};

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<Oid, Arc<GraphComponents>>,
    order: VecDeque<Oid>,
}

/// Bounded cache keyed by graph id. Eviction is insertion-ordered; a
/// capacity of zero disables retention entirely.
#[derive(Debug)]
pub struct ComponentCache {
    capacity: usize,
    inner: RwLock<Inner>,
}

impl ComponentCache {
    pub fn new(capacity: usize) -> Self {
        ComponentCache {
            capacity,
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn get(&self, model_id: &Oid) -> Option<Arc<GraphComponents>> {
        self.inner.read().entries.get(model_id).cloned()
    }

    pub fn put(&self, model_id: Oid, components: Arc<GraphComponents>) {
        let mut inner = self.inner.write();
        if inner.entries.insert(model_id.clone(), components).is_none() {
            inner.order.push_back(model_id);
        }
        while inner.entries.len() > self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
        }
    }

    pub fn invalidate(&self, model_id: &Oid) {
        let mut inner = self.inner.write();
        if inner.entries.remove(model_id).is_some() {
            inner.order.retain(|id| id != model_id);
            tracing::debug!("[ComponentCache] invalidated graph {}", model_id);
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }
}
