//! The document store contract and the in-memory reference adapter.
//!
//! The engine never talks to a concrete database directly; every component
//! works against [DocStore] (generic filtered find / bulk upsert / bulk
//! delete) plus [EvidenceSource] (the richer statement-search call used by
//! recalculation). Two adapters implement the pair: [MemStore] here, and
//! [crate::db::SqliteStore]. Unit tests run against the former, deployments
//! and the integration suite against the latter.

use std::{
    collections::{BTreeMap, BTreeSet},
    future::Future,
    sync::atomic::{AtomicU64, Ordering},
};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::CagError,
    properties::{CurationState, Oid, Record, Statement},
    query::{Filter, FindOptions},
};

/// Per-item failure inside a bulk write.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemError {
    pub id: Oid,
    pub reason: String,
}

/// Uniform result shape of every bulk write. `errors` non-empty means the
/// batch must be treated as failed by the caller; the store itself never
/// retries or rolls back.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkResponse {
    pub errors: Vec<ItemError>,
    pub items: Vec<Oid>,
}

impl BulkResponse {
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Collapse into a hard failure naming the first failing item, the
    /// propagation policy for all store write failures.
    pub fn into_result(self, collection: &str) -> Result<Vec<Oid>, CagError> {
        match self.errors.first() {
            None => Ok(self.items),
            Some(first) => Err(CagError::BulkWrite {
                collection: collection.to_string(),
                item: first.id.to_string(),
                reason: first.reason.clone(),
            }),
        }
    }
}

/// Generic filtered-find / bulk-upsert / bulk-delete contract over typed
/// record collections. Single-document atomicity only: batches apply item by
/// item with no cross-item rollback.
pub trait DocStore: Send + Sync {
    fn find<R: Record>(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> impl Future<Output = Result<Vec<R>, CagError>> + Send;

    fn find_one<R: Record>(
        &self,
        filter: &Filter,
    ) -> impl Future<Output = Result<Option<R>, CagError>> + Send {
        async move {
            Ok(self
                .find::<R>(filter, &FindOptions::limit(1))
                .await?
                .pop())
        }
    }

    /// Write new records. Every record must already carry an id; assigning
    /// ids to fresh records is the bulk-upsert component's job.
    fn insert<R: Record>(
        &self,
        records: Vec<R>,
    ) -> impl Future<Output = Result<BulkResponse, CagError>> + Send;

    /// Replace existing records by id.
    fn update<R: Record>(
        &self,
        records: Vec<R>,
    ) -> impl Future<Output = Result<BulkResponse, CagError>> + Send;

    /// Delete every record matching the filter; returns the deleted count.
    fn remove<R: Record>(&self, filter: &Filter)
        -> impl Future<Output = Result<u64, CagError>> + Send;

    fn remove_many<R: Record>(
        &self,
        ids: &[Oid],
    ) -> impl Future<Output = Result<u64, CagError>> + Send;

    fn count<R: Record>(&self, filter: &Filter)
        -> impl Future<Output = Result<u64, CagError>> + Send;
}

/// Statement search beyond the generic clause language: the grounding
/// intersection query recalculation runs per edge, and plain id fetches.
///
/// Both calls degrade silently on missing ids: a statement that was deleted
/// from the corpus simply does not appear in the result, which is the normal
/// input of recalculation rather than an error.
pub trait EvidenceSource: Send + Sync {
    fn statements_by_id(
        &self,
        ids: &[Oid],
    ) -> impl Future<Output = Result<Vec<Statement>, CagError>> + Send;

    /// The still-valid subset of `reference_ids`: statements that exist, are
    /// not discarded, and whose subject/object groundings intersect the
    /// source/target component sets. Result order follows `reference_ids`.
    fn matching_evidence(
        &self,
        source_components: &BTreeSet<String>,
        target_components: &BTreeSet<String>,
        reference_ids: &[Oid],
    ) -> impl Future<Output = Result<Vec<Statement>, CagError>> + Send;
}

type Collections = BTreeMap<&'static str, BTreeMap<String, Value>>;

/// In-memory [DocStore] over JSON documents. The reference semantics for
/// filter evaluation and the substrate of the engine's unit tests.
#[derive(Debug, Default)]
pub struct MemStore {
    collections: RwLock<Collections>,
    writes: AtomicU64,
}

impl MemStore {
    pub fn new() -> Self {
        MemStore::default()
    }

    /// Number of successful write operations applied so far. Tests use this
    /// to assert that idempotent re-runs produce zero writes.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    fn docs_matching<R: Record>(&self, filter: &Filter, limit: Option<usize>) -> Vec<Value> {
        let collections = self.collections.read();
        let Some(collection) = collections.get(R::COLLECTION) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for doc in collection.values() {
            if filter.matches(doc) {
                out.push(doc.clone());
                if limit.is_some_and(|n| out.len() >= n) {
                    break;
                }
            }
        }
        out
    }
}

impl DocStore for MemStore {
    async fn find<R: Record>(
        &self,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Vec<R>, CagError> {
        self.docs_matching::<R>(filter, options.limit)
            .into_iter()
            .map(|doc| serde_json::from_value::<R>(doc).map_err(CagError::from))
            .collect()
    }

    async fn insert<R: Record>(&self, records: Vec<R>) -> Result<BulkResponse, CagError> {
        let mut response = BulkResponse::default();
        let mut collections = self.collections.write();
        let collection = collections.entry(R::COLLECTION).or_default();
        for record in records {
            let id = record.id().clone();
            if id.is_nil() {
                response.errors.push(ItemError {
                    id,
                    reason: "insert requires an assigned id".to_string(),
                });
                continue;
            }
            if collection.contains_key(id.as_str()) {
                response.errors.push(ItemError {
                    id,
                    reason: "duplicate id".to_string(),
                });
                continue;
            }
            collection.insert(id.as_str().to_string(), serde_json::to_value(&record)?);
            self.writes.fetch_add(1, Ordering::Relaxed);
            response.items.push(id);
        }
        Ok(response)
    }

    async fn update<R: Record>(&self, records: Vec<R>) -> Result<BulkResponse, CagError> {
        let mut response = BulkResponse::default();
        let mut collections = self.collections.write();
        let collection = collections.entry(R::COLLECTION).or_default();
        for record in records {
            let id = record.id().clone();
            match collection.get_mut(id.as_str()) {
                Some(slot) => {
                    *slot = serde_json::to_value(&record)?;
                    self.writes.fetch_add(1, Ordering::Relaxed);
                    response.items.push(id);
                }
                None => response.errors.push(ItemError {
                    id,
                    reason: "no record with this id".to_string(),
                }),
            }
        }
        Ok(response)
    }

    async fn remove<R: Record>(&self, filter: &Filter) -> Result<u64, CagError> {
        let mut collections = self.collections.write();
        let Some(collection) = collections.get_mut(R::COLLECTION) else {
            return Ok(0);
        };
        let before = collection.len();
        collection.retain(|_, doc| !filter.matches(doc));
        let deleted = (before - collection.len()) as u64;
        if deleted > 0 {
            self.writes.fetch_add(deleted, Ordering::Relaxed);
        }
        Ok(deleted)
    }

    async fn remove_many<R: Record>(&self, ids: &[Oid]) -> Result<u64, CagError> {
        let mut collections = self.collections.write();
        let Some(collection) = collections.get_mut(R::COLLECTION) else {
            return Ok(0);
        };
        let mut deleted = 0;
        for id in ids {
            if collection.remove(id.as_str()).is_some() {
                deleted += 1;
            }
        }
        if deleted > 0 {
            self.writes.fetch_add(deleted, Ordering::Relaxed);
        }
        Ok(deleted)
    }

    async fn count<R: Record>(&self, filter: &Filter) -> Result<u64, CagError> {
        Ok(self.docs_matching::<R>(filter, None).len() as u64)
    }
}

impl EvidenceSource for MemStore {
    async fn statements_by_id(&self, ids: &[Oid]) -> Result<Vec<Statement>, CagError> {
        let collections = self.collections.read();
        let Some(collection) = collections.get(Statement::COLLECTION) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for id in ids {
            if let Some(doc) = collection.get(id.as_str()) {
                out.push(serde_json::from_value::<Statement>(doc.clone())?);
            }
        }
        Ok(out)
    }

    async fn matching_evidence(
        &self,
        source_components: &BTreeSet<String>,
        target_components: &BTreeSet<String>,
        reference_ids: &[Oid],
    ) -> Result<Vec<Statement>, CagError> {
        let mut out = Vec::new();
        for statement in self.statements_by_id(reference_ids).await? {
            if statement.state != CurationState::Discarded
                && statement.subj.grounded_in(source_components)
                && statement.obj.grounded_in(target_components)
            {
                out.push(statement);
            }
        }
        Ok(out)
    }
}
