//! # aetia-core
//!
//! A Rust library that keeps analyst-built causal analysis graphs (CAGs)
//! consistent with a large, continuously edited corpus of machine-extracted
//! evidence statements.
//!
//! The name "aetia" comes from "aetiology" - the study of causation.
//!
//! ## Overview
//!
//! Analysts assemble graphs whose nodes are concepts and whose directed
//! edges are causal assertions, each backed by corpus statements. The corpus
//! never sits still: statements are discarded, re-grounded, reversed and
//! re-polarized. aetia-core is the reconciliation engine that keeps every
//! graph an accurate, queryable projection of that moving corpus without
//! rebuilding it from scratch on each edit.
//!
//! ### Key Features
//!
//! - **Edge composition**: each edge's same/opposite/unknown counts, belief
//!   score and aggregate polarity are derived from its backing statements,
//!   with explicit user overrides honored everywhere
//! - **Staleness detection**: a batch of corpus edits maps to exactly the
//!   graphs whose edges reference the touched statements
//! - **Recalculation**: a concurrent, idempotent convergence pass that
//!   recomputes every edge's still-valid backing set and the graph-level
//!   ambiguity flag, then clears staleness
//! - **Concept rename cascade**: node, edge endpoints and scenario
//!   constraints rewritten as one best-effort sequential unit
//! - **Lifecycle**: graph creation with merged parameter defaults, and
//!   cascading best-effort deletes of every dependent resource
//! - **Pluggable store**: everything runs against a generic filtered-find /
//!   bulk-upsert / bulk-delete contract, with in-memory and sqlite adapters
//!
//! ## Architecture
//!
//! - **[`engine`]**: the consistency engine ([`engine::CagService`]) and its
//!   component algorithms
//! - **[`properties`]**: record types, identifiers, polarity semantics
//! - **[`store`]**: the document store contract and the in-memory adapter
//! - **[`db`]**: the sqlx/sqlite adapter
//! - **[`query`]**: the clause language shared by both adapters
//! - **[`cache`]**: the injected component cache
//! - **[`commands`]** / **[`event`]**: typed curation input and mutation
//!   notifications
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aetia_core::{
//!     config::ServiceConfig,
//!     engine::{CagService, GraphFields},
//!     properties::{CagEdge, CagNode, Oid},
//!     store::MemStore,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = CagService::new(MemStore::new(), &ServiceConfig::default());
//!
//!     let nodes = vec![
//!         CagNode::new(Oid::nil(), "wm/concept/rainfall"),
//!         CagNode::new(Oid::nil(), "wm/concept/flooding"),
//!     ];
//!     let edges = vec![CagEdge::new(
//!         Oid::nil(),
//!         "wm/concept/rainfall",
//!         "wm/concept/flooding",
//!     )];
//!     let fields = GraphFields {
//!         name: "flood model".to_string(),
//!         ..Default::default()
//!     };
//!     let model_id = service.create_graph(fields, nodes, edges).await?;
//!
//!     // Later, after corpus edits have flagged the graph stale:
//!     let summary = service.recalculate(&model_id).await?;
//!     println!("{} edges updated", summary.edges_updated);
//!     Ok(())
//! }
//! ```
//!
//! ## Consistency Model
//!
//! The store provides single-document atomicity and nothing more. The
//! engine holds no locks; correctness is eventual convergence, and the
//! recommended conflict-resolution strategy is rerunning recalculation,
//! which is idempotent. A graph whose recalculation failed keeps its stale
//! flag set - staleness is itself the recovery signal.

pub mod cache;
pub mod commands;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod event;
pub mod properties;
pub mod query;
pub mod store;

pub use error::*;
