//! # fusegraph Core
//!
//! Core library for the fusegraph knowledge-graph engine.
//!
//! This crate provides the fundamental data structures and the storage boundary:
//!
//! - [`Entity`], [`Relation`], [`Path`] - The knowledge graph model
//! - [`Vector`] - Dense embeddings with cosine similarity
//! - [`TenantContext`] - Explicit isolation scope threaded through every call
//! - [`GraphStore`] - Async contract implemented by storage backends
//! - [`MemoryGraphStore`] - Reference in-memory backend
//! - [`EngineMetrics`] - Query, cache and fusion counters
//!
//! ## Example
//!
//! ```rust
//! use fusegraph_core::{Entity, GraphStore, MemoryGraphStore, TenantContext, Vector};
//!
//! # tokio_test_block(async {
//! let store = MemoryGraphStore::new();
//! let tenant = TenantContext::new("acme").unwrap();
//!
//! let entity = Entity::new("e1", "Company")
//!     .with_property("name", "Acme Corp")
//!     .with_embedding(vec![1.0, 0.0, 0.0]);
//! store.add_entity(entity, Some(&tenant)).await.unwrap();
//!
//! let query = Vector::new(vec![1.0, 0.0, 0.0]);
//! let hits = store.vector_search(&query, 5, None, None, Some(&tenant)).await.unwrap();
//! assert_eq!(hits[0].0.id, "e1");
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod budget;
pub mod entity;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod store;
pub mod tenant;
pub mod vector;

pub use budget::OperationBudget;
pub use entity::{
    is_metadata_key, Entity, EntityId, Path, PathHop, Properties, Relation, RelationId,
    MERGED_FROM_KEY, MERGED_PROVENANCE_KEY, NAME_KEY, PROPERTY_CONFLICTS_KEY, PROVENANCE_KEY,
};
pub use error::{Error, Result};
pub use memory::MemoryGraphStore;
pub use metrics::{EngineMetrics, LatencySummary, MetricsSnapshot};
pub use store::GraphStore;
pub use tenant::{IsolationMode, TenantContext};
pub use vector::{cosine_similarity, Vector};
