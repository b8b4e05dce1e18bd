//! # fusegraph
//!
//! A knowledge-graph retrieval and fusion engine over a pluggable,
//! tenant-aware graph store.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fusegraph::prelude::*;
//!
//! # async fn run() -> fusegraph::Result<()> {
//! let store = MemoryGraphStore::new();
//! let tenant = TenantContext::new("acme")?;
//!
//! store
//!     .add_entity(
//!         Entity::new("e1", "Company")
//!             .with_property("name", "Acme Graph Systems")
//!             .with_embedding(vec![0.9, 0.1, 0.0]),
//!         Some(&tenant),
//!     )
//!     .await?;
//!
//! let engine = KnowledgeEngine::new(store, EngineConfig::default())?;
//!
//! // Hybrid search + reranking, scoped to the tenant
//! let query = Vector::new(vec![1.0, 0.0, 0.0]);
//! let results = engine.search("graph systems", &query, None, Some(&tenant)).await;
//!
//! // Merge duplicates within the tenant
//! let stats = engine.fuse(None, Some(&tenant)).await?;
//! println!("{} results, {} entities merged", results.len(), stats.entities_merged);
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Structure
//!
//! fusegraph is composed of several crates:
//!
//! - [`fusegraph-core`](https://docs.rs/fusegraph-core) - Entity/relation model, tenant context, store contract, errors, metrics
//! - [`fusegraph-similarity`](https://docs.rs/fusegraph-similarity) - Similarity primitives, score normalization/combination, reranking
//! - [`fusegraph-search`](https://docs.rs/fusegraph-search) - Hybrid vector/graph search
//! - [`fusegraph-fusion`](https://docs.rs/fusegraph-fusion) - Deduplication, linking, conflict resolution, alias index
//! - [`fusegraph-resilience`](https://docs.rs/fusegraph-resilience) - TTL cache, circuit breaker, retry
//!
//! ## Features
//!
//! - **Hybrid Search**: Vector, graph and combined retrieval with depth-bounded expansion
//! - **Reranking**: Text (BM25/Jaccard), semantic, structural (PageRank) and hybrid strategies
//! - **Knowledge Fusion**: Union-find clustering, provenance-aware conflict resolution
//! - **Multi-Tenancy**: Every operation takes an explicit tenant context
//! - **Resilience**: Cached reads, circuit breaking and bounded retry around the store

pub mod engine;
pub mod telemetry;

pub use engine::{EngineConfig, KnowledgeEngine};

// Re-export core types
pub use fusegraph_core::{
    Entity, EntityId, Error, GraphStore, IsolationMode, MemoryGraphStore, MetricsSnapshot,
    OperationBudget, Path, Relation, Result, TenantContext, Vector,
};

// Re-export component crates
pub use fusegraph_core as core;
pub use fusegraph_fusion as fusion;
pub use fusegraph_resilience as resilience;
pub use fusegraph_search as search;
pub use fusegraph_similarity as similarity;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::engine::{EngineConfig, KnowledgeEngine};
    pub use fusegraph_core::{
        Entity, EntityId, Error, GraphStore, MemoryGraphStore, OperationBudget, Path, Relation,
        Result, TenantContext, Vector,
    };
    pub use fusegraph_fusion::{ConflictStrategy, FusionConfig, FusionStats, LinkResult};
    pub use fusegraph_resilience::ResilienceConfig;
    pub use fusegraph_search::{HybridSearchConfig, SearchMode};
    pub use fusegraph_similarity::{
        CombinationMethod, NormalizationMethod, RankedEntity, RerankConfig, ResultReranker,
    };
    pub use tokio_util::sync::CancellationToken;
}
