//! # fusegraph Similarity
//!
//! Scoring primitives and the pluggable reranking framework.
//!
//! ## Features
//!
//! - **Text similarity**: Jaccard, term-frequency cosine, Levenshtein
//! - **BM25**: Corpus-level relevance with configurable k1/b
//! - **Score normalization**: Min-max, z-score, softmax
//! - **Score combination**: Weighted average, reciprocal rank fusion, max, min
//! - **Reranking**: Text, semantic, structural (PageRank/degree) and hybrid strategies
//!
//! ## Example
//!
//! ```rust
//! use fusegraph_core::{Entity, Vector};
//! use fusegraph_similarity::{
//!     RerankConfig, RerankContext, RerankStrategy, ResultReranker, SemanticStrategy,
//!     TextSimilarityStrategy,
//! };
//!
//! let strategies: Vec<Box<dyn RerankStrategy>> = vec![
//!     Box::new(TextSimilarityStrategy::new(vec!["name".into()], 0.5, 0.5).unwrap()),
//!     Box::new(SemanticStrategy::new()),
//! ];
//! let reranker = ResultReranker::new(strategies, None, RerankConfig::default()).unwrap();
//!
//! let candidates = vec![
//!     Entity::new("1", "Company").with_property("name", "Acme Graph Systems"),
//!     Entity::new("2", "Company").with_property("name", "Bakery"),
//! ];
//! let context = RerankContext::new().with_query_embedding(Vector::new(vec![1.0, 0.0]));
//! let ranked = reranker.rerank("graph systems", candidates, &context);
//! assert_eq!(ranked[0].entity.id, "1");
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Candidates  │────>│ Strategies  │────>│ Normalize   │
//! │  (entities) │     │ (per-entity)│     │ (per-strat) │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                                                │
//!                     ┌─────────────┐     ┌─────────────┐
//!                     │ Sort + top_k│<────│  Combine    │
//!                     └─────────────┘     └─────────────┘
//! ```

pub mod bm25;
pub mod distance;
pub mod rerank;
pub mod scoring;

// Re-export main types for convenience
pub use bm25::BM25Index;
pub use distance::{
    jaccard_similarity, levenshtein_distance, levenshtein_similarity, term_cosine_similarity,
    tokenize,
};
pub use rerank::{
    HybridStrategy, RankedEntity, RerankConfig, RerankContext, RerankStrategy, ResultReranker,
    SemanticStrategy, StructuralStrategy, SubGraph, TextSimilarityStrategy,
};
pub use scoring::{
    combine, min_max_normalize, normalize, normalize_weights, reciprocal_rank_fusion, softmax,
    z_score_normalize, CombinationMethod, NormalizationMethod,
};

pub use fusegraph_core::cosine_similarity;
