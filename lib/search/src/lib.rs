//! # fusegraph Search
//!
//! Hybrid retrieval over a [`GraphStore`](fusegraph_core::GraphStore):
//!
//! - **Vector only**: nearest entities by embedding similarity
//! - **Graph only**: breadth-first expansion from seeds, scored by hop distance
//! - **Hybrid**: both branches, combined with renormalized weights
//!
//! Store failures never surface as errors here; the affected branch is
//! dropped, logged and flagged on the [`SearchOutcome`].

pub mod config;
pub mod expansion;
pub mod strategy;

pub use config::{HybridSearchConfig, SearchMode};
pub use expansion::{expand, hop_score, GraphExpansion};
pub use strategy::{combine_scores, HybridSearchStrategy, ScoredEntity, SearchOutcome};
