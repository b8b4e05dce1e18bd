//! # fusegraph Fusion
//!
//! Cross-document knowledge fusion:
//!
//! - **Deduplication**: pairwise similarity → connected components → merge
//! - **Conflict resolution**: most complete, most recent, most confident, keep all
//! - **Provenance**: source attribution carried through merges
//! - **Entity linking**: match a new entity against the store
//! - **Alias index**: tenant-prefixed name lookup
//!
//! Every stage filters its inputs to the caller's tenant; entities owned by
//! another tenant are dropped with a warning rather than raising.

pub mod alias;
pub mod config;
pub mod conflict;
pub mod dedup;
pub mod linking;
pub mod pipeline;
pub mod provenance;
pub mod similarity;
pub mod union_find;

pub use alias::{AliasEntry, AliasIndex, MatchType};
pub use config::FusionConfig;
pub use conflict::{resolve_property_conflicts, ConflictStrategy, MergeOutcome};
pub use dedup::{DedupReport, EntityDeduplicator, MergeGroup};
pub use linking::{EntityLinker, LinkResult};
pub use pipeline::{FusionStats, KnowledgeFusionPipeline};
pub use provenance::{track_entity_provenance, ProvenanceRecord};
pub use similarity::EntitySimilarity;
pub use union_find::UnionFind;
