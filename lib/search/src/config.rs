use fusegraph_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Which retrieval branches a search runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    VectorOnly,
    GraphOnly,
    #[default]
    Hybrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridSearchConfig {
    pub mode: SearchMode,
    pub max_results: usize,
    /// Hops from the nearest seed; 0 returns only the seeds
    pub max_graph_depth: usize,
    pub vector_weight: f32,
    pub graph_weight: f32,
    pub min_combined_score: f32,
    pub similarity_threshold: Option<f32>,
    pub entity_type_filter: Option<String>,
    /// Hybrid mode only: run the graph expansion pass at all
    pub expand_results: bool,
    /// Reconstruct seed-to-result paths in `search_with_expansion`
    pub track_paths: bool,
    /// How many vector hits become expansion seeds when none are given
    pub seed_count: usize,
}

impl Default for HybridSearchConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::Hybrid,
            max_results: 10,
            max_graph_depth: 2,
            vector_weight: 0.6,
            graph_weight: 0.4,
            min_combined_score: 0.0,
            similarity_threshold: None,
            entity_type_filter: None,
            expand_results: true,
            track_paths: true,
            seed_count: 3,
        }
    }
}

impl HybridSearchConfig {
    pub fn vector_only() -> Self {
        Self {
            mode: SearchMode::VectorOnly,
            ..Self::default()
        }
    }

    pub fn graph_only(max_graph_depth: usize) -> Self {
        Self {
            mode: SearchMode::GraphOnly,
            max_graph_depth,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (label, weight) in [
            ("vector_weight", self.vector_weight),
            ("graph_weight", self.graph_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{label} must be finite and non-negative, got {weight}"
                )));
            }
        }
        if let Some(threshold) = self.similarity_threshold {
            if !(-1.0..=1.0).contains(&threshold) {
                return Err(Error::InvalidConfig(format!(
                    "similarity_threshold must lie in [-1, 1], got {threshold}"
                )));
            }
        }
        Ok(())
    }
}
