use crate::conflict::ConflictStrategy;
use fusegraph_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Pairs scoring at or above this are merged; clamped into [0, 1]
    pub similarity_threshold: f32,
    /// Threshold for linking a single new entity to an existing one
    pub link_threshold: f32,
    pub conflict_strategy: ConflictStrategy,
    /// Weight of property agreement against embedding cosine
    pub property_weight: f32,
    pub embedding_weight: f32,
    /// Register merged ids and names as aliases of the merged entity
    pub register_aliases: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            link_threshold: 0.85,
            conflict_strategy: ConflictStrategy::MostComplete,
            property_weight: 0.6,
            embedding_weight: 0.4,
            register_aliases: true,
        }
    }
}

impl FusionConfig {
    pub fn with_threshold(threshold: f32) -> Self {
        Self {
            similarity_threshold: clamp_unit(threshold),
            link_threshold: clamp_unit(threshold),
            ..Self::default()
        }
    }

    /// Copy with both thresholds clamped into [0, 1]
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        let clamped = clamp_unit(self.similarity_threshold);
        if clamped != self.similarity_threshold {
            warn!(
                requested = self.similarity_threshold,
                clamped, "fusion similarity threshold clamped"
            );
        }
        self.similarity_threshold = clamped;
        self.link_threshold = clamp_unit(self.link_threshold);
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (label, weight) in [
            ("property_weight", self.property_weight),
            ("embedding_weight", self.embedding_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{label} must be finite and non-negative, got {weight}"
                )));
            }
        }
        if self.property_weight + self.embedding_weight <= 0.0 {
            return Err(Error::InvalidConfig(
                "property_weight and embedding_weight cannot both be zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}
