use super::{
    validate_weight_sum, RerankContext, RerankStrategy, SemanticStrategy, StructuralStrategy,
    TextSimilarityStrategy,
};
use fusegraph_core::{Entity, Result};

/// Convex combination of text, semantic and structural scores
#[derive(Debug, Clone)]
pub struct HybridStrategy {
    text_weight: f32,
    semantic_weight: f32,
    structural_weight: f32,
    text: TextSimilarityStrategy,
    semantic: SemanticStrategy,
    structural: StructuralStrategy,
}

impl HybridStrategy {
    pub fn new(text_weight: f32, semantic_weight: f32, structural_weight: f32) -> Result<Self> {
        validate_weight_sum("hybrid", &[text_weight, semantic_weight, structural_weight])?;
        Ok(Self {
            text_weight,
            semantic_weight,
            structural_weight,
            text: TextSimilarityStrategy::default(),
            semantic: SemanticStrategy,
            structural: StructuralStrategy::default(),
        })
    }

    #[must_use]
    pub fn with_text(mut self, text: TextSimilarityStrategy) -> Self {
        self.text = text;
        self
    }

    #[must_use]
    pub fn with_structural(mut self, structural: StructuralStrategy) -> Self {
        self.structural = structural;
        self
    }

    pub fn weights(&self) -> (f32, f32, f32) {
        (self.text_weight, self.semantic_weight, self.structural_weight)
    }
}

impl RerankStrategy for HybridStrategy {
    fn name(&self) -> &str {
        "hybrid"
    }

    fn score(&self, query: &str, entities: &[Entity], context: &RerankContext) -> Vec<f32> {
        let mut combined = vec![0.0f32; entities.len()];
        let parts: [(&dyn RerankStrategy, f32); 3] = [
            (&self.text, self.text_weight),
            (&self.semantic, self.semantic_weight),
            (&self.structural, self.structural_weight),
        ];
        for (strategy, weight) in parts {
            if weight <= 0.0 {
                continue;
            }
            for (slot, score) in combined.iter_mut().zip(strategy.score(query, entities, context)) {
                *slot += weight * score;
            }
        }
        combined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusegraph_core::Vector;

    #[test]
    fn test_construction_requires_unit_sum() {
        for (t, s, g) in [(0.5, 0.5, 0.5), (0.1, 0.1, 0.1), (1.0, 0.5, -0.5), (0.0, 0.0, 0.0)] {
            assert!(HybridStrategy::new(t, s, g).is_err(), "accepted {t} {s} {g}");
        }
        assert!(HybridStrategy::new(0.4, 0.4, 0.2).is_ok());
    }

    #[test]
    fn test_pure_semantic_matches_semantic_strategy() {
        let hybrid = HybridStrategy::new(0.0, 1.0, 0.0).unwrap();
        let entities = vec![
            Entity::new("1", "T").with_embedding(vec![1.0, 0.0]),
            Entity::new("2", "T").with_embedding(vec![0.0, 1.0]),
        ];
        let ctx = RerankContext::new().with_query_embedding(Vector::new(vec![1.0, 0.0]));
        assert_eq!(
            hybrid.score("q", &entities, &ctx),
            SemanticStrategy.score("q", &entities, &ctx)
        );
    }

    #[test]
    fn test_blend_favours_text_and_vector_match() {
        let hybrid = HybridStrategy::new(0.5, 0.5, 0.0).unwrap();
        let entities = vec![
            Entity::new("1", "T")
                .with_property("name", "graph engine")
                .with_embedding(vec![1.0, 0.0]),
            Entity::new("2", "T")
                .with_property("name", "bread recipe")
                .with_embedding(vec![0.0, 1.0]),
        ];
        let ctx = RerankContext::new().with_query_embedding(Vector::new(vec![1.0, 0.0]));
        let scores = hybrid.score("graph", &entities, &ctx);
        assert!(scores[0] > scores[1]);
    }
}
