use super::{RerankContext, RerankStrategy};
use fusegraph_core::Entity;

/// Cosine similarity between the query embedding and each entity embedding.
///
/// Entities without an embedding, or a missing/zero query embedding, score 0.0.
#[derive(Debug, Clone, Default)]
pub struct SemanticStrategy;

impl SemanticStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl RerankStrategy for SemanticStrategy {
    fn name(&self) -> &str {
        "semantic"
    }

    fn score(&self, _query: &str, entities: &[Entity], context: &RerankContext) -> Vec<f32> {
        let Some(query) = context.query_embedding.as_ref().filter(|q| !q.is_zero()) else {
            return vec![0.0; entities.len()];
        };
        entities
            .iter()
            .map(|e| {
                e.embedding
                    .as_ref()
                    .map_or(0.0, |embedding| embedding.cosine_similarity(query))
            })
            .collect()
    }
}
