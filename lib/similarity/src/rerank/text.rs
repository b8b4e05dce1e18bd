use super::{validate_weight_sum, RerankContext, RerankStrategy};
use crate::bm25::{BM25Index, DEFAULT_B, DEFAULT_K1};
use crate::distance::jaccard_similarity;
use crate::scoring::min_max_normalize;
use fusegraph_core::{Entity, Result};

/// Lexical relevance: BM25 over the candidate set blended with token Jaccard.
#[derive(Debug, Clone)]
pub struct TextSimilarityStrategy {
    property_keys: Vec<String>,
    bm25_weight: f32,
    jaccard_weight: f32,
    k1: f32,
    b: f32,
}

impl TextSimilarityStrategy {
    /// `property_keys` selects the text fields; empty means all user properties.
    pub fn new(property_keys: Vec<String>, bm25_weight: f32, jaccard_weight: f32) -> Result<Self> {
        validate_weight_sum("text similarity", &[bm25_weight, jaccard_weight])?;
        Ok(Self {
            property_keys,
            bm25_weight,
            jaccard_weight,
            k1: DEFAULT_K1,
            b: DEFAULT_B,
        })
    }

    #[must_use]
    pub fn with_bm25_params(mut self, k1: f32, b: f32) -> Self {
        self.k1 = k1;
        self.b = b;
        self
    }

    pub fn property_keys(&self) -> &[String] {
        &self.property_keys
    }
}

impl Default for TextSimilarityStrategy {
    fn default() -> Self {
        Self {
            property_keys: Vec::new(),
            bm25_weight: 0.5,
            jaccard_weight: 0.5,
            k1: DEFAULT_K1,
            b: DEFAULT_B,
        }
    }
}

impl RerankStrategy for TextSimilarityStrategy {
    fn name(&self) -> &str {
        "text"
    }

    fn score(&self, query: &str, entities: &[Entity], _context: &RerankContext) -> Vec<f32> {
        if entities.is_empty() {
            return Vec::new();
        }
        if query.trim().is_empty() {
            return vec![0.0; entities.len()];
        }

        let texts: Vec<String> = entities
            .iter()
            .map(|e| e.text_of(&self.property_keys))
            .collect();

        let bm25 = if self.bm25_weight > 0.0 {
            let raw = BM25Index::with_params(&texts, self.k1, self.b).score_all(query);
            // BM25 is unbounded; scale into [0, 1] but keep all-zero as zero
            if raw.iter().all(|s| *s <= 0.0) {
                raw
            } else {
                min_max_normalize(&raw)
            }
        } else {
            vec![0.0; texts.len()]
        };

        texts
            .iter()
            .zip(bm25)
            .map(|(text, bm25_score)| {
                let jaccard = if self.jaccard_weight > 0.0 {
                    jaccard_similarity(query, text)
                } else {
                    0.0
                };
                self.bm25_weight * bm25_score + self.jaccard_weight * jaccard
            })
            .collect()
    }
}
