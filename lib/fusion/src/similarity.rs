//! Pairwise entity similarity for deduplication and linking

use fusegraph_core::{cosine_similarity, Entity, NAME_KEY};
use fusegraph_similarity::{jaccard_similarity, levenshtein_similarity};
use serde_json::Value;

/// Share of the property score given to the name when other properties overlap
const NAME_SHARE: f32 = 0.7;

#[derive(Debug, Clone, Copy)]
pub struct EntitySimilarity {
    property_weight: f32,
    embedding_weight: f32,
}

impl Default for EntitySimilarity {
    fn default() -> Self {
        Self::new(0.6, 0.4)
    }
}

impl EntitySimilarity {
    pub fn new(property_weight: f32, embedding_weight: f32) -> Self {
        Self {
            property_weight: property_weight.max(0.0),
            embedding_weight: embedding_weight.max(0.0),
        }
    }

    /// Similarity in [0, 1]. Entities of different types never match.
    ///
    /// Embedding cosine only contributes when both sides carry a non-zero
    /// embedding; otherwise the property score stands alone.
    pub fn score(&self, a: &Entity, b: &Entity) -> f32 {
        if a.entity_type != b.entity_type {
            return 0.0;
        }
        let property = property_similarity(a, b);
        let embedding = match (&a.embedding, &b.embedding) {
            (Some(ea), Some(eb)) if !ea.is_zero() && !eb.is_zero() && ea.dim() == eb.dim() => {
                Some(cosine_similarity(ea.as_slice(), eb.as_slice()).max(0.0))
            }
            _ => None,
        };

        match embedding {
            Some(embedding) => {
                let total = self.property_weight + self.embedding_weight;
                if total <= 0.0 {
                    return property;
                }
                (self.property_weight * property + self.embedding_weight * embedding) / total
            }
            None => property,
        }
    }
}

/// Name closeness blended with agreement on the other shared user properties
pub fn property_similarity(a: &Entity, b: &Entity) -> f32 {
    let name = match (a.name(), b.name()) {
        (Some(na), Some(nb)) => Some(name_similarity(na, nb)),
        _ => None,
    };

    let mut shared = 0usize;
    let mut agreeing = 0usize;
    for (key, value) in a.user_properties() {
        if key == NAME_KEY {
            continue;
        }
        if let Some(other) = b.properties.get(key) {
            shared += 1;
            if values_agree(value, other) {
                agreeing += 1;
            }
        }
    }
    let agreement = (shared > 0).then(|| agreeing as f32 / shared as f32);

    match (name, agreement) {
        (Some(name), Some(agreement)) => NAME_SHARE * name + (1.0 - NAME_SHARE) * agreement,
        (Some(name), None) => name,
        (None, Some(agreement)) => agreement,
        (None, None) => 0.0,
    }
}

/// Best of edit-distance and token-overlap similarity, case-insensitive
pub fn name_similarity(a: &str, b: &str) -> f32 {
    let (a, b) = (a.trim(), b.trim());
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    levenshtein_similarity(a, b).max(jaccard_similarity(a, b))
}

fn values_agree(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.trim().eq_ignore_ascii_case(y.trim()),
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}
