//! Reranking orchestrator
//!
//! Runs every configured strategy over the candidate set, optionally
//! normalizes each strategy's distribution, combines, sorts descending and
//! truncates to `top_k`.

use super::{RerankContext, RerankStrategy};
use crate::scoring::{combine, normalize, CombinationMethod, NormalizationMethod, DEFAULT_RRF_K};
use fusegraph_core::{Entity, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Result of reranking with per-strategy scores
#[derive(Debug, Clone)]
pub struct RankedEntity {
    pub entity: Entity,
    /// Combined score used for ordering
    pub score: f32,
    /// Per-strategy scores after normalization, keyed by strategy name
    pub strategy_scores: HashMap<String, f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    pub normalization: NormalizationMethod,
    pub combination: CombinationMethod,
    pub rrf_k: f32,
    pub top_k: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            normalization: NormalizationMethod::MinMax,
            combination: CombinationMethod::WeightedAverage,
            rrf_k: DEFAULT_RRF_K,
            top_k: 10,
        }
    }
}

#[derive(Debug)]
pub struct ResultReranker {
    strategies: Vec<Box<dyn RerankStrategy>>,
    weights: Option<Vec<f32>>,
    config: RerankConfig,
}

impl ResultReranker {
    /// Fails when `strategies` is empty or `weights` doesn't match it in length
    pub fn new(
        strategies: Vec<Box<dyn RerankStrategy>>,
        weights: Option<Vec<f32>>,
        config: RerankConfig,
    ) -> Result<Self> {
        if strategies.is_empty() {
            return Err(Error::InvalidConfig(
                "reranker needs at least one strategy".to_string(),
            ));
        }
        if let Some(weights) = &weights {
            if weights.len() != strategies.len() {
                return Err(Error::InvalidConfig(format!(
                    "{} weights given for {} strategies",
                    weights.len(),
                    strategies.len()
                )));
            }
            if weights.iter().any(|w| *w < 0.0 || !w.is_finite()) {
                return Err(Error::InvalidConfig(format!(
                    "strategy weights must be finite and non-negative, got {weights:?}"
                )));
            }
        }
        if config.rrf_k < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "rrf_k must be non-negative, got {}",
                config.rrf_k
            )));
        }
        Ok(Self {
            strategies,
            weights,
            config,
        })
    }

    pub fn config(&self) -> &RerankConfig {
        &self.config
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Rerank with the configured `top_k`
    pub fn rerank(
        &self,
        query: &str,
        entities: Vec<Entity>,
        context: &RerankContext,
    ) -> Vec<RankedEntity> {
        self.rerank_top_k(query, entities, context, self.config.top_k)
    }

    /// `top_k == 0` returns nothing; a `top_k` larger than the input returns all
    pub fn rerank_top_k(
        &self,
        query: &str,
        entities: Vec<Entity>,
        context: &RerankContext,
        top_k: usize,
    ) -> Vec<RankedEntity> {
        if top_k == 0 || entities.is_empty() {
            return Vec::new();
        }

        let per_strategy: Vec<Vec<f32>> = self
            .strategies
            .iter()
            .map(|strategy| {
                let raw = strategy.score(query, &entities, context);
                normalize(&raw, self.config.normalization)
            })
            .collect();

        let combined = combine(
            &per_strategy,
            entities.len(),
            self.weights.as_deref(),
            self.config.combination,
            self.config.rrf_k,
        );

        let mut results: Vec<RankedEntity> = entities
            .into_iter()
            .enumerate()
            .map(|(i, entity)| {
                let strategy_scores = self
                    .strategies
                    .iter()
                    .zip(&per_strategy)
                    .map(|(s, scores)| (s.name().to_string(), scores.get(i).copied().unwrap_or(0.0)))
                    .collect();
                RankedEntity {
                    entity,
                    score: combined[i],
                    strategy_scores,
                }
            })
            .collect();

        // Sort by score descending; stable so ties keep input order
        results.sort_by(|a, b| {
            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);

        debug!(
            strategies = self.strategies.len(),
            returned = results.len(),
            "reranked candidates"
        );
        results
    }
}
