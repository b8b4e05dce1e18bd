//! Hybrid vector/graph retrieval

use crate::config::{HybridSearchConfig, SearchMode};
use crate::expansion::{expand, hop_score, GraphExpansion};
use ahash::AHashMap;
use fusegraph_core::tenant::{is_visible, scope_label};
use fusegraph_core::{Entity, EntityId, GraphStore, OperationBudget, Path, TenantContext, Vector};
use std::sync::Arc;
use tracing::{debug, warn};

/// One retrieved entity with its score breakdown
#[derive(Debug, Clone)]
pub struct ScoredEntity {
    pub entity: Entity,
    pub score: f32,
    pub vector_score: Option<f32>,
    pub graph_score: Option<f32>,
    /// Hops from the nearest seed, when reached by expansion
    pub depth: Option<usize>,
}

/// Ranked results plus what happened while producing them
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub results: Vec<ScoredEntity>,
    /// Seed-to-result paths; `None` when fewer than two results or path
    /// tracking/expansion is off
    pub paths: Option<Vec<Path>>,
    /// A store call failed and its contribution was dropped
    pub degraded: bool,
    /// The budget ran out; results are partial
    pub partial: bool,
}

/// Per-entity `vector_weight * v + graph_weight * g` with the weights
/// renormalized to sum to 1. Missing branch scores count as 0; two zero
/// weights give every entity 0.
pub fn combine_scores(
    vector_scores: &AHashMap<EntityId, f32>,
    graph_scores: &AHashMap<EntityId, f32>,
    vector_weight: f32,
    graph_weight: f32,
) -> AHashMap<EntityId, f32> {
    let total = vector_weight + graph_weight;
    let (vw, gw) = if total > 0.0 {
        (vector_weight / total, graph_weight / total)
    } else {
        (0.0, 0.0)
    };

    let mut combined: AHashMap<EntityId, f32> = AHashMap::new();
    for (id, score) in vector_scores {
        *combined.entry(id.clone()).or_insert(0.0) += vw * score;
    }
    for (id, score) in graph_scores {
        *combined.entry(id.clone()).or_insert(0.0) += gw * score;
    }
    combined
}

pub struct HybridSearchStrategy {
    store: Arc<dyn GraphStore>,
}

impl HybridSearchStrategy {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Ranked `(entity, score)` results, best first, at most `max_results`
    pub async fn search(
        &self,
        query: &Vector,
        config: &HybridSearchConfig,
        seeds: Option<&[EntityId]>,
        ctx: Option<&TenantContext>,
        budget: &OperationBudget,
    ) -> Vec<ScoredEntity> {
        self.run(query, config, seeds, ctx, budget).await.0.results
    }

    /// Like [`search`](Self::search), also reconstructing the paths that
    /// connect expansion seeds to the results they reached.
    pub async fn search_with_expansion(
        &self,
        query: &Vector,
        config: &HybridSearchConfig,
        seeds: Option<&[EntityId]>,
        ctx: Option<&TenantContext>,
        budget: &OperationBudget,
    ) -> SearchOutcome {
        let (mut outcome, expansion) = self.run(query, config, seeds, ctx, budget).await;
        let paths_possible = config.track_paths
            && config.mode != SearchMode::VectorOnly
            && (config.mode == SearchMode::GraphOnly || config.expand_results);
        if paths_possible && outcome.results.len() >= 2 {
            if let Some(expansion) = expansion {
                let paths = outcome
                    .results
                    .iter()
                    .filter(|r| r.depth.is_some_and(|d| d > 0))
                    .filter_map(|r| expansion.path_to(&r.entity.id))
                    .collect();
                outcome.paths = Some(paths);
            }
        }
        outcome
    }

    async fn run(
        &self,
        query: &Vector,
        config: &HybridSearchConfig,
        seeds: Option<&[EntityId]>,
        ctx: Option<&TenantContext>,
        budget: &OperationBudget,
    ) -> (SearchOutcome, Option<GraphExpansion>) {
        let mut outcome = SearchOutcome::default();
        if config.max_results == 0 {
            return (outcome, None);
        }
        if budget.is_exhausted() {
            outcome.partial = true;
            return (outcome, None);
        }

        let (results, expansion) = match config.mode {
            SearchMode::VectorOnly => {
                let hits = self
                    .vector_hits(query, config.max_results, config, ctx, &mut outcome)
                    .await;
                let results = hits
                    .into_iter()
                    .map(|(entity, score)| ScoredEntity {
                        entity,
                        score,
                        vector_score: Some(score),
                        graph_score: None,
                        depth: None,
                    })
                    .collect();
                (results, None)
            }
            SearchMode::GraphOnly => {
                let seeds = self
                    .resolve_seeds(query, config, seeds, ctx, &mut outcome)
                    .await;
                let expansion = self
                    .expand(&seeds, config, ctx, budget, &mut outcome)
                    .await;
                let results = expansion
                    .iter()
                    .map(|d| ScoredEntity {
                        entity: d.entity.clone(),
                        score: hop_score(d.depth),
                        vector_score: None,
                        graph_score: Some(hop_score(d.depth)),
                        depth: Some(d.depth),
                    })
                    .collect();
                (results, Some(expansion))
            }
            SearchMode::Hybrid => self.hybrid(query, config, seeds, ctx, budget, &mut outcome).await,
        };

        outcome.results = finalize(results, config, ctx);
        debug!(
            mode = ?config.mode,
            tenant = scope_label(ctx),
            results = outcome.results.len(),
            degraded = outcome.degraded,
            partial = outcome.partial,
            "search complete"
        );
        (outcome, expansion)
    }

    async fn hybrid(
        &self,
        query: &Vector,
        config: &HybridSearchConfig,
        seeds: Option<&[EntityId]>,
        ctx: Option<&TenantContext>,
        budget: &OperationBudget,
        outcome: &mut SearchOutcome,
    ) -> (Vec<ScoredEntity>, Option<GraphExpansion>) {
        let hits = self
            .vector_hits(query, config.max_results, config, ctx, outcome)
            .await;

        let mut entities: AHashMap<EntityId, Entity> = AHashMap::new();
        let mut vector_scores: AHashMap<EntityId, f32> = AHashMap::new();
        let mut hit_order: Vec<EntityId> = Vec::with_capacity(hits.len());
        for (entity, score) in hits {
            vector_scores.insert(entity.id.clone(), score);
            hit_order.push(entity.id.clone());
            entities.insert(entity.id.clone(), entity);
        }

        if !config.expand_results {
            let results = hit_order
                .into_iter()
                .filter_map(|id| {
                    let score = vector_scores.get(&id).copied()?;
                    Some(ScoredEntity {
                        entity: entities.remove(&id)?,
                        score,
                        vector_score: Some(score),
                        graph_score: None,
                        depth: None,
                    })
                })
                .filter(|r| r.score >= config.min_combined_score)
                .collect();
            return (results, None);
        }

        let seeds: Vec<EntityId> = match seeds {
            Some(seeds) if !seeds.is_empty() => seeds.to_vec(),
            _ => hit_order.iter().take(config.seed_count).cloned().collect(),
        };
        let expansion = if budget.is_exhausted() {
            outcome.partial = true;
            GraphExpansion::default()
        } else {
            self.expand(&seeds, config, ctx, budget, outcome).await
        };
        let graph_scores = expansion.scores();
        let combined = combine_scores(
            &vector_scores,
            &graph_scores,
            config.vector_weight,
            config.graph_weight,
        );

        // Vector hits first, then expansion order, so ties stay deterministic
        let mut order = hit_order;
        order.extend(
            expansion
                .iter()
                .map(|d| d.entity.id.clone())
                .filter(|id| !vector_scores.contains_key(id)),
        );
        let results = order
            .into_iter()
            .filter_map(|id| {
                let discovered = expansion.get(&id);
                let entity = entities
                    .remove(&id)
                    .or_else(|| discovered.map(|d| d.entity.clone()))?;
                Some(ScoredEntity {
                    score: combined.get(&id).copied().unwrap_or(0.0),
                    vector_score: vector_scores.get(&id).copied(),
                    graph_score: graph_scores.get(&id).copied(),
                    depth: discovered.map(|d| d.depth),
                    entity,
                })
            })
            .filter(|r| r.score >= config.min_combined_score)
            .collect();
        (results, Some(expansion))
    }

    /// Caller seeds when given, otherwise the top vector hits
    async fn resolve_seeds(
        &self,
        query: &Vector,
        config: &HybridSearchConfig,
        seeds: Option<&[EntityId]>,
        ctx: Option<&TenantContext>,
        outcome: &mut SearchOutcome,
    ) -> Vec<EntityId> {
        match seeds {
            Some(seeds) if !seeds.is_empty() => seeds.to_vec(),
            _ => self
                .vector_hits(query, config.seed_count, config, ctx, outcome)
                .await
                .into_iter()
                .map(|(entity, _)| entity.id)
                .collect(),
        }
    }

    async fn vector_hits(
        &self,
        query: &Vector,
        k: usize,
        config: &HybridSearchConfig,
        ctx: Option<&TenantContext>,
        outcome: &mut SearchOutcome,
    ) -> Vec<(Entity, f32)> {
        if k == 0 || query.is_empty() {
            return Vec::new();
        }
        match self
            .store
            .vector_search(
                query,
                k,
                config.entity_type_filter.as_deref(),
                config.similarity_threshold,
                ctx,
            )
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!(tenant = scope_label(ctx), error = %e, "vector search failed");
                outcome.degraded = true;
                Vec::new()
            }
        }
    }

    async fn expand(
        &self,
        seeds: &[EntityId],
        config: &HybridSearchConfig,
        ctx: Option<&TenantContext>,
        budget: &OperationBudget,
        outcome: &mut SearchOutcome,
    ) -> GraphExpansion {
        let expansion = expand(
            self.store.as_ref(),
            seeds,
            config.max_graph_depth,
            ctx,
            budget,
        )
        .await;
        outcome.degraded |= expansion.degraded;
        outcome.partial |= expansion.truncated;
        expansion
    }
}

/// Drop foreign-tenant leftovers, sort best first and cap at `max_results`.
fn finalize(
    mut results: Vec<ScoredEntity>,
    config: &HybridSearchConfig,
    ctx: Option<&TenantContext>,
) -> Vec<ScoredEntity> {
    let before = results.len();
    results.retain(|r| is_visible(ctx, r.entity.tenant_id.as_deref()));
    if results.len() < before {
        warn!(
            tenant = scope_label(ctx),
            dropped = before - results.len(),
            "filtered foreign-tenant search results"
        );
    }
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(config.max_results);
    results
}
