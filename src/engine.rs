//! The engine facade: search, rerank, fuse and link over one store

use fusegraph_core::tenant::scope_label;
use fusegraph_core::{
    EngineMetrics, Entity, EntityId, Error, GraphStore, MetricsSnapshot, OperationBudget, Result,
    TenantContext, Vector,
};
use fusegraph_fusion::{AliasIndex, FusionConfig, FusionStats, KnowledgeFusionPipeline, LinkResult};
use fusegraph_resilience::{ResilienceConfig, ResilientGraphStore};
use fusegraph_search::{HybridSearchConfig, HybridSearchStrategy, ScoredEntity, SearchOutcome};
use fusegraph_similarity::{
    RankedEntity, RerankConfig, RerankContext, RerankStrategy, ResultReranker, SemanticStrategy,
    StructuralStrategy, SubGraph, TextSimilarityStrategy,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Everything tunable about a [`KnowledgeEngine`], loadable from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub search: HybridSearchConfig,
    pub rerank: RerankConfig,
    pub fusion: FusionConfig,
    pub resilience: ResilienceConfig,
    /// Rerank search results before returning them
    pub rerank_enabled: bool,
    /// Wall-clock limit for one search; partial results past it
    pub search_timeout_ms: Option<u64>,
    /// Wall-clock limit for one fusion run; fails past it
    pub fusion_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            search: HybridSearchConfig::default(),
            rerank: RerankConfig::default(),
            fusion: FusionConfig::default(),
            resilience: ResilienceConfig::default(),
            rerank_enabled: true,
            search_timeout_ms: Some(5_000),
            fusion_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        self.fusion.validate()?;
        self.resilience.validate()?;
        if !self.rerank.rrf_k.is_finite() || self.rerank.rrf_k < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "rerank.rrf_k must be finite and non-negative, got {}",
                self.rerank.rrf_k
            )));
        }
        Ok(())
    }

    fn budget(timeout_ms: Option<u64>) -> OperationBudget {
        match timeout_ms {
            Some(ms) => OperationBudget::with_timeout(Duration::from_millis(ms)),
            None => OperationBudget::unbounded(),
        }
    }
}

/// Text, semantic and structural strategies with uniform weights
pub fn default_strategies() -> Vec<Box<dyn RerankStrategy>> {
    vec![
        Box::new(TextSimilarityStrategy::default()),
        Box::new(SemanticStrategy::new()),
        Box::new(StructuralStrategy::default()),
    ]
}

pub struct KnowledgeEngine {
    store: Arc<dyn GraphStore>,
    config: EngineConfig,
    search: HybridSearchStrategy,
    reranker: Option<ResultReranker>,
    fusion: KnowledgeFusionPipeline,
    metrics: Arc<EngineMetrics>,
}

impl KnowledgeEngine {
    /// Wrap `store` in the resilience layer and wire every component to it
    pub fn new<S>(store: S, config: EngineConfig) -> Result<Self>
    where
        S: GraphStore + 'static,
    {
        config.validate()?;
        let metrics = Arc::new(EngineMetrics::new());
        let store: Arc<dyn GraphStore> = Arc::new(
            ResilientGraphStore::new(store, &config.resilience)?.with_metrics(Arc::clone(&metrics)),
        );

        let reranker = if config.rerank_enabled {
            Some(ResultReranker::new(
                default_strategies(),
                None,
                config.rerank.clone(),
            )?)
        } else {
            None
        };
        let fusion = KnowledgeFusionPipeline::new(Arc::clone(&store), config.fusion.clone())?
            .with_metrics(Arc::clone(&metrics));

        info!(
            mode = ?config.search.mode,
            rerank = config.rerank_enabled,
            "knowledge engine ready"
        );
        Ok(Self {
            search: HybridSearchStrategy::new(Arc::clone(&store)),
            store,
            config,
            reranker,
            fusion,
            metrics,
        })
    }

    /// Replace the default reranker
    #[must_use]
    pub fn with_reranker(mut self, reranker: ResultReranker) -> Self {
        self.reranker = Some(reranker);
        self
    }

    #[must_use]
    pub fn without_reranking(mut self) -> Self {
        self.reranker = None;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The resilient store every component talks to
    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    pub fn aliases(&self) -> &Arc<AliasIndex> {
        self.fusion.aliases()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Shared registry, for ingestion collaborators reporting extractions
    pub fn metrics_registry(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    /// Hybrid search followed by reranking, under the configured timeout.
    ///
    /// Never fails: store trouble yields fewer or no results and is counted
    /// as a failed query.
    pub async fn search(
        &self,
        query_text: &str,
        embedding: &Vector,
        seeds: Option<&[EntityId]>,
        ctx: Option<&TenantContext>,
    ) -> Vec<RankedEntity> {
        let budget = EngineConfig::budget(self.config.search_timeout_ms);
        self.search_with_budget(query_text, embedding, seeds, ctx, &budget)
            .await
    }

    pub async fn search_with_budget(
        &self,
        query_text: &str,
        embedding: &Vector,
        seeds: Option<&[EntityId]>,
        ctx: Option<&TenantContext>,
        budget: &OperationBudget,
    ) -> Vec<RankedEntity> {
        let started = Instant::now();
        let outcome: SearchOutcome = self
            .search
            .search_with_expansion(embedding, &self.config.search, seeds, ctx, budget)
            .await;
        if outcome.degraded {
            self.metrics.record_query_failure();
        }

        let results = match &self.reranker {
            Some(reranker) if !outcome.results.is_empty() => {
                let entities: Vec<Entity> =
                    outcome.results.into_iter().map(|r| r.entity).collect();
                let graph = SubGraph::load(self.store.as_ref(), &entities, ctx).await;
                let context = RerankContext::new()
                    .with_query_embedding(embedding.clone())
                    .with_graph(graph)
                    .with_tenant(ctx.cloned());
                reranker.rerank(query_text, entities, &context)
            }
            _ => outcome.results.into_iter().map(unranked).collect(),
        };

        let elapsed = started.elapsed();
        self.metrics.record_query(elapsed, results.len());
        debug!(
            tenant = scope_label(ctx),
            results = results.len(),
            partial = outcome.partial,
            elapsed_ms = elapsed.as_millis() as u64,
            "engine search"
        );
        results
    }

    /// Merge duplicate entities within the tenant scope
    pub async fn fuse(
        &self,
        entity_types: Option<&[String]>,
        ctx: Option<&TenantContext>,
    ) -> Result<FusionStats> {
        let budget = EngineConfig::budget(self.config.fusion_timeout_ms);
        self.fusion
            .fuse_cross_document_entities(entity_types, ctx, &budget)
            .await
    }

    pub async fn fuse_with_budget(
        &self,
        entity_types: Option<&[String]>,
        ctx: Option<&TenantContext>,
        budget: &OperationBudget,
    ) -> Result<FusionStats> {
        self.fusion
            .fuse_cross_document_entities(entity_types, ctx, budget)
            .await
    }

    pub async fn link(&self, entity: &Entity, ctx: Option<&TenantContext>) -> Result<LinkResult> {
        self.fusion.link_entity(entity, ctx).await
    }
}

/// Search result passed through without reranking
fn unranked(result: ScoredEntity) -> RankedEntity {
    let mut strategy_scores = HashMap::new();
    if let Some(v) = result.vector_score {
        strategy_scores.insert("vector".to_string(), v);
    }
    if let Some(g) = result.graph_score {
        strategy_scores.insert("graph".to_string(), g);
    }
    RankedEntity {
        entity: result.entity,
        score: result.score,
        strategy_scores,
    }
}
