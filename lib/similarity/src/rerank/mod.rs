//! Result reranking
//!
//! A [`RerankStrategy`] assigns one score per candidate entity, in input
//! order. [`ResultReranker`] runs several strategies, normalizes and combines
//! their scores, then sorts and truncates.
//!
//! Scoring is synchronous and pure. Anything that needs the graph store
//! (the structural strategy's subgraph) is fetched up front into a
//! [`RerankContext`] via [`SubGraph::load`].

mod hybrid;
mod reranker;
mod semantic;
mod structural;
mod text;

pub use hybrid::HybridStrategy;
pub use reranker::{RankedEntity, RerankConfig, ResultReranker};
pub use semantic::SemanticStrategy;
pub use structural::{StructuralStrategy, DEFAULT_DAMPING};
pub use text::TextSimilarityStrategy;

use ahash::{AHashMap, AHashSet};
use fusegraph_core::tenant::is_visible;
use fusegraph_core::{Entity, EntityId, GraphStore, Relation, TenantContext, Vector};
use std::fmt;
use tracing::warn;

/// Tolerance used when validating that configured weights sum to 1.0
pub const WEIGHT_TOLERANCE: f32 = 1e-3;

pub trait RerankStrategy: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// One score per entity, same order as `entities`
    fn score(&self, query: &str, entities: &[Entity], context: &RerankContext) -> Vec<f32>;
}

/// Inputs shared by all strategies for one rerank call
#[derive(Debug, Clone, Default)]
pub struct RerankContext {
    pub query_embedding: Option<Vector>,
    pub graph: Option<SubGraph>,
    pub tenant: Option<TenantContext>,
}

impl RerankContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_query_embedding(mut self, embedding: Vector) -> Self {
        self.query_embedding = Some(embedding);
        self
    }

    #[must_use]
    pub fn with_graph(mut self, graph: SubGraph) -> Self {
        self.graph = Some(graph);
        self
    }

    #[must_use]
    pub fn with_tenant(mut self, tenant: Option<TenantContext>) -> Self {
        self.tenant = tenant;
        self
    }
}

/// Directed weighted edges around a candidate set
#[derive(Debug, Clone, Default)]
pub struct SubGraph {
    nodes: AHashSet<EntityId>,
    edges: Vec<(EntityId, EntityId, f32)>,
}

impl SubGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: impl Into<EntityId>) {
        self.nodes.insert(id.into());
    }

    pub fn add_edge(&mut self, source: impl Into<EntityId>, target: impl Into<EntityId>, weight: f32) {
        let (source, target) = (source.into(), target.into());
        self.nodes.insert(source.clone());
        self.nodes.insert(target.clone());
        self.edges.push((source, target, weight.max(0.0)));
    }

    pub fn from_relations<'a>(relations: impl IntoIterator<Item = &'a Relation>) -> Self {
        let mut graph = Self::new();
        for relation in relations {
            graph.add_edge(
                relation.source_id.clone(),
                relation.target_id.clone(),
                relation.weight,
            );
        }
        graph
    }

    pub fn nodes(&self) -> impl Iterator<Item = &EntityId> {
        self.nodes.iter()
    }

    pub fn edges(&self) -> &[(EntityId, EntityId, f32)] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Undirected degree per node
    pub fn degrees(&self) -> AHashMap<&str, usize> {
        let mut degrees: AHashMap<&str, usize> =
            self.nodes.iter().map(|n| (n.as_str(), 0)).collect();
        for (source, target, _) in &self.edges {
            *degrees.entry(source.as_str()).or_insert(0) += 1;
            *degrees.entry(target.as_str()).or_insert(0) += 1;
        }
        degrees
    }

    /// Fetch the one-hop neighbourhood of `entities` under `ctx`.
    ///
    /// Store failures for a single entity are logged and skipped; the
    /// subgraph is a best-effort scoring input.
    pub async fn load<S: GraphStore + ?Sized>(
        store: &S,
        entities: &[Entity],
        ctx: Option<&TenantContext>,
    ) -> Self {
        let mut graph = Self::new();
        let mut seen_relations: AHashSet<String> = AHashSet::new();
        for entity in entities {
            graph.add_node(entity.id.clone());
            let neighbors = match store.neighbors(&entity.id, ctx).await {
                Ok(neighbors) => neighbors,
                Err(e) => {
                    warn!(entity = %entity.id, error = %e, "subgraph neighbour lookup failed");
                    continue;
                }
            };
            for (relation, other) in neighbors {
                if !is_visible(ctx, other.tenant_id.as_deref())
                    || !is_visible(ctx, relation.tenant_id.as_deref())
                {
                    continue;
                }
                if seen_relations.insert(relation.id.clone()) {
                    graph.add_edge(relation.source_id, relation.target_id, relation.weight);
                }
            }
        }
        graph
    }
}

pub(crate) fn validate_weight_sum(label: &str, weights: &[f32]) -> fusegraph_core::Result<()> {
    if weights.iter().any(|w| *w < 0.0 || !w.is_finite()) {
        return Err(fusegraph_core::Error::InvalidConfig(format!(
            "{label} weights must be finite and non-negative, got {weights:?}"
        )));
    }
    let sum: f32 = weights.iter().sum();
    if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
        return Err(fusegraph_core::Error::InvalidConfig(format!(
            "{label} weights must sum to 1.0, got {sum}"
        )));
    }
    Ok(())
}
