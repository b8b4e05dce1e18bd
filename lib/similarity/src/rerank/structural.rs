use super::{validate_weight_sum, RerankContext, RerankStrategy, SubGraph};
use ahash::AHashMap;
use fusegraph_core::{Entity, Result};

pub const DEFAULT_DAMPING: f32 = 0.85;
const DEFAULT_ITERATIONS: usize = 50;
const DEFAULT_TOLERANCE: f32 = 1e-6;

/// Graph centrality over the tenant-visible subgraph: weighted PageRank
/// blended with normalized degree. Both components are scaled to [0, 1].
#[derive(Debug, Clone)]
pub struct StructuralStrategy {
    pagerank_weight: f32,
    degree_weight: f32,
    damping: f32,
    max_iterations: usize,
    tolerance: f32,
}

impl StructuralStrategy {
    pub fn new(pagerank_weight: f32, degree_weight: f32) -> Result<Self> {
        validate_weight_sum("structural", &[pagerank_weight, degree_weight])?;
        Ok(Self {
            pagerank_weight,
            degree_weight,
            damping: DEFAULT_DAMPING,
            max_iterations: DEFAULT_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        })
    }

    #[must_use]
    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn with_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Weighted PageRank scaled so the best node scores 1.0.
    ///
    /// An empty graph is its own uniform stationary distribution.
    pub fn pagerank(&self, graph: &SubGraph) -> AHashMap<String, f32> {
        let mut ids: Vec<&String> = graph.nodes().collect();
        ids.sort();
        let n = ids.len();
        if n == 0 {
            return AHashMap::new();
        }
        let index: AHashMap<&str, usize> =
            ids.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();

        let mut out_weight = vec![0.0f32; n];
        let mut incoming: Vec<Vec<(usize, f32)>> = vec![Vec::new(); n];
        for (source, target, weight) in graph.edges() {
            let (Some(&s), Some(&t)) = (index.get(source.as_str()), index.get(target.as_str()))
            else {
                continue;
            };
            out_weight[s] += weight;
            incoming[t].push((s, *weight));
        }

        let base = (1.0 - self.damping) / n as f32;
        let mut rank = vec![1.0 / n as f32; n];
        for _ in 0..self.max_iterations {
            // Mass from dangling nodes is spread uniformly
            let dangling: f32 = (0..n)
                .filter(|&i| out_weight[i] <= 0.0)
                .map(|i| rank[i])
                .sum();
            let mut next = vec![base + self.damping * dangling / n as f32; n];
            for (t, sources) in incoming.iter().enumerate() {
                for &(s, weight) in sources {
                    next[t] += self.damping * rank[s] * weight / out_weight[s];
                }
            }
            let delta: f32 = next.iter().zip(&rank).map(|(a, b)| (a - b).abs()).sum();
            rank = next;
            if delta < self.tolerance {
                break;
            }
        }

        let max = rank.iter().copied().fold(0.0f32, f32::max);
        ids.into_iter()
            .zip(rank)
            .map(|(id, r)| (id.clone(), if max > 0.0 { r / max } else { 0.0 }))
            .collect()
    }

    /// Degree divided by the maximum degree in the graph
    pub fn normalized_degree(&self, graph: &SubGraph) -> AHashMap<String, f32> {
        let degrees = graph.degrees();
        let max = degrees.values().copied().max().unwrap_or(0);
        degrees
            .into_iter()
            .map(|(id, d)| {
                let score = if max == 0 { 0.0 } else { d as f32 / max as f32 };
                (id.to_string(), score)
            })
            .collect()
    }
}

impl Default for StructuralStrategy {
    fn default() -> Self {
        Self {
            pagerank_weight: 0.5,
            degree_weight: 0.5,
            damping: DEFAULT_DAMPING,
            max_iterations: DEFAULT_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl RerankStrategy for StructuralStrategy {
    fn name(&self) -> &str {
        "structural"
    }

    fn score(&self, _query: &str, entities: &[Entity], context: &RerankContext) -> Vec<f32> {
        if entities.is_empty() {
            return Vec::new();
        }

        // Without a loaded graph every candidate is an isolated node
        let mut graph = context.graph.clone().unwrap_or_default();
        for entity in entities {
            graph.add_node(entity.id.clone());
        }

        let pagerank = self.pagerank(&graph);
        let degree = self.normalized_degree(&graph);
        entities
            .iter()
            .map(|e| {
                let pr = pagerank.get(&e.id).copied().unwrap_or(0.0);
                let deg = degree.get(&e.id).copied().unwrap_or(0.0);
                (self.pagerank_weight * pr + self.degree_weight * deg).max(0.0)
            })
            .collect()
    }
}
