//! Depth-bounded breadth-first expansion from seed entities

use ahash::AHashMap;
use fusegraph_core::tenant::{is_visible, scope_label};
use fusegraph_core::{Entity, EntityId, GraphStore, OperationBudget, Path, Relation, TenantContext};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Score of an entity `depth` hops from its nearest seed
#[inline]
pub fn hop_score(depth: usize) -> f32 {
    1.0 / (1.0 + depth as f32)
}

#[derive(Debug, Clone)]
pub struct Discovered {
    pub entity: Entity,
    pub depth: usize,
    /// Previous entity and the relation used to reach this one; `None` for seeds
    pub parent: Option<(EntityId, Relation)>,
}

/// Result of one expansion run, in discovery order
#[derive(Debug, Default)]
pub struct GraphExpansion {
    nodes: AHashMap<EntityId, Discovered>,
    order: Vec<EntityId>,
    /// At least one store call failed and was skipped
    pub degraded: bool,
    /// The budget ran out before the frontier was exhausted
    pub truncated: bool,
}

impl GraphExpansion {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Discovered> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Discovered entities in BFS order
    pub fn iter(&self) -> impl Iterator<Item = &Discovered> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn scores(&self) -> AHashMap<EntityId, f32> {
        self.iter()
            .map(|d| (d.entity.id.clone(), hop_score(d.depth)))
            .collect()
    }

    /// Path from the seed that discovered `id` to `id`, following parent pointers
    pub fn path_to(&self, id: &str) -> Option<Path> {
        let mut chain: Vec<&Discovered> = Vec::new();
        let mut current = self.nodes.get(id)?;
        loop {
            chain.push(current);
            match &current.parent {
                Some((parent_id, _)) => current = self.nodes.get(parent_id)?,
                None => break,
            }
        }
        chain.reverse();

        let mut hops = chain.into_iter();
        let mut path = Path::start(hops.next()?.entity.clone());
        for node in hops {
            let (_, relation) = node.parent.as_ref()?;
            path = path.extended(relation.clone(), node.entity.clone());
        }
        Some(path)
    }

    fn insert(&mut self, discovered: Discovered) -> bool {
        let id = discovered.entity.id.clone();
        if self.nodes.contains_key(&id) {
            return false;
        }
        self.order.push(id.clone());
        self.nodes.insert(id, discovered);
        true
    }
}

/// Breadth-first walk over `neighbors` from every seed at once.
///
/// The first discovery of an entity fixes its depth and parent; later
/// encounters neither re-score nor re-expand it. Store failures on a single
/// node are logged and skipped. Budget exhaustion stops the walk and keeps
/// what was found so far.
pub async fn expand<S: GraphStore + ?Sized>(
    store: &S,
    seeds: &[EntityId],
    max_depth: usize,
    ctx: Option<&TenantContext>,
    budget: &OperationBudget,
) -> GraphExpansion {
    let mut expansion = GraphExpansion::default();
    let mut frontier: VecDeque<EntityId> = VecDeque::new();
    let mut dropped = 0usize;

    for seed in seeds {
        if expansion.contains(seed) {
            continue;
        }
        if budget.is_exhausted() {
            expansion.truncated = true;
            return expansion;
        }
        match store.get_entity(seed, ctx).await {
            Ok(Some(entity)) => {
                if !is_visible(ctx, entity.tenant_id.as_deref()) {
                    dropped += 1;
                    continue;
                }
                frontier.push_back(entity.id.clone());
                expansion.insert(Discovered {
                    entity,
                    depth: 0,
                    parent: None,
                });
            }
            Ok(None) => debug!(seed = %seed, "seed entity not found"),
            Err(e) => {
                warn!(seed = %seed, error = %e, "seed lookup failed");
                expansion.degraded = true;
            }
        }
    }

    while let Some(id) = frontier.pop_front() {
        let depth = match expansion.get(&id) {
            Some(node) => node.depth,
            None => continue,
        };
        if depth >= max_depth {
            continue;
        }
        if budget.is_exhausted() {
            debug!(discovered = expansion.len(), "graph expansion stopped by budget");
            expansion.truncated = true;
            break;
        }
        let neighbors = match store.neighbors(&id, ctx).await {
            Ok(neighbors) => neighbors,
            Err(e) => {
                warn!(entity = %id, error = %e, "neighbour expansion failed");
                expansion.degraded = true;
                continue;
            }
        };
        for (relation, other) in neighbors {
            if !is_visible(ctx, other.tenant_id.as_deref()) {
                dropped += 1;
                continue;
            }
            let other_id = other.id.clone();
            if expansion.insert(Discovered {
                entity: other,
                depth: depth + 1,
                parent: Some((id.clone(), relation)),
            }) {
                frontier.push_back(other_id);
            }
        }
    }

    if dropped > 0 {
        warn!(
            tenant = scope_label(ctx),
            dropped, "filtered foreign-tenant entities during expansion"
        );
    }
    expansion
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusegraph_core::MemoryGraphStore;

    async fn chain() -> MemoryGraphStore {
        // s -> a -> b -> c
        let store = MemoryGraphStore::new();
        for id in ["s", "a", "b", "c"] {
            store.add_entity(Entity::new(id, "Node"), None).await.unwrap();
        }
        for (i, (src, dst)) in [("s", "a"), ("a", "b"), ("b", "c")].iter().enumerate() {
            store
                .add_relation(Relation::new(format!("r{i}"), "LINKS", *src, *dst), None)
                .await
                .unwrap();
        }
        store
    }

    #[test]
    fn test_hop_score_decreasing() {
        assert_eq!(hop_score(0), 1.0);
        assert_eq!(hop_score(1), 0.5);
        assert!(hop_score(2) < hop_score(1));
    }

    #[tokio::test]
    async fn test_depth_bound_respected() {
        let store = chain().await;
        let expansion = expand(
            &store,
            &["s".to_string()],
            2,
            None,
            &OperationBudget::unbounded(),
        )
        .await;
        assert_eq!(expansion.len(), 3);
        assert!(!expansion.contains("c"));
        assert_eq!(expansion.get("b").unwrap().depth, 2);
    }

    #[tokio::test]
    async fn test_first_discovery_wins() {
        let store = chain().await;
        let expansion = expand(
            &store,
            &["s".to_string(), "b".to_string()],
            3,
            None,
            &OperationBudget::unbounded(),
        )
        .await;
        // a is one hop from both seeds; c one hop from b
        assert_eq!(expansion.get("b").unwrap().depth, 0);
        assert_eq!(expansion.get("c").unwrap().depth, 1);
        assert_eq!(expansion.get("a").unwrap().depth, 1);
    }

    #[tokio::test]
    async fn test_path_reconstruction() {
        let store = chain().await;
        let expansion = expand(
            &store,
            &["s".to_string()],
            3,
            None,
            &OperationBudget::unbounded(),
        )
        .await;
        let path = expansion.path_to("c").unwrap();
        assert_eq!(path.entity_ids(), vec!["s", "a", "b", "c"]);
        assert_eq!(path.len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_budget_truncates() {
        let store = chain().await;
        let budget = OperationBudget::unbounded();
        budget.cancel();
        let expansion = expand(&store, &["s".to_string()], 3, None, &budget).await;
        assert!(expansion.truncated);
        assert!(expansion.is_empty());
    }
}
