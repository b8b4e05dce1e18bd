//! In-memory reference backend for [`GraphStore`]
//!
//! Keeps entities and relations in tenant-prefixed hash maps behind
//! `parking_lot` locks. Intended for tests and embedded use; persistent
//! backends live outside this crate.

use crate::entity::{Entity, Path, Relation};
use crate::error::{Error, Result};
use crate::store::GraphStore;
use crate::tenant::{is_visible, tenant_key, tenant_of, TenantContext};
use crate::vector::Vector;
use ahash::{AHashMap, AHashSet};
use async_trait::async_trait;
use ordered_float::OrderedFloat;
use parking_lot::RwLock;
use std::cmp::Reverse;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Default)]
struct GraphData {
    // tenant-prefixed entity key -> entity
    entities: AHashMap<String, Entity>,
    // tenant-prefixed relation key -> relation
    relations: AHashMap<String, Relation>,
    // tenant-prefixed entity key -> relation keys touching it
    adjacency: AHashMap<String, Vec<String>>,
}

impl GraphData {
    /// Resolve an entity id under `ctx` to its storage key.
    fn resolve_key(&self, id: &str, ctx: Option<&TenantContext>) -> Option<String> {
        match ctx {
            Some(ctx) => {
                let key = ctx.scoped_key(id);
                self.entities.contains_key(&key).then_some(key)
            }
            None => {
                if self.entities.contains_key(id) {
                    return Some(id.to_string());
                }
                self.entities
                    .iter()
                    .filter(|(_, e)| e.id == id)
                    .map(|(k, _)| k.clone())
                    .min()
            }
        }
    }

    fn exists_elsewhere(&self, id: &str) -> bool {
        self.entities.values().any(|e| e.id == id)
    }

    fn neighbors_of(&self, key: &str, ctx: Option<&TenantContext>) -> Vec<(Relation, Entity)> {
        let Some(entity) = self.entities.get(key) else {
            return Vec::new();
        };
        let owner = entity.tenant_id.as_deref();
        let mut out = Vec::new();
        for rel_key in self.adjacency.get(key).into_iter().flatten() {
            let Some(relation) = self.relations.get(rel_key) else {
                continue;
            };
            let Some(other_id) = relation.other_end(&entity.id) else {
                continue;
            };
            let other_key = tenant_key(owner, other_id);
            if let Some(other) = self.entities.get(&other_key) {
                if is_visible(ctx, other.tenant_id.as_deref()) {
                    out.push((relation.clone(), other.clone()));
                }
            }
        }
        out
    }
}

/// Reference graph store
#[derive(Clone, Default)]
pub struct MemoryGraphStore {
    data: Arc<RwLock<GraphData>>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity_count(&self) -> usize {
        self.data.read().entities.len()
    }

    pub fn relation_count(&self) -> usize {
        self.data.read().relations.len()
    }

    fn stamp_tenant(
        owner: &mut Option<String>,
        ctx: Option<&TenantContext>,
    ) -> Result<()> {
        if let Some(ctx) = ctx {
            match owner.as_deref() {
                Some(existing) if existing != ctx.tenant_id() => {
                    return Err(Error::cross_tenant(Some(ctx.tenant_id()), Some(existing)));
                }
                _ => *owner = Some(ctx.tenant_id().to_string()),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn get_entity(&self, id: &str, ctx: Option<&TenantContext>) -> Result<Option<Entity>> {
        let data = self.data.read();
        Ok(data
            .resolve_key(id, ctx)
            .and_then(|key| data.entities.get(&key).cloned()))
    }

    async fn add_entity(&self, mut entity: Entity, ctx: Option<&TenantContext>) -> Result<bool> {
        Self::stamp_tenant(&mut entity.tenant_id, ctx)?;
        let key = tenant_key(entity.tenant_id.as_deref(), &entity.id);
        let mut data = self.data.write();
        data.adjacency.entry(key.clone()).or_default();
        data.entities.insert(key, entity);
        Ok(true)
    }

    async fn add_relation(
        &self,
        mut relation: Relation,
        ctx: Option<&TenantContext>,
    ) -> Result<bool> {
        Self::stamp_tenant(&mut relation.tenant_id, ctx)?;
        let mut data = self.data.write();

        let mut endpoint_keys = Vec::with_capacity(2);
        for endpoint in [&relation.source_id, &relation.target_id] {
            let key = match data.resolve_key(endpoint, ctx) {
                Some(key) => key,
                None if ctx.is_some() && data.exists_elsewhere(endpoint) => {
                    return Err(Error::cross_tenant(tenant_of(ctx), None));
                }
                None => return Err(Error::EntityNotFound(endpoint.clone())),
            };
            let owner = data
                .entities
                .get(&key)
                .and_then(|e| e.tenant_id.clone());
            if owner != relation.tenant_id {
                return Err(Error::cross_tenant(
                    relation.tenant_id.as_deref(),
                    owner.as_deref(),
                ));
            }
            endpoint_keys.push(key);
        }

        let rel_key = tenant_key(relation.tenant_id.as_deref(), &relation.id);
        if let Some(previous) = data.relations.insert(rel_key.clone(), relation) {
            // Re-adding an id replaces the edge; drop its old adjacency entries.
            for endpoint in [&previous.source_id, &previous.target_id] {
                let key = tenant_key(previous.tenant_id.as_deref(), endpoint);
                if let Some(list) = data.adjacency.get_mut(&key) {
                    list.retain(|k| k != &rel_key);
                }
            }
        }
        for key in endpoint_keys {
            let list = data.adjacency.entry(key).or_default();
            if !list.contains(&rel_key) {
                list.push(rel_key.clone());
            }
        }
        Ok(true)
    }

    async fn vector_search(
        &self,
        query: &Vector,
        k: usize,
        entity_type: Option<&str>,
        threshold: Option<f32>,
        ctx: Option<&TenantContext>,
    ) -> Result<Vec<(Entity, f32)>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let data = self.data.read();
        let mut scored: Vec<(Entity, f32)> = data
            .entities
            .values()
            .filter(|e| is_visible(ctx, e.tenant_id.as_deref()))
            .filter(|e| entity_type.map_or(true, |t| e.entity_type == t))
            .filter_map(|e| {
                let embedding = e.embedding.as_ref()?;
                let score = embedding.cosine_similarity(query);
                if threshold.is_some_and(|t| score < t) {
                    return None;
                }
                Some((e.clone(), score))
            })
            .collect();

        scored.sort_by_key(|(e, score)| (Reverse(OrderedFloat(*score)), e.id.clone()));
        scored.truncate(k);
        Ok(scored)
    }

    async fn traverse(
        &self,
        start_id: &str,
        max_depth: usize,
        max_results: usize,
        ctx: Option<&TenantContext>,
    ) -> Result<Vec<Path>> {
        if max_results == 0 {
            return Ok(Vec::new());
        }
        let data = self.data.read();
        let Some(start_key) = data.resolve_key(start_id, ctx) else {
            return Ok(Vec::new());
        };
        let Some(start) = data.entities.get(&start_key).cloned() else {
            return Ok(Vec::new());
        };

        let mut paths = Vec::new();
        let mut visited: AHashSet<String> = AHashSet::new();
        visited.insert(start_key.clone());
        let mut queue: VecDeque<(String, Path)> = VecDeque::new();
        queue.push_back((start_key, Path::start(start)));

        while let Some((key, path)) = queue.pop_front() {
            if path.len() >= max_depth {
                continue;
            }
            for (relation, neighbor) in data.neighbors_of(&key, ctx) {
                let neighbor_key = tenant_key(neighbor.tenant_id.as_deref(), &neighbor.id);
                if !visited.insert(neighbor_key.clone()) {
                    continue;
                }
                let next = path.extended(relation, neighbor);
                paths.push(next.clone());
                if paths.len() >= max_results {
                    return Ok(paths);
                }
                queue.push_back((neighbor_key, next));
            }
        }
        Ok(paths)
    }

    async fn neighbors(
        &self,
        id: &str,
        ctx: Option<&TenantContext>,
    ) -> Result<Vec<(Relation, Entity)>> {
        let data = self.data.read();
        Ok(data
            .resolve_key(id, ctx)
            .map(|key| data.neighbors_of(&key, ctx))
            .unwrap_or_default())
    }

    async fn list_entities(
        &self,
        entity_type: Option<&str>,
        ctx: Option<&TenantContext>,
    ) -> Result<Vec<Entity>> {
        let data = self.data.read();
        let mut entities: Vec<Entity> = data
            .entities
            .values()
            .filter(|e| is_visible(ctx, e.tenant_id.as_deref()))
            .filter(|e| entity_type.map_or(true, |t| e.entity_type == t))
            .cloned()
            .collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entities)
    }
}
