//! Graph store contract
//!
//! The sole I/O boundary of the engine. Backends (in-memory, SQL, ...) live
//! outside the core and implement [`GraphStore`]. Every call takes an
//! optional [`TenantContext`]; when present the backend must restrict reads
//! and writes to that tenant.

use crate::entity::{Entity, Path, Relation};
use crate::error::Result;
use crate::tenant::TenantContext;
use crate::vector::Vector;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn get_entity(&self, id: &str, ctx: Option<&TenantContext>) -> Result<Option<Entity>>;

    /// Insert or replace an entity. Returns `true` when stored.
    async fn add_entity(&self, entity: Entity, ctx: Option<&TenantContext>) -> Result<bool>;

    /// Insert or replace a relation. Both endpoints must exist in the same
    /// tenant scope.
    async fn add_relation(&self, relation: Relation, ctx: Option<&TenantContext>) -> Result<bool>;

    /// Nearest entities by embedding cosine similarity, best first.
    async fn vector_search(
        &self,
        query: &Vector,
        k: usize,
        entity_type: Option<&str>,
        threshold: Option<f32>,
        ctx: Option<&TenantContext>,
    ) -> Result<Vec<(Entity, f32)>>;

    /// Breadth-first walks from `start_id`, at most `max_depth` relations
    /// long and at most `max_results` paths.
    async fn traverse(
        &self,
        start_id: &str,
        max_depth: usize,
        max_results: usize,
        ctx: Option<&TenantContext>,
    ) -> Result<Vec<Path>>;

    /// Relations touching `id` in either direction, paired with the entity
    /// on the other end.
    async fn neighbors(&self, id: &str, ctx: Option<&TenantContext>)
        -> Result<Vec<(Relation, Entity)>>;

    /// All entities visible under `ctx`, optionally restricted to one type.
    async fn list_entities(
        &self,
        entity_type: Option<&str>,
        ctx: Option<&TenantContext>,
    ) -> Result<Vec<Entity>>;
}

#[async_trait]
impl<S: GraphStore + ?Sized> GraphStore for Arc<S> {
    async fn get_entity(&self, id: &str, ctx: Option<&TenantContext>) -> Result<Option<Entity>> {
        (**self).get_entity(id, ctx).await
    }

    async fn add_entity(&self, entity: Entity, ctx: Option<&TenantContext>) -> Result<bool> {
        (**self).add_entity(entity, ctx).await
    }

    async fn add_relation(&self, relation: Relation, ctx: Option<&TenantContext>) -> Result<bool> {
        (**self).add_relation(relation, ctx).await
    }

    async fn vector_search(
        &self,
        query: &Vector,
        k: usize,
        entity_type: Option<&str>,
        threshold: Option<f32>,
        ctx: Option<&TenantContext>,
    ) -> Result<Vec<(Entity, f32)>> {
        (**self)
            .vector_search(query, k, entity_type, threshold, ctx)
            .await
    }

    async fn traverse(
        &self,
        start_id: &str,
        max_depth: usize,
        max_results: usize,
        ctx: Option<&TenantContext>,
    ) -> Result<Vec<Path>> {
        (**self).traverse(start_id, max_depth, max_results, ctx).await
    }

    async fn neighbors(
        &self,
        id: &str,
        ctx: Option<&TenantContext>,
    ) -> Result<Vec<(Relation, Entity)>> {
        (**self).neighbors(id, ctx).await
    }

    async fn list_entities(
        &self,
        entity_type: Option<&str>,
        ctx: Option<&TenantContext>,
    ) -> Result<Vec<Entity>> {
        (**self).list_entities(entity_type, ctx).await
    }
}
