//! Incremental linking of a new entity against what the store already holds

use crate::alias::AliasIndex;
use crate::similarity::EntitySimilarity;
use fusegraph_core::tenant::{is_visible, retain_visible, scope_label, tenant_of};
use fusegraph_core::{Entity, GraphStore, Result, TenantContext};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct LinkResult {
    pub linked: bool,
    pub existing_entity: Option<Entity>,
    /// Similarity of the best candidate, 1.0 for alias hits
    pub score: f32,
}

impl LinkResult {
    fn unlinked(score: f32) -> Self {
        Self {
            linked: false,
            existing_entity: None,
            score,
        }
    }
}

pub struct EntityLinker {
    store: Arc<dyn GraphStore>,
    similarity: EntitySimilarity,
    threshold: f32,
    aliases: Option<Arc<AliasIndex>>,
}

impl EntityLinker {
    pub fn new(store: Arc<dyn GraphStore>, similarity: EntitySimilarity, threshold: f32) -> Self {
        Self {
            store,
            similarity,
            threshold: threshold.clamp(0.0, 1.0),
            aliases: None,
        }
    }

    /// Consult `aliases` for the entity's name before scanning candidates
    #[must_use]
    pub fn with_aliases(mut self, aliases: Arc<AliasIndex>) -> Self {
        self.aliases = Some(aliases);
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Find the existing entity `new_entity` refers to, if any.
    ///
    /// Only entities visible under `ctx` and owned by the same tenant as
    /// `new_entity` are considered; an entity owned by another tenant is
    /// never linked, however similar. In global scope the owner is the
    /// entity's own `tenant_id`.
    pub async fn link_entity(
        &self,
        new_entity: &Entity,
        ctx: Option<&TenantContext>,
    ) -> Result<LinkResult> {
        if !is_visible(ctx, new_entity.tenant_id.as_deref()) {
            warn!(
                tenant = scope_label(ctx),
                entity = %new_entity.id,
                "refusing to link entity owned by another tenant"
            );
            return Ok(LinkResult::unlinked(0.0));
        }

        let owner = tenant_of(ctx).or(new_entity.tenant_id.as_deref());
        if let Some(existing) = self.alias_hit(new_entity, owner, ctx).await? {
            debug!(entity = %new_entity.id, existing = %existing.id, "linked by alias");
            return Ok(LinkResult {
                linked: true,
                existing_entity: Some(existing),
                score: 1.0,
            });
        }

        let mut candidates = self
            .store
            .list_entities(Some(&new_entity.entity_type), ctx)
            .await?;
        let dropped = retain_visible(ctx, &mut candidates);
        if dropped > 0 {
            warn!(
                tenant = scope_label(ctx),
                dropped, "store returned foreign-tenant link candidates"
            );
        }

        let mut best: Option<(Entity, f32)> = None;
        for candidate in candidates {
            if candidate.tenant_id.as_deref() != owner || candidate.id == new_entity.id {
                continue;
            }
            let score = self.similarity.score(new_entity, &candidate);
            if best.as_ref().map_or(true, |(_, b)| score > *b) {
                best = Some((candidate, score));
            }
        }

        match best {
            Some((existing, score)) if score >= self.threshold => {
                debug!(entity = %new_entity.id, existing = %existing.id, score, "linked by similarity");
                Ok(LinkResult {
                    linked: true,
                    existing_entity: Some(existing),
                    score,
                })
            }
            Some((_, score)) => Ok(LinkResult::unlinked(score)),
            None => Ok(LinkResult::unlinked(0.0)),
        }
    }

    async fn alias_hit(
        &self,
        entity: &Entity,
        owner: Option<&str>,
        ctx: Option<&TenantContext>,
    ) -> Result<Option<Entity>> {
        let (Some(aliases), Some(name)) = (&self.aliases, entity.name()) else {
            return Ok(None);
        };
        let Some(entry) = aliases.lookup(name, owner) else {
            return Ok(None);
        };
        let existing = self.store.get_entity(&entry.entity_id, ctx).await?;
        Ok(existing.filter(|e| {
            e.id != entity.id
                && e.entity_type == entity.entity_type
                && e.tenant_id.as_deref() == owner
                && is_visible(ctx, e.tenant_id.as_deref())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::MatchType;
    use fusegraph_core::MemoryGraphStore;

    async fn seeded() -> (Arc<MemoryGraphStore>, TenantContext, TenantContext) {
        let store = Arc::new(MemoryGraphStore::new());
        let a = TenantContext::new("tenant_a").unwrap();
        let b = TenantContext::new("tenant_b").unwrap();
        store
            .add_entity(Entity::new("acme", "Company").with_property("name", "Acme Corp"), Some(&a))
            .await
            .unwrap();
        store
            .add_entity(Entity::new("globex", "Company").with_property("name", "Globex"), Some(&b))
            .await
            .unwrap();
        (store, a, b)
    }

    #[tokio::test]
    async fn test_links_similar_entity() {
        let (store, a, _) = seeded().await;
        let linker = EntityLinker::new(store, EntitySimilarity::default(), 0.8);
        let new = Entity::new("new", "Company").with_property("name", "acme corp");
        let result = linker.link_entity(&new, Some(&a)).await.unwrap();
        assert!(result.linked);
        assert_eq!(result.existing_entity.unwrap().id, "acme");
    }

    #[tokio::test]
    async fn test_never_links_across_tenants() {
        let (store, _, b) = seeded().await;
        let linker = EntityLinker::new(store, EntitySimilarity::default(), 0.5);
        let new = Entity::new("new", "Company").with_property("name", "Acme Corp");
        let result = linker.link_entity(&new, Some(&b)).await.unwrap();
        assert!(!result.linked);
        assert!(result.existing_entity.is_none());
    }

    #[tokio::test]
    async fn test_global_scope_links_only_same_owner() {
        let (store, _, _) = seeded().await;
        let linker = EntityLinker::new(store, EntitySimilarity::default(), 0.5);
        let foreign = Entity::new("new", "Company")
            .with_property("name", "Acme Corp")
            .with_tenant("tenant_b");
        let result = linker.link_entity(&foreign, None).await.unwrap();
        assert!(!result.linked);

        let owned = Entity::new("new", "Company")
            .with_property("name", "Acme Corp")
            .with_tenant("tenant_a");
        let result = linker.link_entity(&owned, None).await.unwrap();
        assert!(result.linked);
        assert_eq!(result.existing_entity.unwrap().id, "acme");
    }

    #[tokio::test]
    async fn test_foreign_owned_entity_refused() {
        let (store, a, _) = seeded().await;
        let linker = EntityLinker::new(store, EntitySimilarity::default(), 0.5);
        let new = Entity::new("new", "Company")
            .with_property("name", "Acme Corp")
            .with_tenant("tenant_b");
        assert!(!linker.link_entity(&new, Some(&a)).await.unwrap().linked);
    }

    #[tokio::test]
    async fn test_below_threshold_reports_score() {
        let (store, a, _) = seeded().await;
        let linker = EntityLinker::new(store, EntitySimilarity::default(), 0.95);
        let new = Entity::new("new", "Company").with_property("name", "Acme Corporation");
        let result = linker.link_entity(&new, Some(&a)).await.unwrap();
        assert!(!result.linked);
        assert!(result.score > 0.0 && result.score < 0.95);
    }

    #[tokio::test]
    async fn test_alias_hit_links_directly() {
        let (store, a, _) = seeded().await;
        let aliases = Arc::new(AliasIndex::new());
        aliases.add("ACME", "acme", MatchType::Abbreviation, Some("tenant_a"));
        let linker =
            EntityLinker::new(store, EntitySimilarity::default(), 0.99).with_aliases(aliases);
        let new = Entity::new("new", "Company").with_property("name", "acme");
        let result = linker.link_entity(&new, Some(&a)).await.unwrap();
        assert!(result.linked);
        assert_eq!(result.score, 1.0);
    }
}
