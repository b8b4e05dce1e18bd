//! Cross-document knowledge fusion over a graph store

use crate::alias::{AliasIndex, MatchType};
use crate::config::FusionConfig;
use crate::conflict::resolve_property_conflicts;
use crate::dedup::EntityDeduplicator;
use crate::linking::{EntityLinker, LinkResult};
use ahash::{AHashMap, AHashSet};
use fusegraph_core::tenant::{retain_visible, scope_label, tenant_key};
use fusegraph_core::{
    EngineMetrics, Entity, GraphStore, OperationBudget, Result, TenantContext,
    MERGED_FROM_KEY,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FusionStats {
    pub entities_analyzed: usize,
    /// Input entities folded into a merged entity
    pub entities_merged: usize,
    pub conflicts_resolved: usize,
    pub merge_groups: usize,
}

pub struct KnowledgeFusionPipeline {
    store: Arc<dyn GraphStore>,
    config: FusionConfig,
    dedup: EntityDeduplicator,
    aliases: Arc<AliasIndex>,
    metrics: Option<Arc<EngineMetrics>>,
    // One lock per tenant scope; held for a whole fusion run
    tenant_locks: Mutex<AHashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KnowledgeFusionPipeline {
    pub fn new(store: Arc<dyn GraphStore>, config: FusionConfig) -> Result<Self> {
        config.validate()?;
        let config = config.sanitized();
        Ok(Self {
            store,
            dedup: EntityDeduplicator::new(config.clone()),
            config,
            aliases: Arc::new(AliasIndex::new()),
            metrics: None,
            tenant_locks: Mutex::new(AHashMap::new()),
        })
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Share an existing alias index instead of the pipeline's own
    #[must_use]
    pub fn with_aliases(mut self, aliases: Arc<AliasIndex>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn aliases(&self) -> &Arc<AliasIndex> {
        &self.aliases
    }

    pub fn deduplicator(&self) -> &EntityDeduplicator {
        &self.dedup
    }

    /// A linker sharing this pipeline's store, similarity and aliases
    pub fn linker(&self) -> EntityLinker {
        EntityLinker::new(
            Arc::clone(&self.store),
            *self.dedup.similarity(),
            self.config.link_threshold,
        )
        .with_aliases(Arc::clone(&self.aliases))
    }

    pub async fn link_entity(
        &self,
        new_entity: &Entity,
        ctx: Option<&TenantContext>,
    ) -> Result<LinkResult> {
        self.linker().link_entity(new_entity, ctx).await
    }

    fn tenant_lock(&self, ctx: Option<&TenantContext>) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.tenant_locks.lock();
        Arc::clone(locks.entry(scope_label(ctx).to_string()).or_default())
    }

    /// Find and merge duplicate entities within the tenant scope.
    ///
    /// Merged entities are written back through the store; their inputs are
    /// left in place and excluded from later runs via `_merged_from`.
    /// Runs for the same tenant are serialized. Store errors and budget
    /// exhaustion abort the run; merges already written stay written.
    pub async fn fuse_cross_document_entities(
        &self,
        entity_types: Option<&[String]>,
        ctx: Option<&TenantContext>,
        budget: &OperationBudget,
    ) -> Result<FusionStats> {
        let lock = self.tenant_lock(ctx);
        let _guard = lock.lock().await;
        budget.check("fusion")?;

        let entities = self.load_candidates(entity_types, ctx, budget).await?;
        let mut stats = FusionStats {
            entities_analyzed: entities.len(),
            ..FusionStats::default()
        };

        // Global scope still never merges across owners
        let mut groups: Vec<((Option<String>, String), Vec<Entity>)> = Vec::new();
        for entity in entities {
            let partition = (entity.tenant_id.clone(), entity.entity_type.clone());
            match groups.iter_mut().find(|(p, _)| *p == partition) {
                Some((_, members)) => members.push(entity),
                None => groups.push((partition, vec![entity])),
            }
        }

        for ((owner, entity_type), members) in &groups {
            budget.check("fusion")?;
            let merge_groups = self.dedup.find_merge_groups(members);
            debug!(
                tenant = scope_label(ctx),
                owner = owner.as_deref().unwrap_or("<none>"),
                entity_type = %entity_type,
                candidates = members.len(),
                groups = merge_groups.len(),
                "fusion type group scanned"
            );

            for group in merge_groups {
                budget.check("fusion")?;
                let inputs: Vec<Entity> = group.members.iter().map(|&i| members[i].clone()).collect();
                let outcome = resolve_property_conflicts(&inputs, self.config.conflict_strategy)?;
                self.store.add_entity(outcome.entity.clone(), ctx).await?;

                if self.config.register_aliases {
                    self.register_aliases(&outcome.entity, &inputs);
                }
                stats.merge_groups += 1;
                stats.entities_merged += inputs.len();
                stats.conflicts_resolved += outcome.conflicts;
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_fusion(stats.entities_merged);
        }
        info!(
            tenant = scope_label(ctx),
            analyzed = stats.entities_analyzed,
            merged = stats.entities_merged,
            groups = stats.merge_groups,
            conflicts = stats.conflicts_resolved,
            "fusion run complete"
        );
        Ok(stats)
    }

    /// Tenant-visible entities of the requested types, minus those already
    /// superseded by a merged entity
    async fn load_candidates(
        &self,
        entity_types: Option<&[String]>,
        ctx: Option<&TenantContext>,
        budget: &OperationBudget,
    ) -> Result<Vec<Entity>> {
        let mut entities = match entity_types {
            Some(types) => {
                let mut all = Vec::new();
                for entity_type in types {
                    budget.check("fusion")?;
                    all.extend(self.store.list_entities(Some(entity_type), ctx).await?);
                }
                all
            }
            None => self.store.list_entities(None, ctx).await?,
        };

        let dropped = retain_visible(ctx, &mut entities);
        if dropped > 0 {
            warn!(
                tenant = scope_label(ctx),
                dropped, "store returned foreign-tenant entities to fusion"
            );
        }

        // Ids are only unique per owner, so both sets are keyed by tenant
        let superseded: AHashSet<String> = entities
            .iter()
            .flat_map(|e| {
                let owner = e.tenant_id.as_deref();
                e.properties
                    .get(MERGED_FROM_KEY)
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_str)
                    .map(move |id| tenant_key(owner, id))
            })
            .collect();
        let mut seen: AHashSet<String> = AHashSet::new();
        entities.retain(|e| {
            let key = tenant_key(e.tenant_id.as_deref(), &e.id);
            !superseded.contains(&key) && seen.insert(key)
        });
        Ok(entities)
    }

    fn register_aliases(&self, merged: &Entity, inputs: &[Entity]) {
        let tenant = merged.tenant_id.as_deref();
        for input in inputs {
            self.aliases
                .add(&input.id, merged.id.clone(), MatchType::Exact, tenant);
            self.aliases.register_entity(input, &merged.id);
        }
        debug!(
            tenant = tenant.unwrap_or("<global>"),
            merged = %merged.id,
            aliases = self.aliases.aliases_of(&merged.id, tenant).len(),
            "registered merge aliases"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusegraph_core::{Error, MemoryGraphStore, PROPERTY_CONFLICTS_KEY};

    fn company(id: &str, name: &str, hq: &str) -> Entity {
        Entity::new(id, "Company")
            .with_property("name", name)
            .with_property("hq", hq)
    }

    async fn two_tenant_store() -> (Arc<MemoryGraphStore>, TenantContext, TenantContext) {
        let store = Arc::new(MemoryGraphStore::new());
        let a = TenantContext::new("tenant_a").unwrap();
        let b = TenantContext::new("tenant_b").unwrap();
        for entity in [
            company("a1", "Acme Corp", "Berlin"),
            company("a2", "Acme Corp", "Munich"),
            company("a3", "Initech", "Austin"),
        ] {
            store.add_entity(entity, Some(&a)).await.unwrap();
        }
        for entity in [
            company("b1", "Acme Corp", "Berlin"),
            company("b2", "Acme Corp", "Berlin"),
        ] {
            store.add_entity(entity, Some(&b)).await.unwrap();
        }
        (store, a, b)
    }

    fn pipeline(store: Arc<MemoryGraphStore>) -> KnowledgeFusionPipeline {
        KnowledgeFusionPipeline::new(store, FusionConfig::with_threshold(0.6)).unwrap()
    }

    #[tokio::test]
    async fn test_fusion_stays_within_tenant() {
        let (store, a, _) = two_tenant_store().await;
        let pipeline = pipeline(Arc::clone(&store));
        let stats = pipeline
            .fuse_cross_document_entities(None, Some(&a), &OperationBudget::unbounded())
            .await
            .unwrap();

        assert_eq!(stats.entities_analyzed, 3);
        assert_eq!(stats.merge_groups, 1);
        assert_eq!(stats.entities_merged, 2);
        assert_eq!(stats.conflicts_resolved, 1);

        let merged: Vec<Entity> = store
            .list_entities(None, Some(&a))
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.properties.contains_key(MERGED_FROM_KEY))
            .collect();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].tenant_id.as_deref(), Some("tenant_a"));
        assert!(merged[0].properties.contains_key(PROPERTY_CONFLICTS_KEY));
        assert_eq!(
            merged[0].properties[MERGED_FROM_KEY],
            serde_json::json!(["a1", "a2"])
        );
    }

    #[tokio::test]
    async fn test_global_scope_keeps_owners_apart() {
        let store = Arc::new(MemoryGraphStore::new());
        let ta = TenantContext::new("ta").unwrap();
        let tb = TenantContext::new("tb").unwrap();
        for (entity, ctx) in [
            (company("e1", "Initech", "Austin"), &ta),
            (company("e2", "Initech", "Dallas"), &ta),
            (company("e1", "Initech", "Austin"), &tb),
            (company("e3", "Initech", "Austin"), &tb),
        ] {
            store.add_entity(entity, Some(ctx)).await.unwrap();
        }
        let pipeline = pipeline(Arc::clone(&store));
        let budget = OperationBudget::unbounded();

        let stats = pipeline
            .fuse_cross_document_entities(None, None, &budget)
            .await
            .unwrap();
        assert_eq!(stats.entities_analyzed, 4);
        assert_eq!(stats.merge_groups, 2);
        assert_eq!(stats.entities_merged, 4);

        for (ctx, expected) in [(&ta, ["e1", "e2"]), (&tb, ["e1", "e3"])] {
            let merged: Vec<Entity> = store
                .list_entities(None, Some(ctx))
                .await
                .unwrap()
                .into_iter()
                .filter(|e| e.properties.contains_key(MERGED_FROM_KEY))
                .collect();
            assert_eq!(merged.len(), 1);
            let mut sources: Vec<&str> = merged[0].properties[MERGED_FROM_KEY]
                .as_array()
                .unwrap()
                .iter()
                .filter_map(Value::as_str)
                .collect();
            sources.sort_unstable();
            assert_eq!(sources, expected);
        }

        // tb's e1 is superseded only by tb's merge
        let again = pipeline
            .fuse_cross_document_entities(None, None, &budget)
            .await
            .unwrap();
        assert_eq!(again.entities_analyzed, 2);
        assert_eq!(again.merge_groups, 0);
    }

    #[tokio::test]
    async fn test_second_run_is_stable() {
        let (store, a, _) = two_tenant_store().await;
        let pipeline = pipeline(store);
        let budget = OperationBudget::unbounded();
        pipeline
            .fuse_cross_document_entities(None, Some(&a), &budget)
            .await
            .unwrap();
        let again = pipeline
            .fuse_cross_document_entities(None, Some(&a), &budget)
            .await
            .unwrap();
        // merged entity + a3; a1 and a2 are superseded
        assert_eq!(again.entities_analyzed, 2);
        assert_eq!(again.merge_groups, 0);
    }

    #[tokio::test]
    async fn test_aliases_point_at_merged_entity() {
        let (store, _, b) = two_tenant_store().await;
        let pipeline = pipeline(store);
        pipeline
            .fuse_cross_document_entities(None, Some(&b), &OperationBudget::unbounded())
            .await
            .unwrap();

        let by_name = pipeline.aliases().lookup("acme corp", Some("tenant_b")).unwrap();
        let by_id = pipeline.aliases().lookup("b1", Some("tenant_b")).unwrap();
        assert_eq!(by_name.entity_id, by_id.entity_id);
        assert!(by_name.entity_id.starts_with("merged_"));
        assert!(pipeline.aliases().lookup("acme corp", Some("tenant_a")).is_none());

        let initials = pipeline.aliases().lookup("AC", Some("tenant_b")).unwrap();
        assert_eq!(initials.match_type, MatchType::Abbreviation);
        assert_eq!(initials.entity_id, by_name.entity_id);
    }

    #[tokio::test]
    async fn test_type_filter() {
        let (store, a, _) = two_tenant_store().await;
        store
            .add_entity(Entity::new("p1", "Person").with_property("name", "Ada"), Some(&a))
            .await
            .unwrap();
        let pipeline = pipeline(store);
        let types = vec!["Person".to_string()];
        let stats = pipeline
            .fuse_cross_document_entities(Some(types.as_slice()), Some(&a), &OperationBudget::unbounded())
            .await
            .unwrap();
        assert_eq!(stats.entities_analyzed, 1);
        assert_eq!(stats.merge_groups, 0);
    }

    #[tokio::test]
    async fn test_cancelled_budget_aborts() {
        let (store, a, _) = two_tenant_store().await;
        let pipeline = pipeline(store);
        let budget = OperationBudget::unbounded();
        budget.cancel();
        let err = pipeline
            .fuse_cross_document_entities(None, Some(&a), &budget)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_metrics_recorded() {
        let (store, a, _) = two_tenant_store().await;
        let metrics = Arc::new(EngineMetrics::new());
        let pipeline = pipeline(store).with_metrics(Arc::clone(&metrics));
        pipeline
            .fuse_cross_document_entities(None, Some(&a), &OperationBudget::unbounded())
            .await
            .unwrap();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.fusion_runs, 1);
        assert_eq!(snapshot.entities_merged, 2);
    }

    #[tokio::test]
    async fn test_linker_uses_merge_aliases() {
        let (store, a, _) = two_tenant_store().await;
        let pipeline = pipeline(store);
        pipeline
            .fuse_cross_document_entities(None, Some(&a), &OperationBudget::unbounded())
            .await
            .unwrap();
        let incoming = Entity::new("a9", "Company").with_property("name", "ACME CORP");
        let result = pipeline.link_entity(&incoming, Some(&a)).await.unwrap();
        assert!(result.linked);
        assert!(result.existing_entity.unwrap().id.starts_with("merged_"));
    }
}
