//! Intra-batch entity deduplication
//!
//! Pairwise similarity within each type group → mergeable edges at or above
//! the threshold → connected components → one merged entity per component.

use crate::config::FusionConfig;
use crate::conflict::{resolve_property_conflicts, MergeOutcome};
use crate::similarity::EntitySimilarity;
use crate::union_find::UnionFind;
use ahash::AHashMap;
use fusegraph_core::tenant::{retain_visible, scope_label};
use fusegraph_core::{Entity, Result, TenantContext};
use rayon::prelude::*;
use tracing::{debug, warn};

/// Below this many pairs the comparison runs on the calling thread
const PARALLEL_PAIR_THRESHOLD: usize = 512;

/// Indices (into the input slice) of entities that should be merged together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeGroup {
    pub members: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct DedupReport {
    /// Output entities: untouched singletons and one merged entity per group,
    /// in the position of each group's first member
    pub entities: Vec<Entity>,
    pub merges: Vec<MergeOutcome>,
    pub merged_inputs: usize,
    pub conflicts: usize,
}

#[derive(Debug, Clone)]
pub struct EntityDeduplicator {
    config: FusionConfig,
    similarity: EntitySimilarity,
}

impl Default for EntityDeduplicator {
    fn default() -> Self {
        Self::new(FusionConfig::default())
    }
}

impl EntityDeduplicator {
    pub fn new(config: FusionConfig) -> Self {
        let config = config.sanitized();
        let similarity = EntitySimilarity::new(config.property_weight, config.embedding_weight);
        Self { config, similarity }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn similarity(&self) -> &EntitySimilarity {
        &self.similarity
    }

    /// Remove duplicates from `entities`, keeping only those visible under `ctx`
    pub fn deduplicate(&self, entities: Vec<Entity>, ctx: Option<&TenantContext>) -> Result<Vec<Entity>> {
        Ok(self.deduplicate_with_report(entities, ctx)?.entities)
    }

    pub fn deduplicate_with_report(
        &self,
        mut entities: Vec<Entity>,
        ctx: Option<&TenantContext>,
    ) -> Result<DedupReport> {
        let dropped = retain_visible(ctx, &mut entities);
        if dropped > 0 {
            warn!(
                tenant = scope_label(ctx),
                dropped, "ignored foreign-tenant entities in deduplication input"
            );
        }

        let groups = self.find_merge_groups(&entities);
        let mut group_of: AHashMap<usize, usize> = AHashMap::new();
        for (g, group) in groups.iter().enumerate() {
            for &member in &group.members {
                group_of.insert(member, g);
            }
        }

        let mut merges: Vec<MergeOutcome> = Vec::with_capacity(groups.len());
        for group in &groups {
            let members: Vec<Entity> = group.members.iter().map(|&i| entities[i].clone()).collect();
            merges.push(resolve_property_conflicts(&members, self.config.conflict_strategy)?);
        }

        let mut output = Vec::with_capacity(entities.len());
        for (i, entity) in entities.into_iter().enumerate() {
            match group_of.get(&i) {
                Some(&g) if groups[g].members[0] == i => output.push(merges[g].entity.clone()),
                Some(_) => {}
                None => output.push(entity),
            }
        }

        let merged_inputs = groups.iter().map(|g| g.members.len()).sum();
        let conflicts = merges.iter().map(|m| m.conflicts).sum();
        debug!(
            tenant = scope_label(ctx),
            groups = groups.len(),
            merged_inputs,
            output = output.len(),
            "deduplication complete"
        );
        Ok(DedupReport {
            entities: output,
            merges,
            merged_inputs,
            conflicts,
        })
    }

    /// Connected components of size ≥ 2 over the mergeable-pair graph.
    /// Only entities of the same type and owning tenant are compared.
    pub fn find_merge_groups(&self, entities: &[Entity]) -> Vec<MergeGroup> {
        let mut partitions: Vec<((Option<&str>, &str), Vec<usize>)> = Vec::new();
        for (i, entity) in entities.iter().enumerate() {
            let partition = (entity.tenant_id.as_deref(), entity.entity_type.as_str());
            match partitions.iter_mut().find(|(p, _)| *p == partition) {
                Some((_, members)) => members.push(i),
                None => partitions.push((partition, vec![i])),
            }
        }

        let mut uf = UnionFind::new(entities.len());
        for (_, members) in &partitions {
            for (a, b) in self.mergeable_pairs(entities, members) {
                uf.union(a, b);
            }
        }
        uf.groups(2)
            .into_iter()
            .map(|members| MergeGroup { members })
            .collect()
    }

    fn mergeable_pairs(&self, entities: &[Entity], members: &[usize]) -> Vec<(usize, usize)> {
        let n = members.len();
        let threshold = self.config.similarity_threshold;
        let pair = |i: usize, j: usize| {
            let (a, b) = (members[i], members[j]);
            (self.similarity.score(&entities[a], &entities[b]) >= threshold).then_some((a, b))
        };

        if n * n.saturating_sub(1) / 2 < PARALLEL_PAIR_THRESHOLD {
            (0..n)
                .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
                .filter_map(|(i, j)| pair(i, j))
                .collect()
        } else {
            (0..n)
                .into_par_iter()
                .flat_map_iter(|i| (i + 1..n).filter_map(move |j| pair(i, j)))
                .collect()
        }
    }
}
