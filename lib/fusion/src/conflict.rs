//! Property conflict resolution for merge groups

use crate::provenance::{all_provenance, highest_confidence, latest_timestamp};
use fusegraph_core::{
    is_metadata_key, Entity, Error, Properties, Result, Vector, MERGED_FROM_KEY,
    MERGED_PROVENANCE_KEY, PROPERTY_CONFLICTS_KEY,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cmp::Ordering;
use tracing::debug;
use uuid::Uuid;

/// How to pick a value when merged entities disagree on a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// Longest / largest value wins
    #[default]
    MostComplete,
    /// Value from the entity with the latest provenance timestamp
    MostRecent,
    /// Value from the entity with the highest provenance confidence
    MostConfident,
    /// Every distinct value, collected into a list
    KeepAll,
}

impl ConflictStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStrategy::MostComplete => "most_complete",
            ConflictStrategy::MostRecent => "most_recent",
            ConflictStrategy::MostConfident => "most_confident",
            ConflictStrategy::KeepAll => "keep_all",
        }
    }
}

/// A merged entity and how many property conflicts were resolved to build it
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub entity: Entity,
    pub conflicts: usize,
}

/// Merge `entities` into one.
///
/// A single entity passes through untouched. Two or more produce a new
/// entity with a fresh id carrying `_merged_from`, `_merged_provenance`
/// and, when values disagreed, `_property_conflicts`.
pub fn resolve_property_conflicts(
    entities: &[Entity],
    strategy: ConflictStrategy,
) -> Result<MergeOutcome> {
    let first = match entities {
        [] => {
            return Err(Error::InvalidConfig(
                "cannot merge an empty entity list".to_string(),
            ))
        }
        [only] => {
            return Ok(MergeOutcome {
                entity: only.clone(),
                conflicts: 0,
            })
        }
        [first, ..] => first,
    };

    let mut properties = Properties::new();
    let mut conflict_log = serde_json::Map::new();
    let mut conflicts = 0usize;

    for key in property_keys(entities) {
        // (source index, value) for every entity that has a non-null value
        let candidates: Vec<(usize, &Value)> = entities
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.properties.get(&key).filter(|v| !v.is_null()).map(|v| (i, v)))
            .collect();
        let Some(&(_, first_value)) = candidates.first() else {
            continue;
        };

        let mut distinct: Vec<&Value> = Vec::new();
        for (_, value) in &candidates {
            if !distinct.contains(value) {
                distinct.push(value);
            }
        }
        if distinct.len() == 1 {
            properties.insert(key, first_value.clone());
            continue;
        }

        let resolved = pick(&candidates, &distinct, entities, strategy);
        conflicts += 1;
        conflict_log.insert(
            key.clone(),
            json!({
                "values": distinct,
                "resolved": resolved,
                "strategy": strategy.as_str(),
            }),
        );
        properties.insert(key, resolved);
    }

    if !conflict_log.is_empty() {
        properties.insert(PROPERTY_CONFLICTS_KEY.to_string(), Value::Object(conflict_log));
    }

    let mut provenance: Vec<Value> = Vec::new();
    for record in entities.iter().flat_map(all_provenance) {
        let value = record.to_json();
        if !provenance.contains(&value) {
            provenance.push(value);
        }
    }
    properties.insert(MERGED_PROVENANCE_KEY.to_string(), Value::Array(provenance));
    properties.insert(
        MERGED_FROM_KEY.to_string(),
        Value::Array(entities.iter().map(|e| json!(e.id)).collect()),
    );

    let entity = Entity {
        id: format!("merged_{}", Uuid::new_v4().simple()),
        entity_type: first.entity_type.clone(),
        properties,
        embedding: mean_embedding(entities),
        tenant_id: first.tenant_id.clone(),
    };
    debug!(
        merged = %entity.id,
        inputs = entities.len(),
        conflicts,
        strategy = strategy.as_str(),
        "resolved merge group"
    );
    Ok(MergeOutcome { entity, conflicts })
}

/// User property keys in first-appearance order across `entities`
fn property_keys(entities: &[Entity]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for entity in entities {
        for key in entity.properties.keys() {
            if !is_metadata_key(key) && !keys.contains(key) {
                keys.push(key.clone());
            }
        }
    }
    keys
}

fn pick(
    candidates: &[(usize, &Value)],
    distinct: &[&Value],
    entities: &[Entity],
    strategy: ConflictStrategy,
) -> Value {
    match strategy {
        ConflictStrategy::KeepAll => Value::Array(distinct.iter().map(|v| (*v).clone()).collect()),
        ConflictStrategy::MostComplete => {
            best_by(candidates, |(_, value)| Some(completeness(value) as f64))
        }
        ConflictStrategy::MostRecent => best_by(candidates, |(i, _)| {
            latest_timestamp(&entities[*i]).map(|ts| ts.timestamp_millis() as f64)
        }),
        ConflictStrategy::MostConfident => best_by(candidates, |(i, _)| {
            highest_confidence(&entities[*i]).map(f64::from)
        }),
    }
}

/// Highest key wins; a missing key loses to any present one; ties keep the
/// earliest candidate. With no keys at all the first candidate wins.
fn best_by<F>(candidates: &[(usize, &Value)], key: F) -> Value
where
    F: Fn(&(usize, &Value)) -> Option<f64>,
{
    let mut best: Option<(&(usize, &Value), Option<f64>)> = None;
    for candidate in candidates {
        let k = key(candidate);
        let better = match &best {
            None => true,
            Some((_, best_key)) => match (k, best_key) {
                (Some(k), Some(b)) => k.partial_cmp(b) == Some(Ordering::Greater),
                (Some(_), None) => true,
                _ => false,
            },
        };
        if better {
            best = Some((candidate, k));
        }
    }
    best.map(|((_, value), _)| (*value).clone())
        .unwrap_or(Value::Null)
}

fn completeness(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::String(s) => s.trim().chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        other => other.to_string().len(),
    }
}

/// Component-wise mean of the inputs' embeddings sharing the first one's dimension
fn mean_embedding(entities: &[Entity]) -> Option<Vector> {
    let mut embeddings = entities.iter().filter_map(|e| e.embedding.as_ref());
    let first = embeddings.next()?;
    let mut sum = first.clone();
    let mut count = 1.0f32;
    for embedding in embeddings.filter(|e| e.dim() == first.dim()) {
        sum = &sum + embedding;
        count += 1.0;
    }
    Some(&sum * count.recip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provenance::{track_entity_provenance, ProvenanceRecord};
    use chrono::{TimeZone, Utc};
    use fusegraph_core::PROVENANCE_KEY;

    fn sourced(id: &str, name: &str, record: ProvenanceRecord) -> Entity {
        Entity::new(id, "Company")
            .with_property("name", name)
            .with_property(PROVENANCE_KEY, record.to_json())
    }

    #[test]
    fn test_empty_list_fails() {
        let err = resolve_property_conflicts(&[], ConflictStrategy::MostComplete).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_single_entity_passthrough() {
        let entity = Entity::new("solo", "Company").with_property("name", "Acme");
        let outcome =
            resolve_property_conflicts(std::slice::from_ref(&entity), ConflictStrategy::KeepAll)
                .unwrap();
        assert_eq!(outcome.entity, entity);
        assert_eq!(outcome.conflicts, 0);
    }

    #[test]
    fn test_most_complete_prefers_longer_value() {
        let a = Entity::new("a", "Company")
            .with_property("name", "Acme")
            .with_property("hq", "Berlin");
        let b = Entity::new("b", "Company")
            .with_property("name", "Acme Corporation")
            .with_property("hq", "Berlin");
        let outcome = resolve_property_conflicts(&[a, b], ConflictStrategy::MostComplete).unwrap();

        assert_eq!(outcome.conflicts, 1);
        assert_eq!(outcome.entity.name(), Some("Acme Corporation"));
        assert_eq!(outcome.entity.properties["hq"], json!("Berlin"));
        let log = &outcome.entity.properties[PROPERTY_CONFLICTS_KEY]["name"];
        assert_eq!(log["values"], json!(["Acme", "Acme Corporation"]));
        assert_eq!(log["strategy"], json!("most_complete"));
        assert_eq!(
            outcome.entity.properties[MERGED_FROM_KEY],
            json!(["a", "b"])
        );
        assert!(outcome.entity.id.starts_with("merged_"));
    }

    #[test]
    fn test_most_recent_with_partial_provenance() {
        let old = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let new = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let undated = Entity::new("x", "Company").with_property("name", "Undated Name");
        let stale = sourced("y", "Stale", ProvenanceRecord::new("s1").with_timestamp(old));
        let fresh = sourced("z", "Fresh", ProvenanceRecord::new("s2").with_timestamp(new));

        let outcome =
            resolve_property_conflicts(&[undated, stale, fresh], ConflictStrategy::MostRecent)
                .unwrap();
        assert_eq!(outcome.entity.name(), Some("Fresh"));
    }

    #[test]
    fn test_most_confident_falls_back_to_first_without_provenance() {
        let a = Entity::new("a", "Company").with_property("name", "First");
        let b = Entity::new("b", "Company").with_property("name", "Second");
        let outcome =
            resolve_property_conflicts(&[a.clone(), b.clone()], ConflictStrategy::MostConfident)
                .unwrap();
        assert_eq!(outcome.entity.name(), Some("First"));
        assert_eq!(outcome.conflicts, 1);

        let confident = sourced("c", "Third", ProvenanceRecord::new("s").with_confidence(0.9));
        let outcome =
            resolve_property_conflicts(&[a, b, confident], ConflictStrategy::MostConfident)
                .unwrap();
        assert_eq!(outcome.entity.name(), Some("Third"));
    }

    #[test]
    fn test_keep_all_collects_distinct_values() {
        let a = Entity::new("a", "Company").with_property("tag", "x");
        let b = Entity::new("b", "Company").with_property("tag", "y");
        let c = Entity::new("c", "Company").with_property("tag", "x");
        let outcome = resolve_property_conflicts(&[a, b, c], ConflictStrategy::KeepAll).unwrap();
        assert_eq!(outcome.entity.properties["tag"], json!(["x", "y"]));
    }

    #[test]
    fn test_provenance_unioned() {
        let a = sourced("a", "Acme", ProvenanceRecord::new("doc-1"));
        let b = sourced("b", "Acme", ProvenanceRecord::new("doc-2"));
        let outcome = resolve_property_conflicts(&[a, b], ConflictStrategy::MostComplete).unwrap();
        assert_eq!(outcome.conflicts, 0);
        assert!(outcome.entity.properties.get(PROPERTY_CONFLICTS_KEY).is_none());
        assert_eq!(
            track_entity_provenance(&outcome.entity),
            vec!["doc-1", "doc-2"]
        );
    }

    #[test]
    fn test_embeddings_averaged() {
        let a = Entity::new("a", "Doc").with_embedding(vec![1.0, 0.0]);
        let b = Entity::new("b", "Doc").with_embedding(vec![0.0, 1.0]);
        let outcome = resolve_property_conflicts(&[a, b], ConflictStrategy::MostComplete).unwrap();
        assert_eq!(
            outcome.entity.embedding.unwrap().as_slice(),
            &[0.5, 0.5]
        );
    }
}
