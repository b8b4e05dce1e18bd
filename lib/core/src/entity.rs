// Knowledge graph nodes, edges and walks
use crate::vector::Vector;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;

pub type EntityId = String;
pub type RelationId = String;

/// Insertion-ordered property map
pub type Properties = serde_json::Map<String, Value>;

/// Keys starting with this prefix hold engine metadata, never user data.
pub const METADATA_PREFIX: &str = "_";
pub const PROVENANCE_KEY: &str = "_provenance";
pub const MERGED_PROVENANCE_KEY: &str = "_merged_provenance";
pub const PROPERTY_CONFLICTS_KEY: &str = "_property_conflicts";
pub const MERGED_FROM_KEY: &str = "_merged_from";

/// Property holding an entity's display name.
pub const NAME_KEY: &str = "name";

pub const DEFAULT_RELATION_WEIGHT: f32 = 1.0;

#[inline]
pub fn is_metadata_key(key: &str) -> bool {
    key.starts_with(METADATA_PREFIX)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl Entity {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<EntityId>, entity_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            properties: Properties::new(),
            embedding: None,
            tenant_id: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_embedding(mut self, embedding: impl Into<Vector>) -> Self {
        self.embedding = Some(embedding.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.properties.get(NAME_KEY).and_then(Value::as_str)
    }

    /// User-visible properties, skipping reserved metadata keys
    pub fn user_properties(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.properties.iter().filter(|(k, _)| !is_metadata_key(k))
    }

    /// Concatenated text of the given property keys, or of every user
    /// property when `keys` is empty.
    pub fn text_of(&self, keys: &[String]) -> String {
        let mut parts: Vec<String> = Vec::new();
        if keys.is_empty() {
            for (_, value) in self.user_properties() {
                push_text(&mut parts, value);
            }
        } else {
            for key in keys {
                if let Some(value) = self.properties.get(key) {
                    push_text(&mut parts, value);
                }
            }
        }
        parts.join(" ")
    }
}

fn push_text(parts: &mut Vec<String>, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => parts.push(s.clone()),
        Value::Array(items) => {
            for item in items {
                push_text(parts, item);
            }
        }
        other => parts.push(other.to_string()),
    }
}

/// A directed, typed edge. `weight` is a traversal multiplier, not a probability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relation {
    pub id: RelationId,
    #[serde(rename = "type")]
    pub relation_type: String,
    pub source_id: EntityId,
    pub target_id: EntityId,
    #[serde(default = "default_weight")]
    pub weight: f32,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

fn default_weight() -> f32 {
    DEFAULT_RELATION_WEIGHT
}

impl Relation {
    #[inline]
    #[must_use]
    pub fn new(
        id: impl Into<RelationId>,
        relation_type: impl Into<String>,
        source_id: impl Into<EntityId>,
        target_id: impl Into<EntityId>,
    ) -> Self {
        Self {
            id: id.into(),
            relation_type: relation_type.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            weight: DEFAULT_RELATION_WEIGHT,
            properties: Properties::new(),
            tenant_id: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// The endpoint opposite to `id`, if `id` is one of the endpoints
    pub fn other_end(&self, id: &str) -> Option<&str> {
        if self.source_id == id {
            Some(&self.target_id)
        } else if self.target_id == id {
            Some(&self.source_id)
        } else {
            None
        }
    }
}

/// One step of a walk: the entity reached and the relation used to reach it
/// (`None` for the starting entity).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathHop {
    pub entity: Entity,
    pub relation: Option<Relation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Path {
    pub hops: SmallVec<[PathHop; 4]>,
}

impl Path {
    #[must_use]
    pub fn start(entity: Entity) -> Self {
        let mut hops = SmallVec::new();
        hops.push(PathHop {
            entity,
            relation: None,
        });
        Self { hops }
    }

    #[must_use]
    pub fn extended(&self, relation: Relation, entity: Entity) -> Self {
        let mut next = self.clone();
        next.hops.push(PathHop {
            entity,
            relation: Some(relation),
        });
        next
    }

    /// Number of relations traversed
    #[inline]
    pub fn len(&self) -> usize {
        self.hops.len().saturating_sub(1)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn source(&self) -> Option<&Entity> {
        self.hops.first().map(|h| &h.entity)
    }

    pub fn target(&self) -> Option<&Entity> {
        self.hops.last().map(|h| &h.entity)
    }

    pub fn entity_ids(&self) -> Vec<&str> {
        self.hops.iter().map(|h| h.entity.id.as_str()).collect()
    }
}
