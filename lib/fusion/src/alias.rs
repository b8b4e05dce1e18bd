//! Alias index: name → entity lookup, tenant-prefixed

use ahash::AHashMap;
use fusegraph_core::tenant::tenant_key;
use fusegraph_core::{Entity, EntityId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Fuzzy,
    Abbreviation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasEntry {
    pub alias: String,
    pub entity_id: EntityId,
    pub match_type: MatchType,
    pub tenant_id: Option<String>,
}

/// Thread-safe alias table.
///
/// Keys are `"{tenant}:{alias}"` when a tenant is given and the bare alias
/// otherwise, so one alias string can point at different entities per
/// tenant. Aliases are trimmed and lowercased before use.
#[derive(Debug, Default)]
pub struct AliasIndex {
    entries: RwLock<AHashMap<String, AliasEntry>>,
}

pub fn normalize_alias(alias: &str) -> String {
    alias.trim().to_lowercase()
}

fn alias_key(alias: &str, tenant_id: Option<&str>) -> Option<String> {
    let normalized = normalize_alias(alias);
    if normalized.is_empty() {
        return None;
    }
    Some(tenant_key(tenant_id, &normalized))
}

impl AliasIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. Returns the previous entry under the same key.
    /// Blank aliases are ignored.
    pub fn add(
        &self,
        alias: &str,
        entity_id: impl Into<EntityId>,
        match_type: MatchType,
        tenant_id: Option<&str>,
    ) -> Option<AliasEntry> {
        let key = alias_key(alias, tenant_id)?;
        let entry = AliasEntry {
            alias: normalize_alias(alias),
            entity_id: entity_id.into(),
            match_type,
            tenant_id: tenant_id.map(str::to_string),
        };
        self.entries.write().insert(key, entry)
    }

    pub fn remove(&self, alias: &str, tenant_id: Option<&str>) -> Option<AliasEntry> {
        let key = alias_key(alias, tenant_id)?;
        self.entries.write().remove(&key)
    }

    pub fn lookup(&self, alias: &str, tenant_id: Option<&str>) -> Option<AliasEntry> {
        let key = alias_key(alias, tenant_id)?;
        self.entries.read().get(&key).cloned()
    }

    /// Every alias pointing at `entity_id` within one tenant scope
    pub fn aliases_of(&self, entity_id: &str, tenant_id: Option<&str>) -> Vec<AliasEntry> {
        let mut aliases: Vec<AliasEntry> = self
            .entries
            .read()
            .values()
            .filter(|e| e.entity_id == entity_id && e.tenant_id.as_deref() == tenant_id)
            .cloned()
            .collect();
        aliases.sort_by(|a, b| a.alias.cmp(&b.alias));
        aliases
    }

    /// Register an entity's name as an exact alias of `target`, plus its
    /// initials as an abbreviation when the name has several words.
    /// Returns the number of aliases written.
    pub fn register_entity(&self, entity: &Entity, target: &str) -> usize {
        let tenant = entity.tenant_id.as_deref();
        let mut written = 0;
        if let Some(name) = entity.name() {
            if alias_key(name, tenant).is_some() {
                self.add(name, target, MatchType::Exact, tenant);
                written += 1;
            }
            if let Some(abbreviation) = abbreviate(name) {
                // An exact alias already using this string takes precedence
                let taken = self
                    .lookup(&abbreviation, tenant)
                    .is_some_and(|e| e.match_type == MatchType::Exact);
                if !taken {
                    self.add(&abbreviation, target, MatchType::Abbreviation, tenant);
                    written += 1;
                }
            }
        }
        written
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Initials of a multi-word name: "International Business Machines" → "ibm"
pub fn abbreviate(name: &str) -> Option<String> {
    let words: Vec<&str> = name
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|w| !w.is_empty())
        .collect();
    if words.len() < 2 {
        return None;
    }
    let initials: String = words
        .iter()
        .filter_map(|w| w.chars().find(|c| c.is_alphanumeric()))
        .flat_map(char::to_lowercase)
        .collect();
    (initials.chars().count() >= 2).then_some(initials)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_lookup_remove() {
        let index = AliasIndex::new();
        assert!(index.add("  ACME Corp ", "e1", MatchType::Exact, None).is_none());
        let entry = index.lookup("acme corp", None).unwrap();
        assert_eq!(entry.entity_id, "e1");
        assert_eq!(entry.alias, "acme corp");

        assert!(index.remove("Acme Corp", None).is_some());
        assert!(index.lookup("acme corp", None).is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn test_tenants_resolve_independently() {
        let index = AliasIndex::new();
        index.add("Acme", "a-acme", MatchType::Exact, Some("tenant_a"));
        index.add("Acme", "b-acme", MatchType::Exact, Some("tenant_b"));

        assert_eq!(index.lookup("acme", Some("tenant_a")).unwrap().entity_id, "a-acme");
        assert_eq!(index.lookup("acme", Some("tenant_b")).unwrap().entity_id, "b-acme");
        assert!(index.lookup("acme", None).is_none());

        index.remove("acme", Some("tenant_a"));
        assert!(index.lookup("acme", Some("tenant_a")).is_none());
        assert!(index.lookup("acme", Some("tenant_b")).is_some());
    }

    #[test]
    fn test_blank_alias_ignored() {
        let index = AliasIndex::new();
        assert!(index.add("   ", "e1", MatchType::Fuzzy, None).is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn test_register_entity_adds_abbreviation() {
        let index = AliasIndex::new();
        let entity = Entity::new("ibm", "Company")
            .with_property("name", "International Business Machines")
            .with_tenant("t1");
        assert_eq!(index.register_entity(&entity, "merged_1"), 2);

        let abbr = index.lookup("IBM", Some("t1")).unwrap();
        assert_eq!(abbr.match_type, MatchType::Abbreviation);
        assert_eq!(abbr.entity_id, "merged_1");
        assert_eq!(index.aliases_of("merged_1", Some("t1")).len(), 2);
    }

    #[test]
    fn test_abbreviate() {
        assert_eq!(abbreviate("New York City").as_deref(), Some("nyc"));
        assert_eq!(abbreviate("Acme"), None);
    }
}
