//! Source attribution carried in entity metadata
//!
//! `_provenance` holds the entity's own origin: a source string, a record
//! object, or a list of either. `_merged_provenance` holds the records of
//! every entity folded into it.

use chrono::{DateTime, Utc};
use fusegraph_core::{Entity, MERGED_PROVENANCE_KEY, PROVENANCE_KEY};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct ProvenanceRecord {
    pub source: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub confidence: Option<f32>,
}

impl ProvenanceRecord {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            timestamp: None,
            confidence: None,
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    #[must_use]
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Parse one record; accepts a bare source string or an object
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(source) => Some(Self::new(source.clone())),
            Value::Object(map) => {
                let source = map.get("source").and_then(Value::as_str)?;
                Some(Self {
                    source: source.to_string(),
                    timestamp: map.get("timestamp").and_then(parse_timestamp),
                    confidence: map
                        .get("confidence")
                        .and_then(Value::as_f64)
                        .map(|c| c as f32),
                })
            }
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("source".to_string(), json!(self.source));
        if let Some(ts) = self.timestamp {
            map.insert("timestamp".to_string(), json!(ts.to_rfc3339()));
        }
        if let Some(confidence) = self.confidence {
            map.insert("confidence".to_string(), json!(confidence));
        }
        Value::Object(map)
    }
}

/// RFC 3339 strings or integer epoch seconds
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        _ => None,
    }
}

fn records_under(entity: &Entity, key: &str) -> Vec<ProvenanceRecord> {
    match entity.properties.get(key) {
        Some(Value::Array(items)) => items.iter().filter_map(ProvenanceRecord::from_value).collect(),
        Some(value) => ProvenanceRecord::from_value(value).into_iter().collect(),
        None => Vec::new(),
    }
}

/// The entity's direct provenance records
pub fn direct_provenance(entity: &Entity) -> Vec<ProvenanceRecord> {
    records_under(entity, PROVENANCE_KEY)
}

/// Direct and merged records together
pub fn all_provenance(entity: &Entity) -> Vec<ProvenanceRecord> {
    let mut records = direct_provenance(entity);
    records.extend(records_under(entity, MERGED_PROVENANCE_KEY));
    records
}

/// Latest direct timestamp, used by the most-recent conflict strategy
pub fn latest_timestamp(entity: &Entity) -> Option<DateTime<Utc>> {
    direct_provenance(entity).into_iter().filter_map(|r| r.timestamp).max()
}

/// Highest direct confidence, used by the most-confident conflict strategy
pub fn highest_confidence(entity: &Entity) -> Option<f32> {
    direct_provenance(entity)
        .into_iter()
        .filter_map(|r| r.confidence)
        .fold(None, |best, c| Some(best.map_or(c, |b: f32| b.max(c))))
}

/// De-duplicated source identifiers contributing to `entity`, in first-seen order
pub fn track_entity_provenance(entity: &Entity) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for record in all_provenance(entity) {
        if !sources.contains(&record.source) {
            sources.push(record.source);
        }
    }
    sources
}
