//! Engine metrics
//!
//! Lock-light counters recorded by search, fusion and the resilience layer,
//! exposed as a read-only [`MetricsSnapshot`] independent of any metrics
//! backend.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
struct LatencyStats {
    count: u64,
    total_ms: f64,
    min_ms: Option<f64>,
    max_ms: f64,
}

impl LatencyStats {
    fn record(&mut self, elapsed: Duration) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        self.count += 1;
        self.total_ms += ms;
        self.min_ms = Some(self.min_ms.map_or(ms, |m| m.min(ms)));
        self.max_ms = self.max_ms.max(ms);
    }

    fn summary(&self) -> LatencySummary {
        LatencySummary {
            min_ms: self.min_ms.unwrap_or(0.0),
            avg_ms: if self.count == 0 {
                0.0
            } else {
                self.total_ms / self.count as f64
            },
            max_ms: self.max_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub queries: u64,
    pub failed_queries: u64,
    pub query_latency: LatencySummary,
    pub entities_retrieved: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
    pub extractions: u64,
    pub extraction_latency: LatencySummary,
    pub fusion_runs: u64,
    pub entities_merged: u64,
}

#[derive(Debug, Default)]
pub struct EngineMetrics {
    queries: AtomicU64,
    failed_queries: AtomicU64,
    entities_retrieved: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    extractions: AtomicU64,
    fusion_runs: AtomicU64,
    entities_merged: AtomicU64,
    query_latency: Mutex<LatencyStats>,
    extraction_latency: Mutex<LatencyStats>,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_query(&self, elapsed: Duration, entities: usize) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        self.entities_retrieved
            .fetch_add(entities as u64, Ordering::Relaxed);
        self.query_latency.lock().record(elapsed);
    }

    pub fn record_query_failure(&self) {
        self.failed_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Entity extraction is performed by ingestion collaborators; they report here.
    pub fn record_extraction(&self, elapsed: Duration) {
        self.extractions.fetch_add(1, Ordering::Relaxed);
        self.extraction_latency.lock().record(elapsed);
    }

    pub fn record_fusion(&self, merged: usize) {
        self.fusion_runs.fetch_add(1, Ordering::Relaxed);
        self.entities_merged
            .fetch_add(merged as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        MetricsSnapshot {
            queries: self.queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            query_latency: self.query_latency.lock().summary(),
            entities_retrieved: self.entities_retrieved.load(Ordering::Relaxed),
            cache_hits,
            cache_misses,
            cache_hit_rate: hit_rate(cache_hits, cache_misses),
            extractions: self.extractions.load(Ordering::Relaxed),
            extraction_latency: self.extraction_latency.lock().summary(),
            fusion_runs: self.fusion_runs.load(Ordering::Relaxed),
            entities_merged: self.entities_merged.load(Ordering::Relaxed),
        }
    }
}

/// hits / (hits + misses), 0 before any request
#[inline]
pub fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}
