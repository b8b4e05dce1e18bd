use fusegraph_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub cache_enabled: bool,
    pub cache_ttl_ms: u64,
    /// Entries kept before the oldest are evicted
    pub cache_capacity: usize,
    /// Consecutive store failures that open the breaker
    pub failure_threshold: u32,
    /// Time an open breaker waits before admitting one trial call;
    /// `None` keeps it open until reset by hand
    pub reset_timeout_ms: Option<u64>,
    /// Retries after the first attempt, transient errors only
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub jitter: bool,
    /// Per-attempt store call limit
    pub call_timeout_ms: Option<u64>,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl_ms: 300_000, // 5 minutes
            cache_capacity: 10_000,
            failure_threshold: 5,
            reset_timeout_ms: Some(30_000),
            max_retries: 2,
            initial_backoff_ms: 50,
            max_backoff_ms: 2_000,
            jitter: true,
            call_timeout_ms: Some(10_000),
        }
    }
}

impl ResilienceConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn reset_timeout(&self) -> Option<Duration> {
        self.reset_timeout_ms.map(Duration::from_millis)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(Error::InvalidConfig(
                "failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(Error::InvalidConfig(format!(
                "initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
                self.initial_backoff_ms, self.max_backoff_ms
            )));
        }
        if self.call_timeout_ms == Some(0) {
            return Err(Error::InvalidConfig(
                "call_timeout_ms must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}
