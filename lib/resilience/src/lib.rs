//! # fusegraph Resilience
//!
//! Protects graph store calls:
//!
//! - **TTL cache**: memoized reads keyed by operation, parameters and tenant
//! - **Circuit breaker**: fail fast after consecutive store failures, with a
//!   half-open trial once the reset timeout passes
//! - **Retry**: bounded, exponential backoff with jitter, transient errors only
//!
//! [`ResilientGraphStore`] composes all three around any
//! [`GraphStore`](fusegraph_core::GraphStore).

pub mod breaker;
pub mod cache;
pub mod config;
pub mod retry;
pub mod store;

pub use breaker::{CircuitBreaker, CircuitState};
pub use cache::{cache_key, CacheStats, TtlCache};
pub use config::ResilienceConfig;
pub use retry::RetryPolicy;
pub use store::ResilientGraphStore;
