//! [`GraphStore`] wrapper adding caching, circuit breaking, retry and timeouts

use crate::breaker::CircuitBreaker;
use crate::cache::{cache_key, CacheStats, TtlCache};
use crate::config::ResilienceConfig;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use fusegraph_core::tenant::tenant_of;
use fusegraph_core::{
    EngineMetrics, Entity, Error, GraphStore, Path, Relation, Result, TenantContext, Vector,
};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
enum CachedRead {
    Hits(Vec<(Entity, f32)>),
    Paths(Vec<Path>),
    Neighbors(Vec<(Relation, Entity)>),
}

/// Wraps a store so every call goes retry → circuit breaker → timeout.
///
/// `vector_search`, `traverse` and `neighbors` results are cached per
/// tenant; a successful write drops the cached reads that tenant can see.
pub struct ResilientGraphStore<S> {
    inner: S,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    call_timeout: Option<Duration>,
    cache: Option<TtlCache<CachedRead>>,
    metrics: Option<Arc<EngineMetrics>>,
}

impl<S: GraphStore> ResilientGraphStore<S> {
    pub fn new(inner: S, config: &ResilienceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner,
            breaker: CircuitBreaker::new(
                "graph_store",
                config.failure_threshold,
                config.reset_timeout(),
            ),
            retry: RetryPolicy::from_config(config),
            call_timeout: config.call_timeout(),
            cache: config
                .cache_enabled
                .then(|| TtlCache::new(config.cache_ttl(), config.cache_capacity)),
            metrics: None,
        })
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(TtlCache::stats)
    }

    async fn guarded<T, F, Fut>(&self, operation: &str, call: F) -> Result<T>
    where
        T: Send,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send,
    {
        self.retry
            .run(operation, || self.attempt(operation, &call))
            .await
    }

    async fn attempt<T, F, Fut>(&self, operation: &str, call: &F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.breaker.try_acquire()?;
        let result = match self.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, call()).await {
                Ok(result) => result,
                Err(_) => Err(Error::StoreTimeout(format!(
                    "{operation} exceeded {}ms",
                    limit.as_millis()
                ))),
            },
            None => call().await,
        };
        self.breaker.record(&result);
        result
    }

    fn cached(&self, key: &str) -> Option<CachedRead> {
        let cache = self.cache.as_ref()?;
        let hit = cache.get(key);
        if let Some(metrics) = &self.metrics {
            match hit {
                Some(_) => metrics.record_cache_hit(),
                None => metrics.record_cache_miss(),
            }
        }
        hit
    }

    fn generation(&self, ctx: Option<&TenantContext>) -> u64 {
        self.cache
            .as_ref()
            .map_or(0, |cache| cache.generation(tenant_of(ctx)))
    }

    /// Cache `value` unless a write invalidated this tenant while it was read
    fn remember(
        &self,
        key: String,
        value: CachedRead,
        ctx: Option<&TenantContext>,
        generation: u64,
    ) {
        if let Some(cache) = &self.cache {
            cache.insert_if_current(key, value, tenant_of(ctx), generation);
        }
    }

    fn invalidate(&self, ctx: Option<&TenantContext>) {
        if let Some(cache) = &self.cache {
            cache.invalidate_tenant(tenant_of(ctx));
        }
    }
}

#[async_trait]
impl<S: GraphStore> GraphStore for ResilientGraphStore<S> {
    async fn get_entity(&self, id: &str, ctx: Option<&TenantContext>) -> Result<Option<Entity>> {
        self.guarded("get_entity", || self.inner.get_entity(id, ctx))
            .await
    }

    async fn add_entity(&self, entity: Entity, ctx: Option<&TenantContext>) -> Result<bool> {
        let stored = self
            .guarded("add_entity", || self.inner.add_entity(entity.clone(), ctx))
            .await?;
        self.invalidate(ctx);
        Ok(stored)
    }

    async fn add_relation(&self, relation: Relation, ctx: Option<&TenantContext>) -> Result<bool> {
        let stored = self
            .guarded("add_relation", || {
                self.inner.add_relation(relation.clone(), ctx)
            })
            .await?;
        self.invalidate(ctx);
        Ok(stored)
    }

    async fn vector_search(
        &self,
        query: &Vector,
        k: usize,
        entity_type: Option<&str>,
        threshold: Option<f32>,
        ctx: Option<&TenantContext>,
    ) -> Result<Vec<(Entity, f32)>> {
        let key = cache_key(
            "vector_search",
            &json!({
                "query": query.as_slice(),
                "k": k,
                "entity_type": entity_type,
                "threshold": threshold,
            }),
            tenant_of(ctx),
        );
        if let Some(CachedRead::Hits(hits)) = self.cached(&key) {
            return Ok(hits);
        }
        let generation = self.generation(ctx);
        let hits = self
            .guarded("vector_search", || {
                self.inner
                    .vector_search(query, k, entity_type, threshold, ctx)
            })
            .await?;
        self.remember(key, CachedRead::Hits(hits.clone()), ctx, generation);
        Ok(hits)
    }

    async fn traverse(
        &self,
        start_id: &str,
        max_depth: usize,
        max_results: usize,
        ctx: Option<&TenantContext>,
    ) -> Result<Vec<Path>> {
        let key = cache_key(
            "traverse",
            &json!({"start": start_id, "max_depth": max_depth, "max_results": max_results}),
            tenant_of(ctx),
        );
        if let Some(CachedRead::Paths(paths)) = self.cached(&key) {
            return Ok(paths);
        }
        let generation = self.generation(ctx);
        let paths = self
            .guarded("traverse", || {
                self.inner.traverse(start_id, max_depth, max_results, ctx)
            })
            .await?;
        self.remember(key, CachedRead::Paths(paths.clone()), ctx, generation);
        Ok(paths)
    }

    async fn neighbors(
        &self,
        id: &str,
        ctx: Option<&TenantContext>,
    ) -> Result<Vec<(Relation, Entity)>> {
        let key = cache_key("neighbors", &json!({ "id": id }), tenant_of(ctx));
        if let Some(CachedRead::Neighbors(neighbors)) = self.cached(&key) {
            return Ok(neighbors);
        }
        let generation = self.generation(ctx);
        let neighbors = self
            .guarded("neighbors", || self.inner.neighbors(id, ctx))
            .await?;
        self.remember(key, CachedRead::Neighbors(neighbors.clone()), ctx, generation);
        Ok(neighbors)
    }

    async fn list_entities(
        &self,
        entity_type: Option<&str>,
        ctx: Option<&TenantContext>,
    ) -> Result<Vec<Entity>> {
        self.guarded("list_entities", || {
            self.inner.list_entities(entity_type, ctx)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::CircuitState;
    use fusegraph_core::MemoryGraphStore;
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

    /// Memory store that fails on demand, counts calls, and can hold a read
    /// result back for `lag_ms` before returning it
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryGraphStore,
        failing: AtomicBool,
        calls: AtomicU32,
        lag_ms: AtomicU64,
    }

    impl FlakyStore {
        async fn lag(&self) {
            let ms = self.lag_ms.load(Ordering::SeqCst);
            if ms > 0 {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
        }

        fn check(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                Err(Error::StoreConnection("connection refused".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl GraphStore for FlakyStore {
        async fn get_entity(&self, id: &str, ctx: Option<&TenantContext>) -> Result<Option<Entity>> {
            self.check()?;
            let found = self.inner.get_entity(id, ctx).await;
            self.lag().await;
            found
        }
        async fn add_entity(&self, entity: Entity, ctx: Option<&TenantContext>) -> Result<bool> {
            self.check()?;
            self.inner.add_entity(entity, ctx).await
        }
        async fn add_relation(&self, relation: Relation, ctx: Option<&TenantContext>) -> Result<bool> {
            self.check()?;
            self.inner.add_relation(relation, ctx).await
        }
        async fn vector_search(
            &self,
            query: &Vector,
            k: usize,
            entity_type: Option<&str>,
            threshold: Option<f32>,
            ctx: Option<&TenantContext>,
        ) -> Result<Vec<(Entity, f32)>> {
            self.check()?;
            let hits = self.inner.vector_search(query, k, entity_type, threshold, ctx).await;
            self.lag().await;
            hits
        }
        async fn traverse(
            &self,
            start_id: &str,
            max_depth: usize,
            max_results: usize,
            ctx: Option<&TenantContext>,
        ) -> Result<Vec<Path>> {
            self.check()?;
            self.inner.traverse(start_id, max_depth, max_results, ctx).await
        }
        async fn neighbors(&self, id: &str, ctx: Option<&TenantContext>) -> Result<Vec<(Relation, Entity)>> {
            self.check()?;
            self.inner.neighbors(id, ctx).await
        }
        async fn list_entities(
            &self,
            entity_type: Option<&str>,
            ctx: Option<&TenantContext>,
        ) -> Result<Vec<Entity>> {
            self.check()?;
            self.inner.list_entities(entity_type, ctx).await
        }
    }

    fn config() -> ResilienceConfig {
        ResilienceConfig {
            failure_threshold: 3,
            reset_timeout_ms: None,
            max_retries: 0,
            jitter: false,
            ..ResilienceConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_stops_calling_store() {
        let store = ResilientGraphStore::new(FlakyStore::default(), &config()).unwrap();
        store.inner().failing.store(true, Ordering::SeqCst);

        for _ in 0..3 {
            assert!(store.get_entity("x", None).await.is_err());
        }
        assert_eq!(store.breaker().state(), CircuitState::Open);
        assert_eq!(store.inner().calls.load(Ordering::SeqCst), 3);

        let err = store.get_entity("x", None).await.unwrap_err();
        assert!(matches!(err, Error::CircuitOpen(_)));
        assert_eq!(store.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_counts_each_attempt() {
        let cfg = ResilienceConfig {
            max_retries: 2,
            failure_threshold: 10,
            ..config()
        };
        let store = ResilientGraphStore::new(FlakyStore::default(), &cfg).unwrap();
        store.inner().failing.store(true, Ordering::SeqCst);

        assert!(store.list_entities(None, None).await.is_err());
        assert_eq!(store.inner().calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.breaker().consecutive_failures(), 3);

        store.inner().failing.store(false, Ordering::SeqCst);
        assert!(store.list_entities(None, None).await.is_ok());
        assert_eq!(store.breaker().consecutive_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_cached_until_write() {
        let metrics = Arc::new(EngineMetrics::new());
        let store = ResilientGraphStore::new(FlakyStore::default(), &config())
            .unwrap()
            .with_metrics(Arc::clone(&metrics));
        let ctx = TenantContext::new("t1").unwrap();
        store
            .add_entity(Entity::new("a", "Doc").with_embedding(vec![1.0, 0.0]), Some(&ctx))
            .await
            .unwrap();
        let query = Vector::new(vec![1.0, 0.0]);

        let first = store.vector_search(&query, 5, None, None, Some(&ctx)).await.unwrap();
        let calls = store.inner().calls.load(Ordering::SeqCst);
        let second = store.vector_search(&query, 5, None, None, Some(&ctx)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.inner().calls.load(Ordering::SeqCst), calls);

        store
            .add_entity(Entity::new("b", "Doc").with_embedding(vec![1.0, 0.0]), Some(&ctx))
            .await
            .unwrap();
        let third = store.vector_search(&query, 5, None, None, Some(&ctx)).await.unwrap();
        assert_eq!(third.len(), 2);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.cache_misses, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_racing_write_not_cached() {
        let store = ResilientGraphStore::new(FlakyStore::default(), &config()).unwrap();
        let ctx = TenantContext::new("t1").unwrap();
        store
            .add_entity(Entity::new("a", "Doc").with_embedding(vec![1.0, 0.0]), Some(&ctx))
            .await
            .unwrap();
        let query = Vector::new(vec![1.0, 0.0]);
        store.inner().lag_ms.store(1_000, Ordering::SeqCst);

        // The read snapshots the store, then the write lands before it returns
        let (stale, _) = tokio::join!(
            store.vector_search(&query, 5, None, None, Some(&ctx)),
            async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                store
                    .add_entity(Entity::new("b", "Doc").with_embedding(vec![1.0, 0.0]), Some(&ctx))
                    .await
                    .unwrap();
            }
        );
        assert_eq!(stale.unwrap().len(), 1);

        store.inner().lag_ms.store(0, Ordering::SeqCst);
        let fresh = store.vector_search(&query, 5, None, None, Some(&ctx)).await.unwrap();
        assert_eq!(fresh.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_half_open_call_does_not_wedge_breaker() {
        let cfg = ResilienceConfig {
            failure_threshold: 1,
            reset_timeout_ms: Some(1_000),
            ..config()
        };
        let store = ResilientGraphStore::new(FlakyStore::default(), &cfg).unwrap();
        store.inner().failing.store(true, Ordering::SeqCst);
        assert!(store.get_entity("x", None).await.is_err());
        assert_eq!(store.breaker().state(), CircuitState::Open);

        store.inner().failing.store(false, Ordering::SeqCst);
        store.inner().lag_ms.store(5_000, Ordering::SeqCst);
        tokio::time::advance(Duration::from_millis(1_000)).await;
        // Caller gives up on the admitted call; its future is dropped mid-flight
        let abandoned =
            tokio::time::timeout(Duration::from_millis(100), store.get_entity("x", None)).await;
        assert!(abandoned.is_err());
        assert_eq!(store.breaker().state(), CircuitState::HalfOpen);

        store.inner().lag_ms.store(0, Ordering::SeqCst);
        tokio::time::advance(Duration::from_millis(1_000)).await;
        assert!(store.get_entity("x", None).await.unwrap().is_none());
        assert_eq!(store.breaker().state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_expires() {
        let cfg = ResilienceConfig {
            cache_ttl_ms: 1_000,
            ..config()
        };
        let store = ResilientGraphStore::new(FlakyStore::default(), &cfg).unwrap();
        store.neighbors("a", None).await.unwrap();
        store.neighbors("a", None).await.unwrap();
        assert_eq!(store.inner().calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(1_000)).await;
        store.neighbors("a", None).await.unwrap();
        assert_eq!(store.inner().calls.load(Ordering::SeqCst), 2);
    }

    struct SlowStore;

    #[async_trait]
    impl GraphStore for SlowStore {
        async fn get_entity(&self, _: &str, _: Option<&TenantContext>) -> Result<Option<Entity>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }
        async fn add_entity(&self, _: Entity, _: Option<&TenantContext>) -> Result<bool> {
            Ok(true)
        }
        async fn add_relation(&self, _: Relation, _: Option<&TenantContext>) -> Result<bool> {
            Ok(true)
        }
        async fn vector_search(
            &self,
            _: &Vector,
            _: usize,
            _: Option<&str>,
            _: Option<f32>,
            _: Option<&TenantContext>,
        ) -> Result<Vec<(Entity, f32)>> {
            Ok(Vec::new())
        }
        async fn traverse(&self, _: &str, _: usize, _: usize, _: Option<&TenantContext>) -> Result<Vec<Path>> {
            Ok(Vec::new())
        }
        async fn neighbors(&self, _: &str, _: Option<&TenantContext>) -> Result<Vec<(Relation, Entity)>> {
            Ok(Vec::new())
        }
        async fn list_entities(&self, _: Option<&str>, _: Option<&TenantContext>) -> Result<Vec<Entity>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout_maps_to_store_timeout() {
        let cfg = ResilienceConfig {
            call_timeout_ms: Some(100),
            ..config()
        };
        let store = ResilientGraphStore::new(SlowStore, &cfg).unwrap();
        let err = store.get_entity("x", None).await.unwrap_err();
        assert!(matches!(err, Error::StoreTimeout(_)));
        assert_eq!(store.breaker().consecutive_failures(), 1);
    }
}
