//! Caching layer used for external lookups, taxonomy reads, profiles and
//! the revoked-token denylist.
//!
//! - `Cache` is the typed facade handlers use (serde JSON in and out)
//! - `CacheStore` is the byte-level backend: Redis when configured, an
//!   in-process TTL map otherwise
//! - Cache failures are logged and treated as misses; they never fail a request
//! - `try_get`/`try_set_with_ttl` return store errors instead; the token
//!   denylist goes through them

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument, warn};

/// Raw key/value backend
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<bool>;
    async fn ping(&self) -> Result<()>;
    fn backend(&self) -> &'static str;
}

/// Redis-backed store with connection pooling via ConnectionManager
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        tracing::info!("Redis cache connected");
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(key)
            .await
            .context("Redis GET failed")
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
            .context("Redis SETEX failed")
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let deleted: i32 = conn.del(key).await.context("Redis DEL failed")?;
        Ok(deleted > 0)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis health check failed")?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

/// In-process store; entries expire lazily on read
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, (String, Instant)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        before - entries.len()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read();
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.entries
            .write()
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Typed cache facade shared through `AppState`
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
    default_ttl: Duration,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>, default_ttl_seconds: u64) -> Self {
        Self {
            store,
            default_ttl: Duration::from_secs(default_ttl_seconds),
        }
    }

    /// Redis when `redis_url` is set and reachable, memory otherwise
    pub async fn connect(redis_url: Option<&str>, default_ttl_seconds: u64) -> Self {
        if let Some(url) = redis_url {
            match RedisStore::connect(url).await {
                Ok(store) => return Self::new(Arc::new(store), default_ttl_seconds),
                Err(e) => {
                    warn!(error = %e, "Redis unavailable, falling back to in-memory cache")
                }
            }
        }

        let store = MemoryStore::new();
        tokio::spawn({
            let store = store.clone();
            async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                loop {
                    interval.tick().await;
                    let purged = store.purge_expired();
                    if purged > 0 {
                        debug!(purged, "Purged expired cache entries");
                    }
                }
            }
        });
        Self::new(Arc::new(store), default_ttl_seconds)
    }

    pub fn in_memory(default_ttl_seconds: u64) -> Self {
        Self::new(Arc::new(MemoryStore::new()), default_ttl_seconds)
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Get a value from cache.
    #[instrument(skip(self), fields(cache_hit))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.store.get(key).await {
            Ok(Some(data)) => match serde_json::from_str(&data) {
                Ok(value) => {
                    debug!(key = key, "Cache hit");
                    tracing::Span::current().record("cache_hit", true);
                    Some(value)
                }
                Err(e) => {
                    warn!(key = key, error = %e, "Failed to deserialize cached value");
                    tracing::Span::current().record("cache_hit", false);
                    None
                }
            },
            Ok(None) => {
                debug!(key = key, "Cache miss");
                tracing::Span::current().record("cache_hit", false);
                None
            }
            Err(e) => {
                error!(key = key, error = %e, "Cache get error");
                tracing::Span::current().record("cache_hit", false);
                None
            }
        }
    }

    /// Like `get`, but store and decode failures are returned instead of
    /// being read as a miss.
    pub async fn try_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.store.get(key).await? {
            Some(data) => {
                let value = serde_json::from_str(&data)
                    .with_context(|| format!("Corrupt cache entry for {}", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Like `set_with_ttl`, but the write must succeed.
    pub async fn try_set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let data = serde_json::to_string(value).context("Failed to serialize value for cache")?;
        self.store.set(key, data, ttl).await
    }

    /// Set a value in cache with default TTL.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) {
        self.set_with_ttl(key, value, self.default_ttl).await
    }

    /// Set a value in cache with custom TTL.
    #[instrument(skip(self, value))]
    pub async fn set_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let data = match serde_json::to_string(value) {
            Ok(data) => data,
            Err(e) => {
                warn!(key = key, error = %e, "Failed to serialize value for cache");
                return;
            }
        };

        match self.store.set(key, data, ttl).await {
            Ok(()) => debug!(key = key, ttl_secs = ttl.as_secs(), "Cached value"),
            Err(e) => error!(key = key, error = %e, "Cache set error"),
        }
    }

    /// Delete a specific key from cache.
    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str) {
        match self.store.delete(key).await {
            Ok(deleted) => debug!(key = key, deleted, "Cache delete"),
            Err(e) => error!(key = key, error = %e, "Cache delete error"),
        }
    }

    /// Cache-aside: return the cached value or compute, store and return it.
    /// Errors from `load` are returned as-is and nothing is cached.
    pub async fn remember<T, E, F, Fut>(&self, key: &str, ttl: Duration, load: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get::<T>(key).await {
            return Ok(cached);
        }

        let value = load().await?;
        self.set_with_ttl(key, &value, ttl).await;
        Ok(value)
    }

    pub async fn health_check(&self) -> Result<()> {
        self.store.ping().await
    }
}

/// Cache key builders for consistent key formats.
pub mod keys {
    use uuid::Uuid;

    pub fn deficiencias() -> String {
        "deficiencias:all".to_string()
    }

    pub fn candidato_profile(user_id: Uuid) -> String {
        format!("profile:candidato:{}", user_id)
    }

    pub fn instituicao_profile(user_id: Uuid) -> String {
        format!("profile:instituicao:{}", user_id)
    }

    pub fn viacep(cep: &str) -> String {
        format!("external:viacep:{}", cep)
    }

    pub fn cnpj(cnpj: &str) -> String {
        format!("external:cnpj:{}", cnpj)
    }

    pub fn revoked_token(jti: &str) -> String {
        format!("auth:revoked:{}", jti)
    }

    /// Unix time before which every token of the user is void
    pub fn revoked_before(user_id: Uuid) -> String {
        format!("auth:revoked_before:{}", user_id)
    }
}

/// TTLs for entries that don't use the configured default
pub mod ttl {
    use std::time::Duration;

    pub const DEFICIENCIAS: Duration = Duration::from_secs(60 * 60 * 24);
    pub const PROFILE: Duration = Duration::from_secs(60 * 10);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Endereco {
        cidade: String,
    }

    #[tokio::test]
    async fn memory_store_round_trips_typed_values() {
        let cache = Cache::in_memory(60);
        let value = Endereco {
            cidade: "Curitiba".to_string(),
        };

        cache.set("k", &value).await;
        assert_eq!(cache.get::<Endereco>("k").await, Some(value));

        cache.delete("k").await;
        assert_eq!(cache.get::<Endereco>("k").await, None);
        assert_eq!(cache.backend(), "memory");
    }

    #[tokio::test]
    async fn expired_entries_are_misses() {
        let store = MemoryStore::new();
        store
            .set("k", "1".to_string(), Duration::from_millis(0))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.purge_expired(), 1);
    }

    #[tokio::test]
    async fn remember_loads_once_then_serves_cached() {
        let cache = Cache::in_memory(60);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Result<u32, ()> = cache
                .remember("answer", Duration::from_secs(60), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await;
            assert_eq!(value, Ok(42));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    struct DownStore;

    #[async_trait]
    impl CacheStore for DownStore {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            anyhow::bail!("connection refused")
        }
        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<()> {
            anyhow::bail!("connection refused")
        }
        async fn delete(&self, _key: &str) -> Result<bool> {
            anyhow::bail!("connection refused")
        }
        async fn ping(&self) -> Result<()> {
            anyhow::bail!("connection refused")
        }
        fn backend(&self) -> &'static str {
            "down"
        }
    }

    #[tokio::test]
    async fn strict_reads_and_writes_surface_store_errors() {
        let down = Cache::new(Arc::new(DownStore), 60);
        assert_eq!(down.get::<bool>("k").await, None);
        assert!(down.try_get::<bool>("k").await.is_err());
        assert!(down
            .try_set_with_ttl("k", &true, Duration::from_secs(5))
            .await
            .is_err());

        let cache = Cache::in_memory(60);
        assert_eq!(cache.try_get::<bool>("k").await.unwrap(), None);
        cache
            .try_set_with_ttl("k", &true, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(cache.try_get::<bool>("k").await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn remember_does_not_cache_failures() {
        let cache = Cache::in_memory(60);

        let first: Result<u32, &str> = cache
            .remember("k", Duration::from_secs(60), || async { Err("upstream down") })
            .await;
        assert!(first.is_err());

        let second: Result<u32, &str> = cache
            .remember("k", Duration::from_secs(60), || async { Ok(7) })
            .await;
        assert_eq!(second, Ok(7));
    }
}
