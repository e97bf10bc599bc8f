//! Best-effort caching in front of the relational store.
//!
//! [`CacheStore`] is the raw byte-level seam with a Redis and an in-process
//! implementation. [`Cache`] wraps a store with JSON (de)serialization and
//! hit/miss accounting, and never lets a store failure escape from the
//! read/write helpers: a failed read is a miss, a failed write is a warning.

pub mod error;
pub mod memory;
pub mod redis_store;
pub mod stats;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use libris_kernel::settings::{CacheBackendKind, CacheSettings};
use libris_kernel::{InitCtx, Module};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use error::CacheError;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use stats::{CacheStats, CacheStatsSnapshot};

/// Byte-level key-value store with per-entry time-to-live.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Short backend label for logs and health output.
    fn backend(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError>;

    /// Delete every key starting with `prefix`; returns how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError>;

    async fn flush(&self) -> Result<(), CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;

    /// Number of live keys.
    async fn len(&self) -> Result<u64, CacheError>;

    /// Release pooled connections.
    async fn close(&self) {}
}

/// Typed, best-effort facade over a [`CacheStore`].
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
    stats: Arc<CacheStats>,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            stats: Arc::new(CacheStats::default()),
        }
    }

    /// In-process cache, used for single-node deployments and tests.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Build the cache selected by `settings.backend`. The Redis pool is lazy,
    /// so an unreachable server does not fail startup.
    pub fn from_settings(settings: &CacheSettings) -> Result<Self, CacheError> {
        match settings.backend {
            CacheBackendKind::Memory => Ok(Self::in_memory()),
            CacheBackendKind::Redis => Ok(Self::new(Arc::new(RedisStore::connect(settings)?))),
        }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Fetch and decode `key`. Store failures and undecodable payloads are
    /// reported as misses.
    pub async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw,
            Err(err) => {
                self.stats.record_error();
                libris_telemetry::metrics::record_cache_operation("get", "error");
                tracing::warn!(key, error = %err, "cache get failed; treating as miss");
                return None;
            }
        };

        let decoded = raw.and_then(|bytes| match serde_json::from_slice::<T>(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key, error = %err, "cached value is not decodable; treating as miss");
                None
            }
        });

        let status = if decoded.is_some() {
            self.stats.record_hit();
            "hit"
        } else {
            self.stats.record_miss();
            "miss"
        };
        libris_telemetry::metrics::record_cache_operation("get", status);
        libris_telemetry::metrics::set_cache_hit_ratio(self.stats.hit_ratio());
        tracing::debug!(key, status, "cache lookup");

        decoded
    }

    /// Encode and store `value` under `key`. Failures are logged and dropped.
    pub async fn store<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to encode value for cache");
                return;
            }
        };

        match self.store.set(key, bytes, ttl).await {
            Ok(()) => libris_telemetry::metrics::record_cache_operation("set", "success"),
            Err(err) => {
                self.stats.record_error();
                libris_telemetry::metrics::record_cache_operation("set", "error");
                tracing::warn!(key, error = %err, "cache set failed; continuing without caching");
            }
        }
    }

    /// Remove `keys`. Failures are logged and dropped.
    pub async fn invalidate(&self, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        match self.store.delete(keys).await {
            Ok(()) => libris_telemetry::metrics::record_cache_operation("delete", "success"),
            Err(err) => {
                self.stats.record_error();
                libris_telemetry::metrics::record_cache_operation("delete", "error");
                tracing::warn!(?keys, error = %err, "cache invalidation failed");
            }
        }
    }

    /// Remove every key under `prefix`. Failures are logged and dropped.
    pub async fn invalidate_prefix(&self, prefix: &str) {
        match self.store.delete_prefix(prefix).await {
            Ok(removed) => {
                libris_telemetry::metrics::record_cache_operation("delete", "success");
                tracing::debug!(prefix, removed, "cache prefix invalidated");
            }
            Err(err) => {
                self.stats.record_error();
                libris_telemetry::metrics::record_cache_operation("delete", "error");
                tracing::warn!(prefix, error = %err, "cache prefix invalidation failed");
            }
        }
    }

    /// Drop every entry and reset the hit counters.
    pub async fn flush(&self) -> Result<(), CacheError> {
        self.store.flush().await?;
        self.stats.reset();
        libris_telemetry::metrics::set_cache_hit_ratio(0.0);
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        self.store.ping().await
    }

    pub async fn len(&self) -> Result<u64, CacheError> {
        self.store.len().await
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}

/// Core module owning the cache connection: warns if the store is unreachable
/// at start, closes it on shutdown.
pub struct CacheModule {
    cache: Cache,
}

impl CacheModule {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Module for CacheModule {
    fn name(&self) -> &'static str {
        "cache"
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        match self.cache.ping().await {
            Ok(()) => tracing::info!(backend = self.cache.backend(), "cache reachable"),
            Err(err) => tracing::warn!(
                backend = self.cache.backend(),
                error = %err,
                "cache unreachable; reads will fall through to the database"
            ),
        }
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.cache.close().await;
        tracing::info!(backend = self.cache.backend(), "cache connection closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Snapshot {
        id: i64,
        title: String,
    }

    /// Store whose reads and writes fail, for exercising the best-effort paths.
    struct Unreachable;

    fn refused() -> CacheError {
        CacheError::Redis(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "connection refused",
        )))
    }

    #[async_trait]
    impl CacheStore for Unreachable {
        fn backend(&self) -> &'static str {
            "unreachable"
        }

        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(refused())
        }

        async fn set(&self, _: &str, _: Vec<u8>, _: Duration) -> Result<(), CacheError> {
            Err(refused())
        }

        async fn delete(&self, _keys: &[String]) -> Result<(), CacheError> {
            Err(refused())
        }

        async fn delete_prefix(&self, _prefix: &str) -> Result<u64, CacheError> {
            Err(refused())
        }

        async fn flush(&self) -> Result<(), CacheError> {
            Ok(())
        }

        async fn ping(&self) -> Result<(), CacheError> {
            Err(refused())
        }

        async fn len(&self) -> Result<u64, CacheError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn store_then_lookup_counts_a_hit() {
        let cache = Cache::in_memory();
        let value = Snapshot {
            id: 1,
            title: "1984".to_string(),
        };

        cache.store("book:1", &value, Duration::from_secs(60)).await;
        let cached: Option<Snapshot> = cache.lookup("book:1").await;

        assert_eq!(cached, Some(value));
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 0);
    }

    #[tokio::test]
    async fn absent_key_is_a_miss_not_an_error() {
        let cache = Cache::in_memory();
        let cached: Option<Snapshot> = cache.lookup("book:404").await;

        assert!(cached.is_none());
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.stats().errors, 0);
    }

    #[tokio::test]
    async fn undecodable_payload_is_a_miss() {
        let cache = Cache::in_memory();
        cache.store("book:1", "not a book", Duration::from_secs(60)).await;

        let cached: Option<Snapshot> = cache.lookup("book:1").await;
        assert!(cached.is_none());
    }

    #[tokio::test]
    async fn failing_store_never_escapes() {
        let cache = Cache::new(Arc::new(Unreachable));

        let cached: Option<Snapshot> = cache.lookup("book:1").await;
        cache.store("book:1", &1, Duration::from_secs(1)).await;
        cache.invalidate(&["book:1".to_string()]).await;
        cache.invalidate_prefix("books:search:").await;

        assert!(cached.is_none());
        assert_eq!(cache.stats().errors, 4);
    }

    #[tokio::test]
    async fn invalidate_prefix_leaves_other_keys() {
        let cache = Cache::in_memory();
        let ttl = Duration::from_secs(60);
        cache.store("books:search:orwell", &vec![1], ttl).await;
        cache.store("books:search:huxley", &vec![2], ttl).await;
        cache.store("books:all", &vec![1, 2], ttl).await;

        cache.invalidate_prefix("books:search:").await;

        assert!(cache.lookup::<Vec<i64>>("books:search:orwell").await.is_none());
        assert!(cache.lookup::<Vec<i64>>("books:search:huxley").await.is_none());
        assert_eq!(cache.lookup::<Vec<i64>>("books:all").await, Some(vec![1, 2]));
    }

    #[tokio::test]
    async fn flush_clears_entries_and_counters() {
        let cache = Cache::in_memory();
        cache.store("k", &1, Duration::from_secs(60)).await;
        let _ = cache.lookup::<i64>("k").await;

        cache.flush().await.unwrap();

        assert_eq!(cache.len().await.unwrap(), 0);
        assert_eq!(cache.stats().hits, 0);
    }

    #[tokio::test]
    async fn module_start_tolerates_unreachable_store() {
        let module = CacheModule::new(Cache::new(Arc::new(Unreachable)));
        let settings = libris_kernel::settings::Settings::default();
        let ctx = InitCtx {
            settings: &settings,
        };

        module.start(&ctx).await.unwrap();
        module.stop().await.unwrap();
    }
}
