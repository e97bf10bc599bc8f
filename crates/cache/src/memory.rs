//! In-process backend: a concurrent map with lazy expiry.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::{CacheError, CacheStore};

#[derive(Debug, Clone)]
struct Entry {
    data: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Expired entries are dropped when read or counted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();
        // Bind the lookup result so the shard guard is released before removal.
        let found = self
            .entries
            .get(key)
            .map(|entry| (entry.is_expired(now), entry.data.clone()));

        match found {
            Some((false, data)) => Ok(Some(data)),
            Some((true, _)) => {
                self.entries.remove_if(key, |_, entry| entry.is_expired(now));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                data: value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        for key in keys {
            self.entries.remove(key);
        }
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before.saturating_sub(self.entries.len()) as u64)
    }

    async fn flush(&self) -> Result<(), CacheError> {
        self.entries.clear();
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn len(&self) -> Result<u64, CacheError> {
        self.purge_expired();
        Ok(self.entries.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let store = MemoryStore::new();
        store
            .set("short", b"v".to_vec(), Duration::from_millis(20))
            .await
            .unwrap();
        store
            .set("long", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(store.get("short").await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(store.get("short").await.unwrap().is_none());
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_removes_only_named_keys() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        store.set("book:1", b"a".to_vec(), ttl).await.unwrap();
        store.set("book:2", b"b".to_vec(), ttl).await.unwrap();

        store.delete(&["book:1".to_string()]).await.unwrap();

        assert!(store.get("book:1").await.unwrap().is_none());
        assert_eq!(store.get("book:2").await.unwrap(), Some(b"b".to_vec()));
    }

    #[tokio::test]
    async fn delete_prefix_reports_removed_count() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        store.set("books:search:a", vec![], ttl).await.unwrap();
        store.set("books:search:b", vec![], ttl).await.unwrap();
        store.set("books:all", vec![], ttl).await.unwrap();

        assert_eq!(store.delete_prefix("books:search:").await.unwrap(), 2);
        assert_eq!(store.len().await.unwrap(), 1);
    }
}
