//! Cache backends

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{CacheStats, CachedEntry};

/// Cache backend failure
///
/// Never surfaced to repository callers: the cache layer logs it and falls
/// back to the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Key-value store with tag invalidation
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live entry
    async fn get(&self, key: &str) -> CacheResult<Option<serde_json::Value>>;

    /// Store `value` under `key`, indexed by `tags`
    async fn put(
        &self,
        key: &str,
        tags: &[String],
        value: serde_json::Value,
        ttl: Duration,
    ) -> CacheResult<()>;

    /// Remove every entry stored under any of `tags`; returns how many
    async fn invalidate_tags(&self, tags: &[String]) -> CacheResult<usize>;

    /// Remove everything
    async fn flush(&self) -> CacheResult<()>;

    /// Backend statistics, where the backend keeps any
    async fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

#[derive(Debug, Default)]
struct MemoryCacheInner {
    entries: HashMap<String, CachedEntry>,
    tags: HashMap<String, HashSet<String>>,
    hits: u64,
    misses: u64,
}

impl MemoryCacheInner {
    fn remove(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            for tag in &entry.tags {
                if let Some(keys) = self.tags.get_mut(tag) {
                    keys.remove(key);
                    if keys.is_empty() {
                        self.tags.remove(tag);
                    }
                }
            }
        }
    }
}

/// In-process cache backend
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    inner: RwLock<MemoryCacheInner>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired entries; returns how many were removed
    pub async fn purge_expired(&self) -> usize {
        let mut inner = self.inner.write().await;
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            inner.remove(key);
        }
        expired.len()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> CacheResult<Option<serde_json::Value>> {
        let mut inner = self.inner.write().await;

        let live = match inner.entries.get(key).map(CachedEntry::is_expired) {
            Some(false) => inner.entries.get(key).map(|entry| entry.value.clone()),
            Some(true) => {
                inner.remove(key);
                None
            }
            None => None,
        };

        if live.is_some() {
            inner.hits += 1;
        } else {
            inner.misses += 1;
        }
        Ok(live)
    }

    async fn put(
        &self,
        key: &str,
        tags: &[String],
        value: serde_json::Value,
        ttl: Duration,
    ) -> CacheResult<()> {
        let mut inner = self.inner.write().await;
        inner.remove(key);

        for tag in tags {
            inner
                .tags
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
        inner
            .entries
            .insert(key.to_string(), CachedEntry::new(value, tags.to_vec(), ttl));
        Ok(())
    }

    async fn invalidate_tags(&self, tags: &[String]) -> CacheResult<usize> {
        let mut inner = self.inner.write().await;

        let keys: HashSet<String> = tags
            .iter()
            .filter_map(|tag| inner.tags.get(tag))
            .flat_map(|keys| keys.iter().cloned())
            .collect();
        for key in &keys {
            inner.remove(key);
        }
        Ok(keys.len())
    }

    async fn flush(&self) -> CacheResult<()> {
        let mut inner = self.inner.write().await;
        inner.entries.clear();
        inner.tags.clear();
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        let inner = self.inner.read().await;
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            size: inner.entries.len(),
            tags: inner.tags.len(),
        }
    }
}
