//! Read-through cache layer
//!
//! Results are stored as serialized JSON under the entity's tags. The layer
//! never fails a read because of the backend: read and write errors are
//! logged and the result is computed directly.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::key::CacheKey;
use super::store::CacheStore;
use super::tags::CacheTags;
use crate::config::{CacheConfig, WriteAction};
use crate::error::RepositoryResult;
use crate::models::CacheStats;

/// Cache layer of one repository
pub struct CacheLayer {
    store: Arc<dyn CacheStore>,
    config: CacheConfig,
    tags: CacheTags,
}

impl CacheLayer {
    pub fn new(store: Arc<dyn CacheStore>, config: CacheConfig, tags: CacheTags) -> Self {
        Self {
            store,
            config,
            tags,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn tags(&self) -> &CacheTags {
        &self.tags
    }

    /// Whether reads through `method` go through the cache
    pub fn is_cacheable(&self, method: &str) -> bool {
        self.config.allows(method)
    }

    /// Return the cached result for `key`, or compute, store and return it
    ///
    /// `skip` bypasses the cache entirely for this call.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        key: &CacheKey,
        method: &str,
        skip: bool,
        compute: F,
    ) -> RepositoryResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = RepositoryResult<T>>,
    {
        if skip || !self.is_cacheable(method) {
            debug!(key = %key, skip, "Bypassing cache");
            return compute().await;
        }

        match self.store.get(key.as_str()).await {
            Ok(Some(cached)) => match serde_json::from_value::<T>(cached) {
                Ok(value) => {
                    debug!(key = %key, "Cache hit");
                    return Ok(value);
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "Discarding undecodable cache entry");
                }
            },
            Ok(None) => debug!(key = %key, "Cache miss"),
            Err(err) => warn!(key = %key, error = %err, "Cache read failed, computing directly"),
        }

        let value = compute().await?;

        match serde_json::to_value(&value) {
            Ok(json) => {
                if let Err(err) = self
                    .store
                    .put(key.as_str(), self.tags.as_slice(), json, self.config.ttl())
                    .await
                {
                    warn!(key = %key, error = %err, "Cache write failed");
                }
            }
            Err(err) => warn!(key = %key, error = %err, "Result not cacheable"),
        }

        Ok(value)
    }

    /// Drop every cached read of the entity after `action`, unless clearing
    /// is switched off for it. Returns whether the cache was cleared.
    pub async fn invalidate(&self, action: WriteAction) -> bool {
        if !self.config.clean.clears_on(action) {
            debug!(action = %action, "Cache clearing disabled for action");
            return false;
        }

        match self.store.invalidate_tags(self.tags.as_slice()).await {
            Ok(removed) => {
                debug!(action = %action, removed, "Invalidated cached reads");
                true
            }
            Err(err) => {
                warn!(action = %action, error = %err, "Cache invalidation failed");
                false
            }
        }
    }

    /// Remove every entry of the backend
    pub async fn flush(&self) {
        if let Err(err) = self.store.flush().await {
            warn!(error = %err, "Cache flush failed");
        }
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.stats().await
    }
}
