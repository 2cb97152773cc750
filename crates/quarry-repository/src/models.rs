//! Data models for the repository layer

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of entries in cache
    pub size: usize,
    /// Number of distinct tags indexed
    pub tags: usize,
}

impl CacheStats {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A cached read result with TTL support
#[derive(Debug, Clone)]
pub(crate) struct CachedEntry {
    /// Serialized result
    pub value: serde_json::Value,
    /// Tags the entry was stored under
    pub tags: Vec<String>,
    /// When this entry was cached
    pub cached_at: Instant,
    /// Time-to-live duration
    pub ttl: Duration,
}

impl CachedEntry {
    pub fn new(value: serde_json::Value, tags: Vec<String>, ttl: Duration) -> Self {
        Self {
            value,
            tags,
            cached_at: Instant::now(),
            ttl,
        }
    }

    /// Check if this cached entry has expired
    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

/// One page of a paginated read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matching records across all pages
    pub total: usize,
    pub per_page: usize,
    /// 1-based page number
    pub current_page: usize,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: usize, per_page: usize, current_page: usize) -> Self {
        Self {
            items,
            total,
            per_page,
            current_page,
        }
    }

    /// Number of the last page (at least 1)
    pub fn last_page(&self) -> usize {
        if self.per_page == 0 {
            return 1;
        }
        self.total.div_ceil(self.per_page).max(1)
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page()
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            per_page: self.per_page,
            current_page: self.current_page,
        }
    }
}
