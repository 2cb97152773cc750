//! Read caching: key derivation, tags, backends and the cache layer

mod key;
mod layer;
mod store;
mod tags;

pub use key::{CacheKey, CacheKeyDeriver, CACHE_KEY_VERSION};
pub use layer::CacheLayer;
pub use store::{CacheError, CacheResult, CacheStore, MemoryCacheStore};
pub use tags::{CacheTags, REPOSITORIES_TAG};
