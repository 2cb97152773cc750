//! Criteria-driven repository layer for Quarry
//!
//! This crate sits between application code and a record store. Callers read
//! through a repository whose criteria stack narrows every query, and reads
//! are memoized under keys derived from the method, its arguments and the
//! active criteria.
//!
//! # Features
//!
//! - **Criteria Stack**: Ordered, skippable, type-removable query modifiers
//! - **Request Criteria**: Search, filters, ordering and includes from request parameters
//! - **Caching**: Read-through cache with TTL and tag invalidation on writes
//! - **Async API**: Non-blocking store and cache access with Tokio
//! - **Write Hooks**: Delegated validation and before/after lifecycle events
//!
//! # Quick Start
//!
//! ```no_run
//! use quarry_core::Operator;
//! use quarry_parser::{Params, SearchableFields};
//! use quarry_repository::{EntityDescriptor, MemoryCacheStore, MemoryStore, Repository};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let entity = EntityDescriptor::new("User", "users").with_searchable(
//!         SearchableFields::new()
//!             .field("name", Operator::Like)
//!             .field("email", Operator::Like),
//!     );
//!     let mut repo = Repository::new(entity, Arc::new(MemoryStore::new()))?
//!         .with_cache(Arc::new(MemoryCacheStore::new()));
//!
//!     // Narrow every following read by the request parameters
//!     repo.push_request(&Params::from_query_string("search=john&orderBy=name"))?;
//!     let users = repo.all().await?;
//!     println!("Found {} users", users.len());
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod criteria;
pub mod entity;
pub mod error;
pub mod events;
pub mod models;
pub mod repository;
pub mod store;
pub mod validation;

// Re-export main types
pub use cache::{
    CacheError, CacheKey, CacheKeyDeriver, CacheLayer, CacheResult, CacheStore, CacheTags,
    MemoryCacheStore, CACHE_KEY_VERSION, REPOSITORIES_TAG,
};
pub use config::{
    CacheConfig, CleanConfig, ConfigError, PaginationConfig, RepositoryConfig, WriteAction,
};
pub use criteria::{CriteriaRegistry, CriteriaStack, CriterionFactory};
pub use entity::EntityDescriptor;
pub use error::{RepositoryError, RepositoryResult};
pub use events::{EventPhase, RepositoryEvent, RepositoryListener};
pub use models::{CacheStats, Page};
pub use repository::Repository;
pub use store::{MemoryStore, RecordStore};
pub use validation::{ValidationErrors, Validator};
