//! Record store capability
//!
//! A record store executes built queries and applies writes. The repository
//! only talks to storage through this trait; `MemoryStore` is the in-process
//! implementation used by tests and demos.

mod eval;
mod memory;

use async_trait::async_trait;
use quarry_core::{QueryBuilder, Record, Value};

use crate::error::RepositoryResult;
use crate::models::Page;

pub use eval::{levenshtein_distance, like_match, matches};
pub use memory::MemoryStore;

/// Storage backend of a repository
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Rows matching `query`, ordered, paged, projected and with only the
    /// requested relations loaded
    async fn get(&self, query: &QueryBuilder) -> RepositoryResult<Vec<Record>>;

    /// Number of rows matching `query`, ignoring paging
    async fn count(&self, query: &QueryBuilder) -> RepositoryResult<usize>;

    /// First row matching `query`
    async fn first(&self, query: &QueryBuilder) -> RepositoryResult<Option<Record>> {
        let rows = self.get(&query.clone().limit(1)).await?;
        Ok(rows.into_iter().next())
    }

    /// One page of rows; `page` is 1-based
    async fn paginate(
        &self,
        query: &QueryBuilder,
        per_page: usize,
        page: usize,
    ) -> RepositoryResult<Page<Record>> {
        let page = page.max(1);
        let total = self.count(query).await?;
        let paged = query
            .clone()
            .limit(per_page)
            .offset((page - 1) * per_page);
        let items = self.get(&paged).await?;
        Ok(Page::new(items, total, per_page, page))
    }

    /// Insert `record`, assigning the primary key when it is absent
    async fn insert(&self, table: &str, primary_key: &str, record: Record)
        -> RepositoryResult<Record>;

    /// Merge `attributes` into the row with `id`; `None` when there is none
    async fn update(
        &self,
        table: &str,
        primary_key: &str,
        id: &Value,
        attributes: Record,
    ) -> RepositoryResult<Option<Record>>;

    /// Delete the row with `id`; returns whether a row was removed
    async fn delete(&self, table: &str, primary_key: &str, id: &Value) -> RepositoryResult<bool>;

    /// Delete every row matching `query`; returns how many were removed
    async fn delete_where(&self, query: &QueryBuilder) -> RepositoryResult<usize>;
}
